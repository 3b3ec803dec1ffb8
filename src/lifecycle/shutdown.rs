//! Shutdown coordination between the HTTP front end and the Gemini listener.

use tokio::sync::broadcast;

/// Fans one shutdown event out to every server task.
///
/// Each server takes a receiver from [`Shutdown::subscribe`] before it is
/// spawned; [`Shutdown::trigger`] then stops all of them at once.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Signal every subscriber. Returns how many servers were listening.
    pub fn trigger(&self) -> usize {
        let listening = self.tx.send(()).unwrap_or(0);
        tracing::debug!(listening, "Shutdown triggered");
        listening
    }

    /// Servers that have not yet dropped their receiver.
    pub fn listening(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
