//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the shared site resolver and certificate store
//! - Bind the HTTP and Gemini listeners
//! - Spawn both servers on a shared shutdown broadcast
//!
//! # Design Decisions
//! - Fail fast: any bind or certificate error is fatal
//! - Listeners bind before anything is spawned, so a half-started bridge
//!   never serves traffic

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::BridgeConfig;
use crate::gemini::GeminiServer;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::net::{CertificateError, CertificateStore, Listener, ListenerError};
use crate::site::Sites;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to bind HTTP listener on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Gemini listener: {0}")]
    Listener(#[from] ListenerError),

    #[error("Certificate store: {0}")]
    Certificate(#[from] CertificateError),

    #[error("HTTP server failed: {0}")]
    Http(std::io::Error),

    #[error("Server task failed: {0}")]
    Task(String),
}

/// Running servers, joined after shutdown.
pub struct Services {
    http_addr: SocketAddr,
    gemini_addr: Option<SocketAddr>,
    http: JoinHandle<std::io::Result<()>>,
    gemini: Option<JoinHandle<Result<(), ListenerError>>>,
}

impl Services {
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// `None` when the Gemini listener is disabled.
    pub fn gemini_addr(&self) -> Option<SocketAddr> {
        self.gemini_addr
    }

    /// Wait for every server to finish draining.
    pub async fn join(self) -> Result<(), StartupError> {
        self.http
            .await
            .map_err(|e| StartupError::Task(e.to_string()))?
            .map_err(StartupError::Http)?;
        if let Some(gemini) = self.gemini {
            gemini.await.map_err(|e| StartupError::Task(e.to_string()))??;
        }
        Ok(())
    }
}

/// Build the certificate store, preloading any PEM pairs from `cert_store`.
///
/// Certificates are only generated for hosts that `sites` serves.
pub fn certificate_store(config: &BridgeConfig, sites: Arc<Sites>) -> Result<Arc<CertificateStore>, StartupError> {
    let store = CertificateStore::new(config.site.host.clone(), config.gemini.certificate_validity_years)
        .with_host_filter(move |host| sites.serves_host(host));
    if let Some(dir) = &config.gemini.cert_store {
        let loaded = store.load_dir(Path::new(dir))?;
        tracing::info!(directory = %dir, loaded, "Loaded stored certificates");
    }
    Ok(Arc::new(store))
}

/// Bind every listener and spawn the servers.
pub async fn start(config: Arc<BridgeConfig>, shutdown: &Shutdown) -> Result<Services, StartupError> {
    let sites = Arc::new(Sites::from_config(&config.site));

    let http_listener = TcpListener::bind(&config.http.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.http.bind_address.clone(),
            source,
        })?;
    let http_addr = http_listener.local_addr().map_err(StartupError::Http)?;

    let (gemini, gemini_addr) = if config.gemini.enabled {
        let certificates = certificate_store(&config, Arc::clone(&sites))?;
        let listener = Listener::bind(&config.gemini.bind_address, config.gemini.max_connections).await?;
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        let server = GeminiServer::new(&config.gemini, Arc::clone(&sites), certificates);
        let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));
        (Some(handle), Some(addr))
    } else {
        tracing::info!("Gemini listener disabled");
        (None, None)
    };

    let server = HttpServer::new(Arc::clone(&config), sites);
    let http = tokio::spawn(server.run(http_listener, shutdown.subscribe()));

    tracing::info!(
        http = %http_addr,
        gemini = ?gemini_addr,
        host = %config.site.host,
        proxy = config.proxy.enabled,
        "Bridge started"
    );

    Ok(Services {
        http_addr,
        gemini_addr,
        http,
        gemini,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config(root: &Path) -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.site.host = "example.org".to_string();
        config.site.files_directory = root.to_string_lossy().into_owned();
        config.http.bind_address = "127.0.0.1:0".to_string();
        config.gemini.bind_address = "127.0.0.1:0".to_string();
        config
    }

    #[tokio::test]
    async fn starts_and_drains() {
        let dir = tempfile::tempdir().unwrap();
        let shutdown = Shutdown::new();
        let services = start(Arc::new(local_config(dir.path())), &shutdown).await.unwrap();
        assert_ne!(services.http_addr().port(), 0);
        assert!(services.gemini_addr().is_some());

        shutdown.trigger();
        services.join().await.unwrap();
    }

    #[tokio::test]
    async fn gemini_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = local_config(dir.path());
        config.gemini.enabled = false;
        let shutdown = Shutdown::new();
        let services = start(Arc::new(config), &shutdown).await.unwrap();
        assert!(services.gemini_addr().is_none());
        shutdown.trigger();
        services.join().await.unwrap();
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = local_config(dir.path());
        config.http.bind_address = "not an address".to_string();
        let result = start(Arc::new(config), &Shutdown::new()).await;
        assert!(matches!(result, Err(StartupError::Bind { .. })));
    }

    #[test]
    fn certificates_only_for_served_hosts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("alice")).unwrap();
        let config = local_config(dir.path());
        let store = certificate_store(&config, Arc::new(Sites::from_config(&config.site))).unwrap();

        assert_eq!(store.handshake_host(Some("alice.example.org")), "alice.example.org");
        assert_eq!(store.handshake_host(Some("nobody.example.org")), "example.org");
        assert_eq!(store.handshake_host(Some("junk.invalid")), "example.org");
    }

    #[test]
    fn missing_certificate_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = local_config(dir.path());
        config.gemini.cert_store = Some(dir.path().join("absent").to_string_lossy().into_owned());
        let sites = Arc::new(Sites::from_config(&config.site));
        assert!(matches!(certificate_store(&config, sites), Err(StartupError::Certificate(_))));
    }
}
