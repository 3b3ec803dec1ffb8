//! gemini-bridge
//!
//! Serves per-tenant gemtext sites to both Gemini and HTTP clients, and
//! exposes a gateway on `proxy.<host>` that fetches arbitrary Gemini
//! capsules for browsers.
//!
//! # Architecture Overview
//!
//! ```text
//!   HTTP client ──▶ http::server ──┬─ proxy.<host> ──▶ proxy::Gateway ──▶ gemini::client ──▶ remote capsule
//!                                  │                        │
//!                                  │                        └─ gemtext ─▶ transcode (HTML)
//!                                  └─ <tenant>.<host> ──▶ http::site ──┐
//!                                                                      ├─▶ site::Sites (files, listings, feeds)
//!   Gemini client ─▶ net::Listener ─▶ gemini::server ──────────────────┘
//!                         │
//!                         └─ net::tls (per-host self-signed certificates)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use gemini_bridge::config::load_or_default;
use gemini_bridge::lifecycle::{start, wait_for_signal, Shutdown};
use gemini_bridge::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "gemini-bridge")]
#[command(about = "Serve gemtext sites over Gemini and HTTP, with an HTTP gateway to Geminispace", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gemini-bridge.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(&cli.config)?;

    logging::init_tracing(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gemini-bridge starting");
    tracing::info!(
        config = %cli.config.display(),
        host = %config.site.host,
        files_directory = %config.site.files_directory,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let services = start(Arc::new(config), &shutdown).await?;

    let signal = wait_for_signal().await;
    tracing::info!(signal, "Shutdown signal received");
    shutdown.trigger();
    services.join().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
