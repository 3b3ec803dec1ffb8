//! Gemini ↔ HTTP bridge library.

pub mod config;
pub mod error;
pub mod gemini;
pub mod gemtext;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod security;
pub mod site;
pub mod transcode;

pub use config::BridgeConfig;
pub use error::{GatewayError, GatewayResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
