//! Native protocol (Gemini) subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound (gateway):
//!     proxy handler → client.rs (TCP + TLS + request line, under deadline)
//!         → response.rs (header parse, body stream owned by caller)
//!
//! Inbound (listener):
//!     net::listener (bounded accept) → net::tls (per-host certificate)
//!         → server.rs (request line, tenant lookup) → site resolver
//!         → response header + body
//! ```
//!
//! # Design Decisions
//! - Trust on first use: the client accepts any server certificate
//! - A response body is a plain owned stream; dropping it closes the connection
//! - Header lines are bounded (1024 bytes of URL/meta plus status and CRLF)

pub mod client;
pub mod response;
pub mod server;

pub use client::{tofu_client_config, GeminiClient};
pub use response::{GeminiResponse, ResponseHeader};
pub use server::GeminiServer;

use url::Url;

/// URL scheme of the native protocol.
pub const SCHEME: &str = "gemini";

/// Port used when a target host does not name one.
pub const DEFAULT_PORT: u16 = 1965;

/// Maximum length of a request URL or response meta, in bytes.
pub const MAX_LINE_LEN: usize = 1024;

/// Map a `gemini://host[:port]/path?query` URL into the gateway's
/// `/host[:port]/path?query` address space.
///
/// Returns `None` for URLs without a host.
pub fn gateway_path(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    // Non-special schemes keep an empty path for `gemini://host`.
    let url_path = if url.path().is_empty() { "/" } else { url.path() };
    let mut path = match url.port() {
        Some(port) => format!("/{}:{}{}", host, port, url_path),
        None => format!("/{}{}", host, url_path),
    };
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    Some(path)
}
