//! HTTP → Gemini gateway.
//!
//! # Data Flow
//! ```text
//! GET /<host>/<path>?<query>
//!     → handler.rs (method check, target URL, default port)
//!     → gemini::client (connect, TLS, request line, header)
//!     → status.rs (native status → HTTP status + action)
//!     → transcode (gemtext → HTML page) or streamed passthrough
//! ```

pub mod handler;
pub mod status;

pub use handler::{target_url, Gateway};
pub use status::{map_status, Action, RedirectTarget, StatusDecision};
