//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outgoing response:
//!     → headers.rs (nosniff, no framing, no scripts, no referrer)
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - Transcoded HTML is escaped at the source; headers are the second line
//! - No trust in upstream content served through the gateway

pub mod headers;
