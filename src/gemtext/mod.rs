//! Gemtext markup subsystem.
//!
//! # Data Flow
//! ```text
//! raw bytes (file on disk, upstream response body, generated listing)
//!     → parser.rs (line classification, preformat state machine)
//!     → Document (ordered, immutable sequence of Elements)
//!     → transcode (HTML) or Display (back to gemtext)
//! ```
//!
//! # Design Decisions
//! - Parsing never fails; malformed input degrades to `Text` lines
//! - One source line produces at most one element
//! - Preformatted blocks are the only multi-line element

pub mod document;
pub mod parser;

pub use document::{Document, Element};
pub use parser::{parse, Parser};

/// Media type of gemtext documents.
pub const GEMTEXT_MIME: &str = "text/gemini";
