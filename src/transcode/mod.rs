//! Gemtext → HTML transcoding subsystem.
//!
//! # Data Flow
//! ```text
//! Document + LinkResolver (base URL, native link policy)
//!     → html.rs (one HTML block per element, title extraction)
//!     → TranscodedPage { title, body }
//!     → page.rs (full HTML document, error and interstitial pages)
//! ```
//!
//! # Design Decisions
//! - Exhaustive match over element kinds; adding a kind is a compile error here
//! - Every piece of source text is escaped; nothing in gemtext can inject markup
//! - Output is produced on demand and never cached

pub mod html;
pub mod links;
pub mod page;

pub use html::{escape_html, render, TranscodedPage};
pub use links::{LinkResolver, NativeLinks};
pub use page::{render_error_page, render_interstitial, render_page, PageContext};
