//! Hosted sites.
//!
//! # Data Flow
//! ```text
//! Host header / request URL
//!     → tenant.rs (custom domain or first DNS label)
//!     → resolve.rs (normalize path, hidden folder, redirects)
//!         → lister.rs (directory listing, stat)
//!         → feed.rs (gemlog Atom feed, gemfeed page)
//!         → listing.rs (generated directory and tenant index pages)
//!     → Resource
//!     → negotiate.rs (raw gemtext, HTML or passthrough, HTTP only)
//! ```

pub mod feed;
pub mod lister;
pub mod listing;
pub mod negotiate;
pub mod resolve;
pub mod tenant;

pub use feed::{build_feed, Feed, FeedEntry, FeedError, ATOM_MIME};
pub use lister::{DirEntry, DirectoryLister, FsLister};
pub use negotiate::{negotiate, Representation};
pub use resolve::{Protocol, Resource, Sites};
pub use tenant::{resolve_tenant, Tenant};
