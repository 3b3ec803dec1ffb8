//! HTTP front end.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout, security headers)
//!     → dispatch by Host
//!         proxy.<host>  → proxy::Gateway
//!         anything else → site.rs (hosted sites)
//!     → response.rs (error pages, redirects)
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod site;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use response::{redirect, ErrorPage};
pub use server::{AppState, HttpServer};
