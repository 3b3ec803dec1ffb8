//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize, absolute files directory)
//!     → validation.rs (semantic checks, all errors at once)
//!     → BridgeConfig (validated, immutable)
//!     → shared via Arc with the HTTP server and the Gemini listener
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::BridgeConfig;
pub use schema::{GeminiConfig, HttpConfig, ObservabilityConfig, ProxyConfig, SecurityConfig, SiteConfig};
