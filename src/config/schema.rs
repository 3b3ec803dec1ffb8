//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Hosted sites: hostnames, content root, reserved folders.
    pub site: SiteConfig,

    /// HTTP listener.
    pub http: HttpConfig,

    /// Gemini listener.
    pub gemini: GeminiConfig,

    /// HTTP → Gemini gateway.
    pub proxy: ProxyConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    pub security: SecurityConfig,
}

/// Hosted site configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Main hostname; tenants live on its subdomains.
    pub host: String,

    /// Directory holding one content root per tenant.
    pub files_directory: String,

    /// Shown in page headers and feed titles.
    pub site_title: String,

    /// Folder inside a tenant root that is never served.
    pub hidden_folder: String,

    /// Folder inside a tenant root holding dated posts.
    pub gemlog_folder: String,

    /// Custom domains: full hostname → tenant name.
    pub domains: BTreeMap<String, String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            files_directory: "./files".to_string(),
            site_title: "Gemini Bridge".to_string(),
            hidden_folder: ".hidden".to_string(),
            gemlog_folder: "gemlog".to_string(),
            domains: BTreeMap::new(),
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Total time allowed for one HTTP request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 120,
        }
    }
}

/// Gemini listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub enabled: bool,

    /// Bind address (e.g., "0.0.0.0:1965").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Time allowed for TLS handshake and request line, in seconds.
    pub read_timeout_secs: u64,

    /// Time allowed for writing one response, in seconds.
    pub write_timeout_secs: u64,

    /// Directory of pre-provisioned `<hostname>.crt` / `<hostname>.key` pairs.
    pub cert_store: Option<String>,

    /// Validity of generated certificates, in years.
    pub certificate_validity_years: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:1965".to_string(),
            max_connections: 1_000,
            read_timeout_secs: 60,
            write_timeout_secs: 120,
            cert_store: None,
            certificate_validity_years: 100,
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub enabled: bool,

    /// Label under the main host that serves the gateway (`proxy.<host>`).
    pub subdomain: String,

    /// Deadline for one upstream exchange, in seconds.
    pub timeout_secs: u64,

    /// Port used when the target host names none.
    pub default_port: u16,

    /// Largest gemtext body transcoded to HTML, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            subdomain: "proxy".to_string(),
            timeout_secs: 60,
            default_port: 1965,
            max_body_bytes: 5 * 1024 * 1024, // 5MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Add security headers to HTTP responses.
    pub enable_headers: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self { enable_headers: true }
    }
}

impl BridgeConfig {
    /// Hostname the gateway answers on.
    pub fn proxy_host(&self) -> String {
        format!("{}.{}", self.proxy.subdomain, self.site.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: BridgeConfig = toml::from_str(
            r#"
            [site]
            host = "flounder.example"

            [site.domains]
            "alice.example" = "alice"
            "#,
        )
        .unwrap();
        assert_eq!(config.site.host, "flounder.example");
        assert_eq!(config.site.gemlog_folder, "gemlog");
        assert_eq!(config.site.domains.get("alice.example").map(String::as_str), Some("alice"));
        assert_eq!(config.proxy.timeout_secs, 60);
        assert_eq!(config.gemini.certificate_validity_years, 100);
        assert_eq!(config.proxy_host(), "proxy.flounder.example");
    }
}
