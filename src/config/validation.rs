//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Reserved folder names and tenant names stay single path components
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::BridgeConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.site.host.trim().is_empty() {
        errors.push(ValidationError::new("site.host", "must not be empty"));
    }
    if config.site.files_directory.trim().is_empty() {
        errors.push(ValidationError::new("site.files_directory", "must not be empty"));
    }
    check_component(&mut errors, "site.hidden_folder", &config.site.hidden_folder);
    check_component(&mut errors, "site.gemlog_folder", &config.site.gemlog_folder);
    for (domain, tenant) in &config.site.domains {
        check_component(&mut errors, &format!("site.domains.{}", domain), tenant);
    }

    check_address(&mut errors, "http.bind_address", &config.http.bind_address);
    if config.http.request_timeout_secs == 0 {
        errors.push(ValidationError::new("http.request_timeout_secs", "must be greater than 0"));
    }

    if config.gemini.enabled {
        check_address(&mut errors, "gemini.bind_address", &config.gemini.bind_address);
        if config.gemini.max_connections == 0 {
            errors.push(ValidationError::new("gemini.max_connections", "must be greater than 0"));
        }
        if config.gemini.read_timeout_secs == 0 {
            errors.push(ValidationError::new("gemini.read_timeout_secs", "must be greater than 0"));
        }
        if config.gemini.write_timeout_secs == 0 {
            errors.push(ValidationError::new("gemini.write_timeout_secs", "must be greater than 0"));
        }
    }
    if !(1..=1000).contains(&config.gemini.certificate_validity_years) {
        errors.push(ValidationError::new(
            "gemini.certificate_validity_years",
            "must be between 1 and 1000",
        ));
    }

    if config.proxy.enabled {
        if config.proxy.subdomain.is_empty() || config.proxy.subdomain.contains('.') {
            errors.push(ValidationError::new("proxy.subdomain", "must be a single DNS label"));
        }
        if config.proxy.timeout_secs == 0 {
            errors.push(ValidationError::new("proxy.timeout_secs", "must be greater than 0"));
        }
        if config.proxy.default_port == 0 {
            errors.push(ValidationError::new("proxy.default_port", "must be a valid port"));
        }
        if config.proxy.max_body_bytes == 0 {
            errors.push(ValidationError::new("proxy.max_body_bytes", "must be greater than 0"));
        }
    }

    if config.observability.metrics_enabled {
        check_address(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("{:?} is not a socket address", value)));
    }
}

fn check_component(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.is_empty() || value == "." || value == ".." || value.contains('/') || value.contains('\\') {
        errors.push(ValidationError::new(field, format!("{:?} must be a single path component", value)));
    }
}
