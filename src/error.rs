//! Request-level error taxonomy.
//!
//! Every failure reaching the HTTP or Gemini boundary is one of these and is
//! converted into a visible status there; nothing is dropped silently.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors surfaced to clients by the gateway and the site front ends.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Outbound connection, handshake or read failed.
    #[error("Gateway error: {0}")]
    Transport(String),

    /// Outbound request exceeded its deadline.
    #[error("Gateway error: request timed out after {0} seconds")]
    Timeout(u64),

    /// Upstream response outside the protocol grammar.
    #[error("Gateway error: {0}")]
    UpstreamProtocol(String),

    /// The client asked for something that cannot be addressed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// A protocol feature the gateway does not implement.
    #[error("Not supported: {0}")]
    UnsupportedFeature(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for request handling.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Transport(_) | GatewayError::Timeout(_) | GatewayError::UpstreamProtocol(_) => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::Forbidden => StatusCode::FORBIDDEN,
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::UnsupportedFeature(_) => StatusCode::NOT_IMPLEMENTED,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Native status and meta this error is reported with on the Gemini listener.
    pub fn gemini_status(&self) -> (u8, &'static str) {
        match self {
            GatewayError::NotFound | GatewayError::Forbidden => (51, "Not found"),
            GatewayError::BadRequest(_) | GatewayError::MethodNotAllowed => (59, "Bad request"),
            GatewayError::Transport(_) | GatewayError::Timeout(_) | GatewayError::UpstreamProtocol(_) => {
                (43, "Proxy error")
            }
            GatewayError::UnsupportedFeature(_) | GatewayError::Internal(_) => (40, "Temporary failure"),
        }
    }
}
