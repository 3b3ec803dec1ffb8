//! Error and redirect responses.
//!
//! # Responsibilities
//! - Render every non-success status as a human-readable HTML page
//! - Map [`GatewayError`] onto those pages
//!
//! # Design Decisions
//! - Error pages carry the site title so they look like the rest of the site
//! - 405 responses list the allowed methods

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};

use crate::error::GatewayError;
use crate::transcode::render_error_page;

const ALLOWED_METHODS: &str = "GET, HEAD";

/// An HTML error page.
#[derive(Debug, Clone)]
pub struct ErrorPage {
    pub status: StatusCode,
    pub message: String,
    pub site_title: String,
}

impl ErrorPage {
    pub fn new(status: StatusCode, message: impl Into<String>, site_title: &str) -> Self {
        Self {
            status,
            message: message.into(),
            site_title: site_title.to_string(),
        }
    }

    pub fn from_error(error: &GatewayError, site_title: &str) -> Self {
        Self::new(error.status(), error.to_string(), site_title)
    }
}

impl IntoResponse for ErrorPage {
    fn into_response(self) -> Response {
        let reason = self.status.canonical_reason().unwrap_or("Error");
        let body = render_error_page(&self.site_title, self.status.as_u16(), reason, &self.message);
        let mut response = (self.status, Html(body)).into_response();
        if self.status == StatusCode::METHOD_NOT_ALLOWED {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
        }
        response
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        ErrorPage::from_error(&self, "").into_response()
    }
}

/// A redirect to `location`: 301 when permanent, 302 otherwise.
pub fn redirect(location: &str, permanent: bool) -> Response {
    let status = if permanent {
        StatusCode::MOVED_PERMANENTLY
    } else {
        StatusCode::FOUND
    };
    match HeaderValue::from_str(location) {
        Ok(value) => (status, [(header::LOCATION, value)]).into_response(),
        Err(_) => ErrorPage::new(StatusCode::BAD_GATEWAY, "Gateway error: unusable redirect target", "")
            .into_response(),
    }
}
