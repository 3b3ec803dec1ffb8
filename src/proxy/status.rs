//! Native status → HTTP status mapping.
//!
//! # Responsibilities
//! - Total mapping over every two-digit native status
//! - Redirect resolution against the original request URL
//! - Decide between following a redirect and showing an interstitial
//!
//! # Design Decisions
//! - Pure function; no I/O, no transport knowledge
//! - Each redirect is surfaced as one hop, never followed here
//! - A bad redirect target is a gateway error (502), not a panic

use axum::http::StatusCode;
use url::Url;

use crate::gemini::{gateway_path, SCHEME};

/// Where a native redirect leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectTarget {
    /// Location inside the gateway's `/host/path` address space.
    Gateway(String),
    /// A non-native destination, announced instead of followed.
    External(Url),
}

/// What the gateway should do with an upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ShowBody,
    ShowBodyAsError(String),
    Redirect(RedirectTarget),
    PromptInput,
    /// A protocol feature the gateway does not implement.
    Unsupported(String),
}

/// Outcome of mapping one upstream response header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusDecision {
    pub status: StatusCode,
    pub action: Action,
}

impl StatusDecision {
    fn new(status: StatusCode, action: Action) -> Self {
        Self { status, action }
    }

    fn upstream_error(status: StatusCode, native: u16, meta: &str) -> Self {
        Self::new(
            status,
            Action::ShowBodyAsError(format!("The remote server returned {}: {}", native, meta)),
        )
    }
}

/// Map a native response status onto HTTP semantics.
pub fn map_status(native: u16, meta: &str, request_url: &Url) -> StatusDecision {
    match native {
        10..=19 => StatusDecision::new(StatusCode::INTERNAL_SERVER_ERROR, Action::PromptInput),
        20..=29 => StatusDecision::new(StatusCode::OK, Action::ShowBody),
        30..=39 => map_redirect(meta, request_url),
        40..=44 => StatusDecision::upstream_error(StatusCode::SERVICE_UNAVAILABLE, native, meta),
        50 | 51 => StatusDecision::upstream_error(StatusCode::NOT_FOUND, native, meta),
        52 | 53 | 59 => StatusDecision::upstream_error(StatusCode::SERVICE_UNAVAILABLE, native, meta),
        60..=69 => StatusDecision::new(
            StatusCode::NOT_IMPLEMENTED,
            Action::Unsupported(format!(
                "The remote server requires a client certificate ({}: {}), which this gateway does not support",
                native, meta
            )),
        ),
        _ => StatusDecision::new(
            StatusCode::NOT_IMPLEMENTED,
            Action::Unsupported(format!(
                "Protocol response not understood: Gemini status {}",
                native
            )),
        ),
    }
}

fn map_redirect(meta: &str, request_url: &Url) -> StatusDecision {
    let bad_redirect = |reason: String| {
        StatusDecision::new(
            StatusCode::BAD_GATEWAY,
            Action::ShowBodyAsError(format!("Gateway error: bad redirect {}", reason)),
        )
    };

    let meta = meta.trim();
    if meta.is_empty() {
        return bad_redirect("(empty target)".to_string());
    }

    let next = match request_url.join(meta) {
        Ok(next) => next,
        Err(e) => return bad_redirect(format!("{:?}: {}", meta, e)),
    };

    if next.scheme() != SCHEME {
        return StatusDecision::new(StatusCode::OK, Action::Redirect(RedirectTarget::External(next)));
    }

    match gateway_path(&next) {
        Some(location) => StatusDecision::new(StatusCode::FOUND, Action::Redirect(RedirectTarget::Gateway(location))),
        None => bad_redirect(format!("{:?}: missing host", meta)),
    }
}
