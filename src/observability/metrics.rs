//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): gateway requests by native and HTTP status
//! - `gateway_request_duration_seconds` (histogram): upstream latency
//! - `site_requests_total` (counter): hosted-site HTTP requests by outcome
//! - `gemini_requests_total` (counter): Gemini listener requests by status
//! - `certificates_issued_total` (counter): generated certificates
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Recording before `init_metrics` is a silent no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// One gateway request; `native` is 0 when no upstream header was read.
pub fn record_gateway_request(native: u16, http_status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "native_status" => native.to_string(),
        "status" => http_status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// One hosted-site HTTP request.
pub fn record_site_request(outcome: &'static str, http_status: u16) {
    counter!(
        "site_requests_total",
        "outcome" => outcome,
        "status" => http_status.to_string()
    )
    .increment(1);
}

/// One request answered by the Gemini listener.
pub fn record_gemini_request(status: u8) {
    counter!("gemini_requests_total", "status" => status.to_string()).increment(1);
}

pub fn record_certificate_issued() {
    counter!("certificates_issued_total").increment(1);
}
