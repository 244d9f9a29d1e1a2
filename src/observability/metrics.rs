//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, api
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_rate_limit_total` (counter): allow/deny decisions by api
//! - `gateway_reloads_total` (counter): reload outcomes
//! - `gateway_apis_active` (gauge): APIs in the live routing table
//! - `gateway_apis_excluded_total` (counter): APIs dropped for bad config

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on the given address.
///
/// Exporter failure is logged, not fatal: the gateway serves without
/// metrics rather than refusing to boot.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed request.
pub fn record_request(method: &str, status: u16, api: &str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "api" => api.to_string()
    )
    .increment(1);

    histogram!(
        "gateway_request_duration_seconds",
        "api" => api.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a request rejected by rate limiting.
pub fn record_rate_limited(api: &str) {
    counter!(
        "gateway_rate_limit_total",
        "api" => api.to_string(),
        "decision" => "deny"
    )
    .increment(1);
}

/// Record a request admitted by rate limiting.
pub fn record_rate_allowed(api: &str) {
    counter!(
        "gateway_rate_limit_total",
        "api" => api.to_string(),
        "decision" => "allow"
    )
    .increment(1);
}

/// Record a routing table reload outcome.
pub fn record_reload(success: bool) {
    counter!(
        "gateway_reloads_total",
        "outcome" => if success { "success" } else { "failure" }
    )
    .increment(1);
}

/// Record the number of APIs in the live table.
pub fn record_active_apis(count: usize) {
    gauge!("gateway_apis_active").set(count as f64);
}

/// Record an API excluded from the table for bad plugin configuration.
pub fn record_api_excluded(api: &str) {
    counter!(
        "gateway_apis_excluded_total",
        "api" => api.to_string()
    )
    .increment(1);
}
