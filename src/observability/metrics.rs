//! Metrics collection and exposition.
//!
//! # Metrics
//! - `edge_requests_total` (counter): requests by method, status
//! - `edge_request_duration_seconds` (histogram): latency distribution
//! - `edge_redirects_total` (counter): redirects synthesized at viewer-request
//! - `edge_function_errors_total` (counter): function failures by phase
//! - `edge_origin_errors_total` (counter): origin failures by kind
//! - `edge_origin_retries_total` (counter): origin retry attempts
//!
//! Recording without an installed recorder is a no-op, so tests and the
//! CLI need no setup.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::edge::Phase;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "edge_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("edge_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_redirect() {
    metrics::counter!("edge_redirects_total").increment(1);
}

pub fn record_function_error(phase: Phase) {
    metrics::counter!("edge_function_errors_total", "phase" => phase.as_str()).increment(1);
}

pub fn record_origin_error(kind: &'static str) {
    metrics::counter!("edge_origin_errors_total", "kind" => kind).increment(1);
}

pub fn record_origin_retry() {
    metrics::counter!("edge_origin_retries_total").increment(1);
}
