//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_decisions_total` (counter): gating outcomes by decision
//! - `gateway_requests_total` (counter): protected handler responses by route, status
//! - `gateway_handler_duration_seconds` (histogram): protected handler latency by route
//! - `gateway_rate_limited_total` (counter): rate-limit rejections by route
//! - `gateway_usage_rejected_total` (counter): quota rejections by kind
//! - `gateway_identity_errors_total` (counter): identity provider failures
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::quota::QuotaKind;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_decision(decision: &'static str) {
    metrics::counter!("gateway_decisions_total", "decision" => decision).increment(1);
}

pub fn record_request(route: &str, status: u16, started: Instant) {
    let route = route.to_string();
    metrics::counter!(
        "gateway_requests_total",
        "route" => route.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_handler_duration_seconds", "route" => route)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_rate_limited(route: &str) {
    metrics::counter!("gateway_rate_limited_total", "route" => route.to_string()).increment(1);
}

pub fn record_usage_rejected(kind: QuotaKind) {
    metrics::counter!("gateway_usage_rejected_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_identity_error() {
    metrics::counter!("gateway_identity_errors_total").increment(1);
}
