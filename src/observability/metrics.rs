//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_requests_total` (counter): requests by method, status
//! - `gate_request_duration_seconds` (histogram): end-to-end latency
//! - `gate_cors_rejections_total` (counter): disallowed origins
//! - `gate_auth_failures_total` (counter): rejected bearer tokens by reason
//! - `gate_login_lockouts_total` (counter): clients reaching the attempt limit
//! - `gate_counter_store_errors_total` (counter): failed counter store calls
//! - `gate_readiness_checks_total` (counter): readiness checks by check, outcome
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; without an installed recorder
//!   every call is a no-op
//! - Exposed by the Prometheus exporter's own HTTP listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and start its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!(
        "gate_requests_total",
        "method" => method.to_string(),
        "status" => status.clone()
    )
    .increment(1);
    histogram!(
        "gate_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_cors_rejection() {
    counter!("gate_cors_rejections_total").increment(1);
}

pub fn record_auth_failure(reason: &'static str) {
    counter!("gate_auth_failures_total", "reason" => reason).increment(1);
}

pub fn record_login_lockout() {
    counter!("gate_login_lockouts_total").increment(1);
}

pub fn record_store_error() {
    counter!("gate_counter_store_errors_total").increment(1);
}

pub fn record_readiness_check(check: &str, ok: bool) {
    counter!(
        "gate_readiness_checks_total",
        "check" => check.to_string(),
        "outcome" => if ok { "ok" } else { "failed" }
    )
    .increment(1);
}
