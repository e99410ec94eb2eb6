//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): endpoint requests by endpoint, status
//! - `gateway_request_duration_seconds` (histogram): endpoint latency
//! - `gateway_backend_calls_total` (counter): backend calls by backend, outcome
//! - `gateway_backend_duration_seconds` (histogram): backend call latency
//! - `gateway_merges_total` (counter): merged responses by endpoint, completeness
//! - `gateway_concurrent_races_total` (counter): concurrent races by outcome
//!
//! # Design Decisions
//! - Recording functions are plain calls so pipeline stages stay free of labels logic
//! - The Prometheus exporter serves its own listener, separate from the gateway

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(err) => tracing::error!(address = %addr, error = %err, "Failed to install metrics exporter"),
    }
}

/// Record one served endpoint request.
pub fn record_request(endpoint: &str, status: u16, start: Instant) {
    let status = status.to_string();
    ::metrics::counter!(
        "gateway_requests_total",
        "endpoint" => endpoint.to_string(),
        "status" => status.clone()
    )
    .increment(1);
    ::metrics::histogram!(
        "gateway_request_duration_seconds",
        "endpoint" => endpoint.to_string(),
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record one backend call.
pub fn record_backend_call(backend: &str, ok: bool, start: Instant) {
    ::metrics::counter!(
        "gateway_backend_calls_total",
        "backend" => backend.to_string(),
        "outcome" => outcome(ok)
    )
    .increment(1);
    ::metrics::histogram!(
        "gateway_backend_duration_seconds",
        "backend" => backend.to_string(),
        "outcome" => outcome(ok)
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record the completeness of a merged response.
pub fn record_merge(endpoint: &str, complete: bool) {
    ::metrics::counter!(
        "gateway_merges_total",
        "endpoint" => endpoint.to_string(),
        "complete" => complete.to_string()
    )
    .increment(1);
}

/// Record whether a concurrent race produced a complete winner.
pub fn record_concurrent_winner(won: bool) {
    ::metrics::counter!("gateway_concurrent_races_total", "outcome" => outcome(won)).increment(1);
}

fn outcome(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "failure"
    }
}
