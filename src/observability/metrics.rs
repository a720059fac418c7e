//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rebalance_requests_total` (counter): proxied requests by method, status
//! - `rebalance_request_duration_seconds` (histogram): end-to-end latency
//! - `rebalance_upstream_failures_total` (counter): failed dispatches by service
//! - `rebalance_service_alive` (gauge): 1=alive, 0=dead, per service
//! - `rebalance_joins_total` (counter): join outcomes
//!
//! Recording is a no-op until `init_metrics` installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [("method", method.to_string()), ("status", status.to_string())];
    counter!("rebalance_requests_total", &labels).increment(1);
    histogram!("rebalance_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_failure(service: &str) {
    counter!("rebalance_upstream_failures_total", "service" => service.to_string()).increment(1);
}

pub fn record_service_alive(service: &str, alive: bool) {
    gauge!("rebalance_service_alive", "service" => service.to_string()).set(if alive { 1.0 } else { 0.0 });
}

pub fn record_join(outcome: &'static str) {
    counter!("rebalance_joins_total", "outcome" => outcome).increment(1);
}
