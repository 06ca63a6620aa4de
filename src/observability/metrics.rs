//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, backend, via
//! - `gateway_request_duration_seconds` (histogram): latency by backend and via
//! - `gateway_fallbacks_total` (counter): fallbacks to B by reason
//! - `gateway_route_cache_entries` (gauge): learned routes
//!
//! Recording without an installed exporter is a no-op, so tests never need one.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record a finished client request.
pub fn record_request(method: &str, status: u16, backend: &str, via: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("backend", backend.to_string()),
        ("via", via.to_string()),
    ];
    metrics::counter!("gateway_requests_total", &labels).increment(1);
    metrics::histogram!(
        "gateway_request_duration_seconds",
        "backend" => backend.to_string(),
        "via" => via.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a fallback from A to B.
pub fn record_fallback(reason: &str) {
    metrics::counter!("gateway_fallbacks_total", "reason" => reason.to_string()).increment(1);
}

/// Count one newly learned route.
pub fn record_cache_insert() {
    metrics::gauge!("gateway_route_cache_entries").increment(1.0);
}

/// The route cache was emptied.
pub fn reset_cache_size() {
    metrics::gauge!("gateway_route_cache_entries").set(0.0);
}
