//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): forwarded requests by method, status
//! - `proxy_request_duration_seconds` (histogram): time to upstream response head
//! - `proxy_errors_total` (counter): request errors by kind
//! - `proxy_tunnels_active` (gauge): established CONNECT tunnels
//! - `proxy_tunnel_bytes_total` (counter): tunneled bytes by direction
//!
//! The facade is a no-op until an exporter is installed, so handlers record
//! unconditionally.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_error(kind: &'static str) {
    metrics::counter!("proxy_errors_total", "kind" => kind).increment(1);
}

pub fn tunnel_opened() {
    metrics::gauge!("proxy_tunnels_active").increment(1.0);
}

pub fn tunnel_closed(client_to_upstream: u64, upstream_to_client: u64) {
    metrics::gauge!("proxy_tunnels_active").decrement(1.0);
    metrics::counter!("proxy_tunnel_bytes_total", "direction" => "upload")
        .increment(client_to_upstream);
    metrics::counter!("proxy_tunnel_bytes_total", "direction" => "download")
        .increment(upstream_to_client);
}
