//! Metrics collection and exposition.
//!
//! # Metrics
//! - `midi_router_messages_received_total` (counter): messages delivered, by endpoint
//! - `midi_router_messages_sent_total` (counter): messages forwarded, by endpoint
//! - `midi_router_send_failures_total` (counter): failed forwards, by endpoint
//! - `midi_router_ports_resolved` (gauge): resolved ports, by direction
//!
//! # Design Decisions
//! - Facade calls are no-ops until a recorder is installed
//! - Per-endpoint message counters are registered once, so install the
//!   exporter before the first session starts
//! - Prometheus exporter is opt-in

use std::net::SocketAddr;

use ::metrics::Counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Handle for messages delivered on `endpoint`.
pub fn received_counter(endpoint: &str) -> Counter {
    ::metrics::counter!("midi_router_messages_received_total", "endpoint" => endpoint.to_string())
}

/// Handle for messages forwarded to `endpoint`.
pub fn sent_counter(endpoint: &str) -> Counter {
    ::metrics::counter!("midi_router_messages_sent_total", "endpoint" => endpoint.to_string())
}

pub fn record_send_failure(endpoint: &str) {
    ::metrics::counter!("midi_router_send_failures_total", "endpoint" => endpoint.to_string())
        .increment(1);
}

pub fn record_ports_resolved(direction: &'static str, count: usize) {
    ::metrics::gauge!("midi_router_ports_resolved", "direction" => direction).set(count as f64);
}
