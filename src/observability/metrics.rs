//! Metrics collection and exposition.
//!
//! # Metrics
//! - `registry_heartbeats_total` (counter): heartbeats by outcome
//! - `registry_registrations_total` (counter): sidecar registrations by result
//! - `registry_variable_updates_total` (counter): batch updates by scope, result
//! - `registry_events_published_total` (counter): publishes by result
//! - `registry_services` (gauge): registered services

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

fn result_label(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "failure"
    }
}

pub fn record_heartbeat(outcome: &'static str) {
    counter!("registry_heartbeats_total", "outcome" => outcome).increment(1);
}

pub fn record_registration(ok: bool) {
    counter!("registry_registrations_total", "result" => result_label(ok)).increment(1);
}

pub fn record_variable_update(scope: &'static str, ok: bool) {
    counter!("registry_variable_updates_total", "scope" => scope, "result" => result_label(ok)).increment(1);
}

pub fn record_event_published(ok: bool) {
    counter!("registry_events_published_total", "result" => result_label(ok)).increment(1);
}

pub fn record_service_count(count: usize) {
    gauge!("registry_services").set(count as f64);
}
