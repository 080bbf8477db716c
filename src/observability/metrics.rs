//! Metrics collection and exposition.
//!
//! # Metrics
//! - `module_host_handlers_created_total` (counter): handlers issued, by module
//! - `module_host_module_faults_total` (counter): caught faults, by module and hook
//! - `module_host_requests_total` (counter): dispatched requests, by module and status
//! - `module_host_request_duration_seconds` (histogram): latency, by module
//! - `module_host_active_modules` (gauge): modules currently Active
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Labels are module names and hook names only (bounded cardinality)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_handler_created(module: &str) {
    metrics::counter!("module_host_handlers_created_total", "module" => module.to_string()).increment(1);
}

pub fn record_module_fault(module: &str, hook: &'static str) {
    metrics::counter!(
        "module_host_module_faults_total",
        "module" => module.to_string(),
        "hook" => hook
    )
    .increment(1);
}

pub fn record_request(module: &str, status: u16, start: Instant) {
    metrics::counter!(
        "module_host_requests_total",
        "module" => module.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("module_host_request_duration_seconds", "module" => module.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn set_active_modules(count: usize) {
    metrics::gauge!("module_host_active_modules").set(count as f64);
}
