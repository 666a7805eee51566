//! Metrics collection and exposition.
//!
//! # Metrics
//! - `host_rpc_calls_total` (counter): calls by service, method, outcome
//! - `host_subscribers` (gauge): registered watch subscribers
//!
//! Without an installed recorder every call here is a no-op.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder. The handle renders `/metrics`.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    tracing::info!("Prometheus recorder installed");
    Ok(handle)
}

pub fn record_rpc_call(service: &str, method: &str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!(
        "host_rpc_calls_total",
        "service" => service.to_string(),
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn set_subscribers(count: usize) {
    gauge!("host_subscribers").set(count as f64);
}
