//! Metrics collection and exposition.
//!
//! # Metrics
//! - `breaker_failures_total` (counter): trip calls by breaker, counted
//! - `breaker_transitions_total` (counter): state changes by breaker, from, to
//! - `breaker_admissions_total` (counter): admission checks by breaker, outcome
//! - `breaker_internal_errors_total` (counter): store/lock failures by breaker, operation
//! - `breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users
//!   pay nothing unless they opt in
//! - The gauge reflects the last state this process observed; other
//!   processes sharing the store may have moved it since

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::breaker::state::BreakerState;

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_failure(breaker: &str, counted: bool) {
    counter!(
        "breaker_failures_total",
        "breaker" => breaker.to_string(),
        "counted" => if counted { "true" } else { "false" }
    )
    .increment(1);
}

pub fn record_transition(breaker: &str, from: BreakerState, to: BreakerState) {
    counter!(
        "breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    record_state(breaker, to);
}

pub fn record_admission(breaker: &str, outcome: &'static str) {
    counter!(
        "breaker_admissions_total",
        "breaker" => breaker.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_internal_error(breaker: &str, operation: &'static str) {
    counter!(
        "breaker_internal_errors_total",
        "breaker" => breaker.to_string(),
        "operation" => operation
    )
    .increment(1);
}

pub fn record_state(breaker: &str, state: BreakerState) {
    gauge!("breaker_state", "breaker" => breaker.to_string()).set(state.as_gauge());
}
