//! Metrics collection and exposition.
//!
//! # Metrics
//! - `interlink_calls_total` (counter): logical calls by dependency, outcome
//! - `interlink_attempts_total` (counter): transport attempts by dependency, result
//! - `interlink_attempt_duration_seconds` (histogram): per-attempt latency
//! - `interlink_breaker_transitions_total` (counter): breaker transitions by from, to
//! - `interlink_breaker_state` (gauge): 0=closed, 1=half_open, 2=open
//! - `interlink_fallbacks_total` (counter): fallbacks served by masked cause
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels are limited to dependency name and small fixed enums

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe();
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

fn describe() {
    describe_counter!("interlink_calls_total", "Logical resilient calls by outcome");
    describe_counter!("interlink_attempts_total", "Transport attempts by result");
    describe_histogram!("interlink_attempt_duration_seconds", "Latency of single transport attempts");
    describe_counter!("interlink_breaker_transitions_total", "Circuit breaker state transitions");
    describe_gauge!("interlink_breaker_state", "Circuit state (0=closed, 1=half_open, 2=open)");
    describe_counter!("interlink_fallbacks_total", "Fallback values served in place of failed calls");
}

pub fn record_call(dependency: &str, outcome: &'static str) {
    counter!("interlink_calls_total", "dependency" => dependency.to_string(), "outcome" => outcome).increment(1);
}

pub fn record_attempt(dependency: &str, result: &'static str, elapsed: Duration) {
    counter!("interlink_attempts_total", "dependency" => dependency.to_string(), "result" => result).increment(1);
    histogram!("interlink_attempt_duration_seconds", "dependency" => dependency.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_transition(dependency: &str, from: CircuitState, to: CircuitState) {
    counter!(
        "interlink_breaker_transitions_total",
        "dependency" => dependency.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    record_breaker_state(dependency, to);
}

pub fn record_breaker_state(dependency: &str, state: CircuitState) {
    gauge!("interlink_breaker_state", "dependency" => dependency.to_string()).set(state.gauge_value());
}

pub fn record_fallback(dependency: &str, cause: &'static str) {
    counter!("interlink_fallbacks_total", "dependency" => dependency.to_string(), "cause" => cause).increment(1);
}
