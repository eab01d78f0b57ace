//! Observability hooks for resilient calls.
//!
//! Every breaker transition, attempt result, terminal outcome and masked
//! failure is reported here. The default observer turns them into tracing
//! events and metrics; tests install their own to assert on them.

use std::time::Duration;

use crate::observability::metrics;
use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::classifier::FailureKind;
use crate::resilience::outcome::ResilienceError;

pub trait ResilienceObserver: Send + Sync {
    /// A breaker changed state.
    fn on_transition(&self, dependency: &str, from: CircuitState, to: CircuitState) {
        let _ = (dependency, from, to);
    }

    /// One transport attempt finished. `failure` is `None` on success.
    fn on_attempt(&self, dependency: &str, attempt: u32, failure: Option<FailureKind>, elapsed: Duration) {
        let _ = (dependency, attempt, failure, elapsed);
    }

    /// A logical call finished. `error` is `None` on success.
    fn on_outcome(&self, dependency: &str, error: Option<&ResilienceError>) {
        let _ = (dependency, error);
    }

    /// A fallback value replaced a failed call.
    fn on_fallback(&self, dependency: &str, cause: &ResilienceError) {
        let _ = (dependency, cause);
    }
}

/// Tracing + metrics observer used unless another is installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryObserver;

impl ResilienceObserver for TelemetryObserver {
    fn on_transition(&self, dependency: &str, from: CircuitState, to: CircuitState) {
        match to {
            CircuitState::Open => {
                tracing::warn!(dependency = %dependency, from = %from, to = %to, "Circuit opened")
            }
            _ => tracing::info!(dependency = %dependency, from = %from, to = %to, "Circuit state changed"),
        }
        metrics::record_transition(dependency, from, to);
    }

    fn on_attempt(&self, dependency: &str, attempt: u32, failure: Option<FailureKind>, elapsed: Duration) {
        let result = match failure {
            None => "success",
            Some(FailureKind::Transient) => "transient",
            Some(FailureKind::Permanent) => "permanent",
        };
        tracing::debug!(dependency = %dependency, attempt, result, elapsed = ?elapsed, "Attempt finished");
        metrics::record_attempt(dependency, result, elapsed);
    }

    fn on_outcome(&self, dependency: &str, error: Option<&ResilienceError>) {
        match error {
            None => metrics::record_call(dependency, "success"),
            Some(e) => {
                tracing::warn!(dependency = %dependency, error = %e, "Call failed");
                metrics::record_call(dependency, e.label());
            }
        }
    }

    fn on_fallback(&self, dependency: &str, cause: &ResilienceError) {
        tracing::warn!(dependency = %dependency, error = %cause, "Serving fallback in place of failed call");
        metrics::record_fallback(dependency, cause.label());
    }
}
