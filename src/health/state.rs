//! Dependency health derived from breaker state.
//!
//! # States
//! - Healthy: breaker closed, no recent failures
//! - Degraded: closed with failures counted, or half-open probing
//! - Unhealthy: breaker open, calls fail fast

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn from_snapshot(snapshot: &BreakerSnapshot) -> Self {
        match snapshot.state {
            CircuitState::Closed if snapshot.failure_count == 0 => HealthStatus::Healthy,
            CircuitState::Closed | CircuitState::HalfOpen => HealthStatus::Degraded,
            CircuitState::Open => HealthStatus::Unhealthy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
