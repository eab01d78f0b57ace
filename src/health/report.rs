//! Aggregated service health.

use serde::{Deserialize, Serialize};

use crate::health::state::HealthStatus;
use crate::resilience::circuit_breaker::BreakerSnapshot;

/// One dependency's entry in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyHealth {
    pub status: HealthStatus,
    pub critical: bool,
    pub breaker: BreakerSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub service: String,
    pub status: HealthStatus,
    pub version: String,
    pub dependencies: Vec<DependencyHealth>,
}

impl HealthReport {
    /// Aggregate breaker snapshots.
    ///
    /// Healthy when every dependency is healthy, unhealthy when a critical
    /// dependency is unhealthy, degraded otherwise.
    pub fn build<F>(service: &str, snapshots: Vec<BreakerSnapshot>, is_critical: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        let dependencies: Vec<_> = snapshots
            .into_iter()
            .map(|breaker| DependencyHealth {
                status: HealthStatus::from_snapshot(&breaker),
                critical: is_critical(&breaker.name),
                breaker,
            })
            .collect();

        let status = if dependencies.iter().all(|d| d.status == HealthStatus::Healthy) {
            HealthStatus::Healthy
        } else if dependencies
            .iter()
            .any(|d| d.critical && d.status == HealthStatus::Unhealthy)
        {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Degraded
        };

        Self {
            service: service.to_string(),
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            dependencies,
        }
    }

    /// Ready to take traffic: no critical dependency is down.
    pub fn is_ready(&self) -> bool {
        self.status != HealthStatus::Unhealthy
    }

    /// Names of dependencies that are not healthy.
    pub fn unhealthy_dependencies(&self) -> Vec<&str> {
        self.dependencies
            .iter()
            .filter(|d| d.status != HealthStatus::Healthy)
            .map(|d| d.breaker.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::CircuitState;

    fn snapshot(name: &str, state: CircuitState, failure_count: u32) -> BreakerSnapshot {
        BreakerSnapshot {
            name: name.into(),
            state,
            failure_count,
            last_transition_at_ms: 0,
            since_last_transition_ms: 0,
        }
    }

    #[test]
    fn test_all_healthy() {
        let report = HealthReport::build(
            "order-service",
            vec![
                snapshot("cart-service", CircuitState::Closed, 0),
                snapshot("product-service", CircuitState::Closed, 0),
            ],
            |_| true,
        );
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(report.is_ready());
        assert!(report.unhealthy_dependencies().is_empty());
    }

    #[test]
    fn test_no_dependencies_is_healthy() {
        let report = HealthReport::build("order-service", Vec::new(), |_| false);
        assert_eq!(report.status, HealthStatus::Healthy);
    }

    #[test]
    fn test_open_non_critical_degrades() {
        let report = HealthReport::build(
            "order-service",
            vec![
                snapshot("cart-service", CircuitState::Closed, 0),
                snapshot("notification-service", CircuitState::Open, 5),
            ],
            |name| name == "cart-service",
        );
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(report.is_ready());
        assert_eq!(report.unhealthy_dependencies(), vec!["notification-service"]);
    }

    #[test]
    fn test_open_critical_is_unhealthy() {
        let report = HealthReport::build(
            "order-service",
            vec![
                snapshot("cart-service", CircuitState::Open, 5),
                snapshot("notification-service", CircuitState::Closed, 1),
            ],
            |name| name == "cart-service",
        );
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(!report.is_ready());
        assert!(report.dependencies[0].critical);
        assert!(!report.dependencies[1].critical);
    }
}
