//! Process-wide breaker registry.
//!
//! # Responsibilities
//! - Own exactly one `CircuitBreaker` per dependency name
//! - Resolve the retry / timeout policy for a dependency
//! - Apply reloaded policies without resetting breaker state
//!
//! # Design Decisions
//! - Lookup-or-create is double-checked: a shared read first, then the
//!   shard-locked entry API, so concurrent first use yields one breaker
//! - Breakers are never removed; they live as long as the registry

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::InterlinkConfig;
use crate::observability::metrics;
use crate::resilience::backoff::RetryPolicy;
use crate::resilience::circuit_breaker::{BreakerConfig, BreakerSnapshot, CircuitBreaker};
use crate::resilience::classifier::{DefaultClassifier, FailureClassifier};
use crate::resilience::client::ResilientClient;
use crate::resilience::observer::{ResilienceObserver, TelemetryObserver};

/// Everything the resilient call path needs to know about one dependency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DependencyPolicy {
    pub breaker: BreakerConfig,
    pub retry: RetryPolicy,
    pub per_attempt_timeout: Duration,
}

impl Default for DependencyPolicy {
    fn default() -> Self {
        Self {
            breaker: BreakerConfig::default(),
            retry: RetryPolicy::default(),
            per_attempt_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default)]
struct PolicyTable {
    defaults: DependencyPolicy,
    overrides: HashMap<String, DependencyPolicy>,
}

impl PolicyTable {
    fn resolve(&self, name: &str) -> DependencyPolicy {
        self.overrides.get(name).copied().unwrap_or(self.defaults)
    }
}

/// Map from dependency name to its shared breaker and policy.
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    policies: ArcSwap<PolicyTable>,
    observer: Arc<dyn ResilienceObserver>,
    classifier: Arc<dyn FailureClassifier>,
}

impl BreakerRegistry {
    pub fn new(defaults: DependencyPolicy) -> Self {
        Self {
            breakers: DashMap::new(),
            policies: ArcSwap::from_pointee(PolicyTable {
                defaults,
                overrides: HashMap::new(),
            }),
            observer: Arc::new(TelemetryObserver),
            classifier: Arc::new(DefaultClassifier),
        }
    }

    /// Registry for every dependency named in `config`, breakers created eagerly.
    pub fn from_config(config: &InterlinkConfig) -> Self {
        Self::from_config_with_observer(config, Arc::new(TelemetryObserver))
    }

    /// [`from_config`](Self::from_config) with every breaker reporting to `observer`.
    pub fn from_config_with_observer(config: &InterlinkConfig, observer: Arc<dyn ResilienceObserver>) -> Self {
        let registry = Self::new(config.defaults.to_policy()).with_observer(observer);
        registry.apply_config(config);
        registry
    }

    /// Install an observer. Only breakers created afterwards report their
    /// transitions to it; use [`from_config_with_observer`](Self::from_config_with_observer)
    /// when breakers are created eagerly.
    pub fn with_observer(mut self, observer: Arc<dyn ResilienceObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn FailureClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Replace all policies from a (re)loaded configuration.
    pub fn apply_config(&self, config: &InterlinkConfig) {
        let overrides = config
            .dependencies
            .iter()
            .map(|dep| (dep.name.clone(), config.policy_for(&dep.name).to_policy()))
            .collect();
        self.apply(config.defaults.to_policy(), overrides);

        for dep in &config.dependencies {
            self.breaker(&dep.name);
        }
    }

    /// Replace all policies. Existing breakers keep their state.
    pub fn apply(&self, defaults: DependencyPolicy, overrides: HashMap<String, DependencyPolicy>) {
        let table = PolicyTable { defaults, overrides };
        for entry in self.breakers.iter() {
            entry.value().reconfigure(table.resolve(entry.key()).breaker);
        }
        self.policies.store(Arc::new(table));
        tracing::info!(breakers = self.breakers.len(), "Resilience policies applied");
    }

    /// Override the policy of one dependency.
    pub fn set_policy(&self, name: &str, policy: DependencyPolicy) {
        let current = self.policies.load();
        let mut overrides = current.overrides.clone();
        overrides.insert(name.to_string(), policy);
        self.apply(current.defaults, overrides);
    }

    pub fn policy(&self, name: &str) -> DependencyPolicy {
        self.policies.load().resolve(name)
    }

    /// Shared breaker for `name`, created on first use.
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return Arc::clone(existing.value());
        }

        let entry = self.breakers.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!(dependency = %name, "Creating circuit breaker");
            let breaker = CircuitBreaker::with_observer(name, self.policy(name).breaker, self.observer.clone());
            metrics::record_breaker_state(name, breaker.state());
            Arc::new(breaker)
        });
        Arc::clone(entry.value())
    }

    /// Existing breaker only; never creates one.
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// All breakers, ordered by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.iter().map(|entry| entry.value().snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Resilient call handle for `name`.
    pub fn client(self: &Arc<Self>, name: &str) -> ResilientClient {
        ResilientClient::new(name, Arc::clone(self))
    }

    pub fn observer(&self) -> &dyn ResilienceObserver {
        self.observer.as_ref()
    }

    pub fn classifier(&self) -> &dyn FailureClassifier {
        self.classifier.as_ref()
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl std::fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("breakers", &self.breakers.len())
            .field("defaults", &self.policies.load().defaults)
            .finish()
    }
}
