//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: a single probe tests whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive transient failures >= failure_threshold
//! Open → Half-Open: first permit_call after recovery_timeout (reserves the probe)
//! Half-Open → Closed: success_threshold consecutive probes succeed
//! Half-Open → Open: probe fails (recovery timer restarts)
//! ```
//!
//! # Design Decisions
//! - One breaker per dependency, shared by every caller
//! - All reads and transitions happen under one mutex; I/O never does
//! - Every transition bumps a generation; reports from permits issued in an
//!   older generation are ignored
//! - A permit dropped without a report (permanent failure, cancellation)
//!   hands the probe slot back without touching breaker health
//! - Transitions reach the observer in generation order; one that loses
//!   the race to a newer transition is dropped

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

use crate::resilience::observer::{ResilienceObserver, TelemetryObserver};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    pub fn gauge_value(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds for one breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive transient failures that open the circuit (>= 1).
    pub failure_threshold: u32,
    /// Time the circuit stays open before a probe is allowed.
    pub recovery_timeout: Duration,
    /// Consecutive successful probes needed to close again (>= 1).
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 1,
        }
    }
}

/// Read-only view for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    /// Wall-clock time of the last transition, milliseconds since the epoch.
    pub last_transition_at_ms: u64,
    pub since_last_transition_ms: u64,
}

/// Result of asking the breaker for permission.
#[derive(Debug)]
pub enum Admission<'a> {
    Allowed(Permit<'a>),
    Rejected,
}

impl Admission<'_> {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed(_))
    }
}

/// Permission for exactly one transport attempt.
///
/// Report the result with [`Permit::on_success`] or [`Permit::on_failure`].
#[derive(Debug)]
#[must_use = "dropping a permit discards the attempt result"]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    probe: bool,
    settled: bool,
}

impl Permit<'_> {
    /// Whether this permit holds the half-open probe slot.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn on_success(mut self) {
        self.settled = true;
        self.breaker.record_success(self.generation, self.probe);
    }

    /// Report a transient failure. Permanent failures are never reported.
    pub fn on_failure(mut self) {
        self.settled = true;
        self.breaker.record_failure(self.generation, self.probe);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.release_probe(self.generation);
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    half_open_successes: u32,
    generation: u64,
    last_transition_at: Instant,
    last_transition_wall: SystemTime,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            opened_at: None,
            probe_in_flight: false,
            half_open_successes: 0,
            generation: 0,
            last_transition_at: Instant::now(),
            last_transition_wall: SystemTime::now(),
        }
    }

    fn transition(&mut self, to: CircuitState, now: Instant) -> Transition {
        let from = self.state;
        self.state = to;
        self.generation += 1;
        self.probe_in_flight = false;
        self.half_open_successes = 0;
        self.last_transition_at = now;
        self.last_transition_wall = SystemTime::now();
        match to {
            CircuitState::Closed => {
                self.failure_count = 0;
                self.opened_at = None;
            }
            // failure_count stays frozen while open and half-open
            CircuitState::Open => self.opened_at = Some(now),
            CircuitState::HalfOpen => {}
        }
        Transition {
            from,
            to,
            generation: self.generation,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    from: CircuitState,
    to: CircuitState,
    generation: u64,
}

/// Per-dependency circuit breaker.
pub struct CircuitBreaker {
    name: String,
    config: ArcSwap<BreakerConfig>,
    inner: Mutex<Inner>,
    /// Generation of the last transition handed to the observer.
    published: Mutex<u64>,
    observer: Arc<dyn ResilienceObserver>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self::with_observer(name, config, Arc::new(TelemetryObserver))
    }

    pub fn with_observer(
        name: impl Into<String>,
        config: BreakerConfig,
        observer: Arc<dyn ResilienceObserver>,
    ) -> Self {
        Self {
            name: name.into(),
            config: ArcSwap::from_pointee(config),
            inner: Mutex::new(Inner::new()),
            published: Mutex::new(0),
            observer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> BreakerConfig {
        **self.config.load()
    }

    /// Swap thresholds in place; current state and counters are kept.
    pub fn reconfigure(&self, config: BreakerConfig) {
        self.config.store(Arc::new(config));
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Ask to make one call. May move Open → HalfOpen and reserve the probe.
    pub fn permit_call(&self) -> Admission<'_> {
        let now = Instant::now();
        let recovery_timeout = self.config.load().recovery_timeout;

        let (ticket, transition) = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed => (Some((inner.generation, false)), None),
                CircuitState::Open => {
                    let elapsed = inner
                        .opened_at
                        .map_or(Duration::MAX, |at| now.saturating_duration_since(at));
                    if elapsed >= recovery_timeout {
                        let transition = inner.transition(CircuitState::HalfOpen, now);
                        inner.probe_in_flight = true;
                        (Some((inner.generation, true)), Some(transition))
                    } else {
                        (None, None)
                    }
                }
                CircuitState::HalfOpen if !inner.probe_in_flight => {
                    inner.probe_in_flight = true;
                    (Some((inner.generation, true)), None)
                }
                CircuitState::HalfOpen => (None, None),
            }
        };

        self.notify(transition);
        match ticket {
            Some((generation, probe)) => Admission::Allowed(Permit {
                breaker: self,
                generation,
                probe,
                settled: false,
            }),
            None => Admission::Rejected,
        }
    }

    /// Current state without side effects.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            last_transition_at_ms: inner
                .last_transition_wall
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            since_last_transition_ms: inner.last_transition_at.elapsed().as_millis() as u64,
        }
    }

    fn record_success(&self, generation: u64, probe: bool) {
        let success_threshold = self.config.load().success_threshold;
        let transition = {
            let mut inner = self.lock();
            if inner.generation != generation {
                None
            } else {
                match inner.state {
                    CircuitState::Closed => {
                        inner.failure_count = 0;
                        None
                    }
                    CircuitState::HalfOpen if probe => {
                        inner.half_open_successes += 1;
                        if inner.half_open_successes >= success_threshold {
                            Some(inner.transition(CircuitState::Closed, Instant::now()))
                        } else {
                            inner.probe_in_flight = false;
                            None
                        }
                    }
                    _ => None,
                }
            }
        };
        self.notify(transition);
    }

    fn record_failure(&self, generation: u64, probe: bool) {
        let failure_threshold = self.config.load().failure_threshold;
        let transition = {
            let mut inner = self.lock();
            if inner.generation != generation {
                None
            } else {
                match inner.state {
                    CircuitState::Closed => {
                        inner.failure_count += 1;
                        if inner.failure_count >= failure_threshold {
                            Some(inner.transition(CircuitState::Open, Instant::now()))
                        } else {
                            None
                        }
                    }
                    CircuitState::HalfOpen if probe => {
                        Some(inner.transition(CircuitState::Open, Instant::now()))
                    }
                    _ => None,
                }
            }
        };
        self.notify(transition);
    }

    fn release_probe(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation && inner.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
        }
    }

    fn notify(&self, transition: Option<Transition>) {
        let Some(transition) = transition else {
            return;
        };
        let mut published = self.published.lock().expect("circuit breaker mutex poisoned");
        if *published >= transition.generation {
            tracing::debug!(
                dependency = %self.name,
                from = %transition.from,
                to = %transition.to,
                "Dropping superseded transition"
            );
            return;
        }
        *published = transition.generation;
        self.observer.on_transition(&self.name, transition.from, transition.to);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config())
            .field("state", &self.state())
            .finish()
    }
}
