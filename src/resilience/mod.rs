//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Logical call to a dependency:
//!     → registry.rs (shared breaker + policy by dependency name)
//!     → client.rs (attempt loop)
//!         → circuit_breaker.rs (permit, fail fast while open)
//!         → timeouts.rs (per-attempt timeout, caller deadline / cancellation)
//!         → classifier.rs (success, transient or permanent)
//!         → backoff.rs (delay before the next attempt)
//!     → outcome.rs (Success | Failure | Degraded)
//!     → observer.rs (tracing + metrics for every step)
//! ```
//!
//! # Design Decisions
//! - One classifier decides both retrying and breaker accounting
//! - Permanent failures are never retried and never hurt breaker health
//! - Every suspension point is cancellable by the caller
//! - Fallbacks are explicit; no failure is silently turned into success

pub mod backoff;
pub mod circuit_breaker;
pub mod classifier;
pub mod client;
pub mod observer;
pub mod outcome;
pub mod registry;
pub mod timeouts;

pub use backoff::RetryPolicy;
pub use circuit_breaker::{Admission, BreakerConfig, BreakerSnapshot, CircuitBreaker, CircuitState, Permit};
pub use classifier::{DefaultClassifier, FailureClassifier, FailureKind};
pub use client::ResilientClient;
pub use observer::{ResilienceObserver, TelemetryObserver};
pub use outcome::{CallOutcome, FailureCause, ResilienceError};
pub use registry::{BreakerRegistry, DependencyPolicy};
pub use timeouts::{CallContext, CancelReason};
