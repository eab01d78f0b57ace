//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Resilience events (transitions, attempts, outcomes, fallbacks):
//!     → resilience::observer::TelemetryObserver
//!         → logging (structured tracing events)
//!         → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID of a logical call is attached to retry logs
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
