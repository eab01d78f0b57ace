//! Health reporting subsystem.
//!
//! # Data Flow
//! ```text
//! BreakerRegistry::snapshots()
//!     → state.rs (per-dependency status from breaker state)
//!     → report.rs (aggregate with criticality)
//!     → admin router (/health, /health/ready, /health/detailed)
//! ```
//!
//! # Design Decisions
//! - Health is derived from breakers; no extra probing traffic
//! - Only critical dependencies can make the service unhealthy
//! - Reading health never creates or mutates a breaker

pub mod report;
pub mod state;

pub use report::{DependencyHealth, HealthReport};
pub use state::HealthStatus;
