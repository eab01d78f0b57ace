//! Resilient inter-service calls: circuit breaking, retries with jittered
//! backoff, timeouts and explicit fallbacks for calls to named dependencies.

pub mod admin;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::InterlinkConfig;
pub use http::{RequestOptions, ServiceClient, TransportError, TransportResponse};
pub use lifecycle::Shutdown;
pub use resilience::{BreakerRegistry, CallContext, CallOutcome, CircuitState, ResilienceError, ResilientClient};
