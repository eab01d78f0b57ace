//! HTTP plumbing for calling downstream services.
//!
//! # Data Flow
//! ```text
//! ServiceClient::get_json("/products/7")
//!     → client.rs (URL, default and per-call headers, query, x-request-id, JSON body)
//!     → resilience::ResilientClient (breaker, retries, timeouts)
//!     → reqwest send
//!     → transport.rs (buffer into TransportResponse / map TransportError)
//!     → client.rs (decode JSON)
//! ```

pub mod client;
pub mod transport;

pub use client::{RequestOptions, ServiceClient, X_REQUEST_ID};
pub use transport::{TransportError, TransportResponse};
