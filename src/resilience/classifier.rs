//! Failure classification.
//!
//! # Responsibilities
//! - Decide whether an attempt succeeded, failed transiently or failed permanently
//! - Serve as the single decision point for both retrying and breaker accounting
//!
//! # Design Decisions
//! - Connection errors, timeouts and 5xx are transient
//! - 4xx and malformed responses are permanent (client error, not an outage)

use crate::http::transport::{TransportError, TransportResponse};

/// How a failed attempt should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Retryable; counts against breaker health.
    Transient,
    /// Not retryable; never counts against breaker health.
    Permanent,
}

/// Maps raw transport results onto success or a [`FailureKind`].
pub trait FailureClassifier: Send + Sync {
    /// `None` means the response is a success.
    fn classify_response(&self, response: &TransportResponse) -> Option<FailureKind>;

    fn classify_error(&self, error: &TransportError) -> FailureKind;
}

/// Status-code based classification.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl FailureClassifier for DefaultClassifier {
    fn classify_response(&self, response: &TransportResponse) -> Option<FailureKind> {
        match response.status {
            500..=599 => Some(FailureKind::Transient),
            400..=499 => Some(FailureKind::Permanent),
            100..=399 => None,
            // Anything outside the defined ranges is not a valid HTTP status
            _ => Some(FailureKind::Permanent),
        }
    }

    fn classify_error(&self, error: &TransportError) -> FailureKind {
        match error {
            TransportError::Connect(_)
            | TransportError::Timeout(_)
            | TransportError::ClientTimeout(_)
            | TransportError::Request(_) => FailureKind::Transient,
            TransportError::InvalidResponse(_) | TransportError::InvalidRequest(_) => FailureKind::Permanent,
        }
    }
}
