//! Call outcomes and the resilience error taxonomy.

use crate::http::transport::{TransportError, TransportResponse};
use crate::resilience::timeouts::CancelReason;
use thiserror::Error;

/// What went wrong on a single attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureCause {
    /// The dependency answered with a failing status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The exchange itself failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl FailureCause {
    pub(crate) fn from_response(response: &TransportResponse) -> Self {
        FailureCause::Status {
            status: response.status,
            body: response.text(),
        }
    }
}

/// Why a resilient call did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResilienceError {
    /// Retryable failure of a single attempt; surfaced inside `RetriesExhausted`.
    #[error("transient failure calling {dependency}: {cause}")]
    Transient { dependency: String, cause: FailureCause },

    /// Client-side or validation failure; never retried.
    #[error("permanent failure calling {dependency}: {cause}")]
    Permanent { dependency: String, cause: FailureCause },

    /// The breaker rejected the call before any transport attempt.
    #[error("circuit open for {dependency}")]
    CircuitOpen { dependency: String },

    /// Every attempt failed transiently.
    #[error("{dependency} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        dependency: String,
        attempts: u32,
        last: FailureCause,
    },

    /// The caller's deadline or cancellation token fired.
    #[error("call to {dependency} cancelled after {attempts} attempts: {reason}")]
    Cancelled {
        dependency: String,
        attempts: u32,
        reason: CancelReason,
    },
}

impl ResilienceError {
    pub fn dependency(&self) -> &str {
        match self {
            ResilienceError::Transient { dependency, .. }
            | ResilienceError::Permanent { dependency, .. }
            | ResilienceError::CircuitOpen { dependency }
            | ResilienceError::RetriesExhausted { dependency, .. }
            | ResilienceError::Cancelled { dependency, .. } => dependency,
        }
    }

    /// Only an open circuit and an exhausted budget may be masked by a fallback.
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            ResilienceError::CircuitOpen { .. } | ResilienceError::RetriesExhausted { .. }
        )
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ResilienceError::Transient { .. } => "transient",
            ResilienceError::Permanent { .. } => "permanent",
            ResilienceError::CircuitOpen { .. } => "circuit_open",
            ResilienceError::RetriesExhausted { .. } => "retries_exhausted",
            ResilienceError::Cancelled { .. } => "cancelled",
        }
    }
}

/// Result of one logical call through a [`ResilientClient`](super::ResilientClient).
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    Success(T),
    Failure(ResilienceError),
    /// A caller-supplied fallback replaced the value; `cause` is the masked error.
    Degraded { value: T, cause: ResilienceError },
}

impl<T> CallOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }

    /// The underlying error, including one masked by a fallback.
    pub fn error(&self) -> Option<&ResilienceError> {
        match self {
            CallOutcome::Success(_) => None,
            CallOutcome::Failure(e) | CallOutcome::Degraded { cause: e, .. } => Some(e),
        }
    }

    /// The business value: the success value or the fallback value.
    pub fn value(&self) -> Option<&T> {
        match self {
            CallOutcome::Success(v) | CallOutcome::Degraded { value: v, .. } => Some(v),
            CallOutcome::Failure(_) => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> CallOutcome<U> {
        match self {
            CallOutcome::Success(v) => CallOutcome::Success(f(v)),
            CallOutcome::Failure(e) => CallOutcome::Failure(e),
            CallOutcome::Degraded { value, cause } => CallOutcome::Degraded {
                value: f(value),
                cause,
            },
        }
    }

    /// Collapse to a `Result`; a degraded outcome counts as `Ok`.
    pub fn into_result(self) -> Result<T, ResilienceError> {
        match self {
            CallOutcome::Success(v) | CallOutcome::Degraded { value: v, .. } => Ok(v),
            CallOutcome::Failure(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exhausted() -> ResilienceError {
        ResilienceError::RetriesExhausted {
            dependency: "cart-service".into(),
            attempts: 3,
            last: FailureCause::Transport(TransportError::Connect("refused".into())),
        }
    }

    #[test]
    fn test_fallback_eligibility() {
        assert!(exhausted().allows_fallback());
        assert!(ResilienceError::CircuitOpen { dependency: "x".into() }.allows_fallback());
        assert!(!ResilienceError::Permanent {
            dependency: "x".into(),
            cause: FailureCause::Status { status: 404, body: String::new() },
        }
        .allows_fallback());
        assert!(!ResilienceError::Cancelled {
            dependency: "x".into(),
            attempts: 1,
            reason: CancelReason::Token,
        }
        .allows_fallback());
    }

    #[test]
    fn test_error_display() {
        let msg = exhausted().to_string();
        assert!(msg.contains("cart-service"));
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("refused"));
        assert_eq!(exhausted().label(), "retries_exhausted");
    }

    #[test]
    fn test_degraded_keeps_cause() {
        let outcome = CallOutcome::Degraded { value: 1, cause: exhausted() };
        assert_eq!(outcome.value(), Some(&1));
        assert_eq!(outcome.error(), Some(&exhausted()));
        assert!(!outcome.is_success());
        assert_eq!(outcome.map(|v| v * 10).into_result(), Ok(10));
    }

    #[test]
    fn test_failure_into_result() {
        let outcome: CallOutcome<u8> = CallOutcome::Failure(exhausted());
        assert_eq!(outcome.value(), None);
        assert_eq!(outcome.into_result(), Err(exhausted()));
    }
}
