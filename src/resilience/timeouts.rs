//! Timeout and cancellation enforcement.
//!
//! # Responsibilities
//! - Wrap each transport attempt with the per-attempt timeout
//! - Abort attempts and backoff sleeps when the caller's deadline passes
//!   or its cancellation token fires
//!
//! # Design Decisions
//! - Uses Tokio's timer facilities, so paused-clock tests see exact timings
//! - A per-attempt timeout is a transient transport error; a caller deadline
//!   is a cancellation and ends the whole call

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::http::transport::TransportError;

/// Which caller-side limit ended a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CancelReason {
    #[error("cancellation requested")]
    Token,
    #[error("deadline exceeded")]
    Deadline,
}

/// Caller-side limits and correlation for one logical call.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Shared by every attempt of this call.
    pub request_id: Uuid,
    pub cancel: Option<CancellationToken>,
    pub deadline: Option<Instant>,
}

impl Default for CallContext {
    fn default() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            cancel: None,
            deadline: None,
        }
    }
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline relative to now.
    pub fn with_timeout(self, budget: Duration) -> Self {
        self.with_deadline(Instant::now() + budget)
    }

    /// Non-blocking check, used before starting an attempt.
    pub fn interruption(&self) -> Option<CancelReason> {
        if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Some(CancelReason::Token);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(CancelReason::Deadline);
        }
        None
    }

    /// Resolves when the token fires or the deadline passes; never otherwise.
    pub async fn interrupted(&self) -> CancelReason {
        let token = async {
            match &self.cancel {
                Some(t) => t.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            _ = token => CancelReason::Token,
            _ = deadline => CancelReason::Deadline,
        }
    }
}

/// Run one attempt under `limit`, aborting early on caller interruption.
pub async fn run_attempt<F, T>(
    limit: Duration,
    ctx: &CallContext,
    attempt: F,
) -> Result<Result<T, TransportError>, CancelReason>
where
    F: Future<Output = Result<T, TransportError>>,
{
    tokio::select! {
        biased;
        reason = ctx.interrupted() => Err(reason),
        result = tokio::time::timeout(limit, attempt) => {
            Ok(result.unwrap_or(Err(TransportError::Timeout(limit))))
        }
    }
}

/// Backoff sleep that gives way to caller interruption.
pub async fn sleep(delay: Duration, ctx: &CallContext) -> Result<(), CancelReason> {
    tokio::select! {
        biased;
        reason = ctx.interrupted() => Err(reason),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
