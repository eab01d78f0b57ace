//! Resilient execution of one logical call.
//!
//! # Data Flow
//! ```text
//! execute(operation)
//!     → registry: breaker + policy for the dependency
//!     → loop:
//!         permit_call()          Rejected → CircuitOpen
//!         operation() under per-attempt timeout and caller deadline
//!         classify               success → on_success → Success
//!                                permanent → Permanent (breaker untouched)
//!                                transient → on_failure → backoff → retry
//!                                            budget spent → RetriesExhausted
//! ```
//!
//! # Design Decisions
//! - The breaker lock is held only inside `permit_call` and the permit
//!   reports; the transport call and the backoff sleep run unlocked
//! - A rejected permit ends the call without consuming the retry budget
//! - Fallbacks are always explicit and only mask `CircuitOpen` and
//!   `RetriesExhausted`; the masked error still reaches the observer

use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

use crate::http::transport::{TransportError, TransportResponse};
use crate::resilience::circuit_breaker::{Admission, CircuitBreaker};
use crate::resilience::classifier::FailureKind;
use crate::resilience::outcome::{CallOutcome, FailureCause, ResilienceError};
use crate::resilience::registry::BreakerRegistry;
use crate::resilience::timeouts::{self, CallContext};

/// Handle for calling one named dependency.
///
/// Cheap to clone; all clones share the dependency's breaker.
#[derive(Debug, Clone)]
pub struct ResilientClient {
    dependency: String,
    registry: Arc<BreakerRegistry>,
}

impl ResilientClient {
    pub fn new(dependency: impl Into<String>, registry: Arc<BreakerRegistry>) -> Self {
        Self {
            dependency: dependency.into(),
            registry,
        }
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    pub fn breaker(&self) -> Arc<CircuitBreaker> {
        self.registry.breaker(&self.dependency)
    }

    pub fn registry(&self) -> &Arc<BreakerRegistry> {
        &self.registry
    }

    /// Run `operation` with retries, breaker protection and a fresh context.
    pub async fn execute<F, Fut>(&self, operation: F) -> CallOutcome<TransportResponse>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<TransportResponse, TransportError>>,
    {
        self.execute_with(&CallContext::new(), operation).await
    }

    /// Like [`execute`](Self::execute), substituting `fallback` when the
    /// circuit is open or the retry budget is spent.
    pub async fn execute_or_else<F, Fut, G>(&self, operation: F, fallback: G) -> CallOutcome<TransportResponse>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<TransportResponse, TransportError>>,
        G: FnOnce(&ResilienceError) -> TransportResponse,
    {
        let outcome = self.execute(operation).await;
        self.degrade(outcome, fallback)
    }

    /// Run `operation` honouring the caller's deadline and cancellation token.
    pub async fn execute_with<F, Fut>(&self, ctx: &CallContext, mut operation: F) -> CallOutcome<TransportResponse>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<TransportResponse, TransportError>>,
    {
        self.execute_and_then(ctx, operation, Ok).await
    }

    /// Run `operation`, then convert the successful response with `finish`.
    ///
    /// A conversion error becomes `Permanent` and is the outcome the observer
    /// sees. The breaker already counted the exchange as a success.
    pub async fn execute_and_then<T, F, Fut, M>(&self, ctx: &CallContext, mut operation: F, finish: M) -> CallOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<TransportResponse, TransportError>>,
        M: FnOnce(TransportResponse) -> Result<T, TransportError>,
    {
        let outcome = match self.run(ctx, &mut operation).await {
            CallOutcome::Success(response) => match finish(response) {
                Ok(value) => CallOutcome::Success(value),
                Err(error) => CallOutcome::Failure(self.unusable(error)),
            },
            CallOutcome::Degraded { value, cause } => match finish(value) {
                Ok(value) => CallOutcome::Degraded { value, cause },
                Err(error) => CallOutcome::Failure(self.unusable(error)),
            },
            CallOutcome::Failure(error) => CallOutcome::Failure(error),
        };
        self.registry.observer().on_outcome(&self.dependency, outcome.error());
        outcome
    }

    /// Replace a fallback-eligible failure with `fallback`'s value.
    ///
    /// Other outcomes pass through untouched.
    pub fn degrade<T, G>(&self, outcome: CallOutcome<T>, fallback: G) -> CallOutcome<T>
    where
        G: FnOnce(&ResilienceError) -> T,
    {
        match outcome {
            CallOutcome::Failure(cause) if cause.allows_fallback() => {
                self.registry.observer().on_fallback(&self.dependency, &cause);
                CallOutcome::Degraded {
                    value: fallback(&cause),
                    cause,
                }
            }
            other => other,
        }
    }

    async fn run<F, Fut>(&self, ctx: &CallContext, operation: &mut F) -> CallOutcome<TransportResponse>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<TransportResponse, TransportError>>,
    {
        let breaker = self.registry.breaker(&self.dependency);
        let policy = self.registry.policy(&self.dependency);
        let classifier = self.registry.classifier();
        let observer = self.registry.observer();
        let mut attempt: u32 = 0;

        loop {
            if let Some(reason) = ctx.interruption() {
                return self.cancelled(attempt, reason);
            }

            let permit = match breaker.permit_call() {
                Admission::Allowed(permit) => permit,
                Admission::Rejected => {
                    tracing::debug!(
                        dependency = %self.dependency,
                        request_id = %ctx.request_id,
                        "Circuit open, failing fast"
                    );
                    return CallOutcome::Failure(ResilienceError::CircuitOpen {
                        dependency: self.dependency.clone(),
                    });
                }
            };
            attempt += 1;

            let started = Instant::now();
            let result = match timeouts::run_attempt(policy.per_attempt_timeout, ctx, operation()).await {
                Ok(result) => result,
                // Dropping the permit hands back a probe slot without a verdict
                Err(reason) => return self.cancelled(attempt, reason),
            };
            let elapsed = started.elapsed();

            let (kind, cause) = match result {
                Ok(response) => match classifier.classify_response(&response) {
                    None => {
                        observer.on_attempt(&self.dependency, attempt, None, elapsed);
                        permit.on_success();
                        return CallOutcome::Success(response);
                    }
                    Some(kind) => (kind, FailureCause::from_response(&response)),
                },
                Err(error) => (classifier.classify_error(&error), FailureCause::Transport(error)),
            };
            observer.on_attempt(&self.dependency, attempt, Some(kind), elapsed);

            match kind {
                FailureKind::Permanent => {
                    drop(permit);
                    return CallOutcome::Failure(ResilienceError::Permanent {
                        dependency: self.dependency.clone(),
                        cause,
                    });
                }
                FailureKind::Transient => {
                    permit.on_failure();

                    if !policy.retry.has_attempts_left(attempt) {
                        return CallOutcome::Failure(ResilienceError::RetriesExhausted {
                            dependency: self.dependency.clone(),
                            attempts: attempt,
                            last: cause,
                        });
                    }

                    let delay = policy.retry.jittered_delay(attempt);
                    tracing::info!(
                        dependency = %self.dependency,
                        attempt,
                        delay = ?delay,
                        request_id = %ctx.request_id,
                        error = %cause,
                        "Retrying after transient failure"
                    );
                    if let Err(reason) = timeouts::sleep(delay, ctx).await {
                        return self.cancelled(attempt, reason);
                    }
                }
            }
        }
    }

    fn unusable(&self, error: TransportError) -> ResilienceError {
        tracing::warn!(dependency = %self.dependency, error = %error, "Unusable response");
        ResilienceError::Permanent {
            dependency: self.dependency.clone(),
            cause: FailureCause::Transport(error),
        }
    }

    fn cancelled(&self, attempts: u32, reason: timeouts::CancelReason) -> CallOutcome<TransportResponse> {
        tracing::debug!(dependency = %self.dependency, attempts, reason = %reason, "Call cancelled");
        CallOutcome::Failure(ResilienceError::Cancelled {
            dependency: self.dependency.clone(),
            attempts,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::backoff::RetryPolicy;
    use crate::resilience::circuit_breaker::{BreakerConfig, CircuitState};
    use crate::resilience::observer::ResilienceObserver;
    use crate::resilience::registry::DependencyPolicy;
    use crate::resilience::timeouts::CancelReason;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct Recorder {
        outcomes: Mutex<Vec<Option<String>>>,
        fallbacks: Mutex<Vec<String>>,
        attempts: Mutex<Vec<(u32, Option<FailureKind>)>>,
    }

    impl ResilienceObserver for Recorder {
        fn on_attempt(&self, _dependency: &str, attempt: u32, failure: Option<FailureKind>, _elapsed: Duration) {
            self.attempts.lock().unwrap().push((attempt, failure));
        }

        fn on_outcome(&self, _dependency: &str, error: Option<&ResilienceError>) {
            self.outcomes.lock().unwrap().push(error.map(|e| e.label().to_string()));
        }

        fn on_fallback(&self, _dependency: &str, cause: &ResilienceError) {
            self.fallbacks.lock().unwrap().push(cause.label().to_string());
        }
    }

    fn policy(threshold: u32, max_attempts: u32) -> DependencyPolicy {
        DependencyPolicy {
            breaker: BreakerConfig {
                failure_threshold: threshold,
                recovery_timeout: Duration::from_secs(10),
                success_threshold: 1,
            },
            retry: RetryPolicy {
                max_attempts,
                base_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(10),
                multiplier: 2.0,
                jitter_enabled: false,
            },
            per_attempt_timeout: Duration::from_secs(5),
        }
    }

    fn setup(policy: DependencyPolicy) -> (ResilientClient, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let registry = Arc::new(BreakerRegistry::new(policy).with_observer(recorder.clone()));
        (registry.client("cart-service"), recorder)
    }

    fn refused() -> Result<TransportResponse, TransportError> {
        Err(TransportError::Connect("connection refused".into()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_opens_then_fails_fast() {
        let (client, recorder) = setup(policy(3, 1));
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let outcome = client
                .execute(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { refused() }
                })
                .await;
            assert!(matches!(outcome, CallOutcome::Failure(ResilienceError::RetriesExhausted { attempts: 1, .. })));
        }
        assert_eq!(client.breaker().state(), CircuitState::Open);

        let started = Instant::now();
        let outcome = client
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { refused() }
            })
            .await;
        assert!(matches!(outcome, CallOutcome::Failure(ResilienceError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(recorder.outcomes.lock().unwrap().last().unwrap().as_deref(), Some("circuit_open"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_after_recovery_closes() {
        let (client, _) = setup(policy(3, 1));
        for _ in 0..3 {
            client.execute(|| async { refused() }).await;
        }
        assert_eq!(client.breaker().state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(10)).await;
        let outcome = client.execute(|| async { Ok(TransportResponse::new(200, "ok")) }).await;
        assert!(outcome.is_success());

        let snapshot = client.breaker().snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_schedule_until_exhausted() {
        let (client, recorder) = setup(policy(10, 3));
        let start = Instant::now();
        let times = Mutex::new(Vec::new());

        let outcome = client
            .execute(|| {
                times.lock().unwrap().push(start.elapsed());
                async { Err(TransportError::Timeout(Duration::from_secs(5))) }
            })
            .await;

        let times = times.lock().unwrap().clone();
        let expected = [0, 500, 1500].map(Duration::from_millis);
        assert_eq!(times.len(), expected.len());
        for (at, want) in times.iter().zip(expected) {
            assert!(*at >= want && *at < want + Duration::from_millis(5), "attempt at {:?}, want {:?}", at, want);
        }
        match outcome {
            CallOutcome::Failure(ResilienceError::RetriesExhausted { attempts, last, .. }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last, FailureCause::Transport(TransportError::Timeout(Duration::from_secs(5))));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(client.breaker().failure_count(), 3);
        assert_eq!(recorder.attempts.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_hits_per_attempt_timeout() {
        let mut p = policy(10, 2);
        p.per_attempt_timeout = Duration::from_millis(200);
        let (client, _) = setup(p);

        let outcome = client
            .execute(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(TransportResponse::new(200, ""))
            })
            .await;
        match outcome {
            CallOutcome::Failure(ResilienceError::RetriesExhausted { last, .. }) => {
                assert_eq!(last, FailureCause::Transport(TransportError::Timeout(Duration::from_millis(200))));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_permanent() {
        let (client, recorder) = setup(policy(5, 1));
        let calls = AtomicU32::new(0);

        client.execute(|| async { refused() }).await;
        let before = client.breaker().failure_count();

        let outcome = client
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(TransportResponse::new(404, "no such product")) }
            })
            .await;

        match outcome {
            CallOutcome::Failure(ResilienceError::Permanent { cause, .. }) => {
                assert_eq!(cause, FailureCause::Status { status: 404, body: "no such product".into() });
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.breaker().failure_count(), before);
        assert_eq!(
            recorder.attempts.lock().unwrap().last(),
            Some(&(1, Some(FailureKind::Permanent)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success() {
        let (client, _) = setup(policy(5, 3));
        let calls = AtomicU32::new(0);

        let outcome = client
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Ok(TransportResponse::new(503, "busy"))
                    } else {
                        Ok(TransportResponse::new(200, "done"))
                    }
                }
            })
            .await;

        assert_eq!(outcome, CallOutcome::Success(TransportResponse::new(200, "done")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(client.breaker().failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_masks_but_reports() {
        let (client, recorder) = setup(policy(5, 2));

        let outcome = client
            .execute_or_else(|| async { refused() }, |_| TransportResponse::new(200, "[]"))
            .await;

        match &outcome {
            CallOutcome::Degraded { value, cause } => {
                assert_eq!(value.text(), "[]");
                assert!(matches!(cause, ResilienceError::RetriesExhausted { attempts: 2, .. }));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(*recorder.fallbacks.lock().unwrap(), vec!["retries_exhausted".to_string()]);
        assert_eq!(
            *recorder.outcomes.lock().unwrap(),
            vec![Some("retries_exhausted".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconvertible_response_reported_as_permanent() {
        let (client, recorder) = setup(policy(5, 3));

        let outcome: CallOutcome<Vec<u32>> = client
            .execute_and_then(
                &CallContext::new(),
                || async { Ok(TransportResponse::new(200, "<html>oops</html>")) },
                |response| response.json(),
            )
            .await;

        assert!(matches!(
            outcome,
            CallOutcome::Failure(ResilienceError::Permanent {
                cause: FailureCause::Transport(TransportError::InvalidResponse(_)),
                ..
            })
        ));
        assert_eq!(*recorder.outcomes.lock().unwrap(), vec![Some("permanent".to_string())]);
        assert_eq!(*recorder.attempts.lock().unwrap(), vec![(1, None)]);
        assert_eq!(client.breaker().failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_never_masks_permanent() {
        let (client, recorder) = setup(policy(5, 2));
        let outcome = client
            .execute_or_else(
                || async { Ok(TransportResponse::new(400, "bad")) },
                |_| TransportResponse::new(200, "fallback"),
            )
            .await;
        assert!(matches!(outcome, CallOutcome::Failure(ResilienceError::Permanent { .. })));
        assert!(recorder.fallbacks.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let mut p = policy(10, 5);
        p.retry.base_delay = Duration::from_secs(30);
        let (client, recorder) = setup(p);
        let token = CancellationToken::new();
        let ctx = CallContext::new().with_cancel(token.clone());

        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let outcome = client.execute_with(&ctx, || async { refused() }).await;
        assert_eq!(
            outcome,
            CallOutcome::Failure(ResilienceError::Cancelled {
                dependency: "cart-service".into(),
                attempts: 1,
                reason: CancelReason::Token,
            })
        );
        assert_eq!(recorder.outcomes.lock().unwrap().last().unwrap().as_deref(), Some("cancelled"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_before_first_attempt() {
        let (client, _) = setup(policy(3, 3));
        let ctx = CallContext::new().with_timeout(Duration::ZERO);
        let calls = AtomicU32::new(0);

        let outcome = client
            .execute_with(&ctx, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(TransportResponse::new(200, "")) }
            })
            .await;
        assert!(matches!(
            outcome,
            CallOutcome::Failure(ResilienceError::Cancelled { attempts: 0, reason: CancelReason::Deadline, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_caller_rejected_during_probe() {
        let (client, _) = setup(policy(1, 1));
        client.execute(|| async { refused() }).await;
        tokio::time::advance(Duration::from_secs(10)).await;

        let release = Arc::new(tokio::sync::Notify::new());
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let probe_client = client.clone();
        let gate = release.clone();
        let probe = tokio::spawn(async move {
            let mut started_tx = Some(started_tx);
            probe_client
                .execute(move || {
                    if let Some(tx) = started_tx.take() {
                        let _ = tx.send(());
                    }
                    let gate = gate.clone();
                    async move {
                        gate.notified().await;
                        Ok(TransportResponse::new(200, "recovered"))
                    }
                })
                .await
        });

        started_rx.await.unwrap();
        assert_eq!(client.breaker().state(), CircuitState::HalfOpen);

        let calls = AtomicU32::new(0);
        let outcome = client
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(TransportResponse::new(200, "")) }
            })
            .await;
        assert!(matches!(outcome, CallOutcome::Failure(ResilienceError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        release.notify_one();
        assert!(probe.await.unwrap().is_success());
        assert_eq!(client.breaker().state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_probe_releases_slot() {
        let (client, _) = setup(policy(1, 1));
        client.execute(|| async { refused() }).await;
        tokio::time::advance(Duration::from_secs(10)).await;

        let token = CancellationToken::new();
        token.cancel();
        // Already-cancelled context never reaches permit_call
        let ctx = CallContext::new().with_cancel(token);
        client.execute_with(&ctx, || async { refused() }).await;
        assert_eq!(client.breaker().state(), CircuitState::Open);

        let ctx = CallContext::new().with_timeout(Duration::from_millis(100));
        let outcome = client
            .execute_with(&ctx, || async {
                std::future::pending::<()>().await;
                Ok(TransportResponse::new(200, ""))
            })
            .await;
        assert!(matches!(outcome, CallOutcome::Failure(ResilienceError::Cancelled { attempts: 1, .. })));
        assert_eq!(client.breaker().state(), CircuitState::HalfOpen);

        let outcome = client.execute(|| async { Ok(TransportResponse::new(200, "")) }).await;
        assert!(outcome.is_success());
        assert_eq!(client.breaker().state(), CircuitState::Closed);
    }
}
