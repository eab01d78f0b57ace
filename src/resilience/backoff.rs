//! Exponential backoff with jitter.
//!
//! `delay(attempt) = min(base * multiplier^(attempt - 1), max)`
//!
//! Attempt 1 is the initial try; the delay computed for attempt `n` is the
//! pause taken after attempt `n` fails and before attempt `n + 1` starts.

use rand::Rng;
use std::time::Duration;

/// Retry budget and backoff curve for one dependency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the initial try (>= 1).
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Upper bound for any computed delay, before jitter.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays (> 1).
    pub multiplier: f64,
    /// Randomize each delay within `[delay / 2, delay]`.
    pub jitter_enabled: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(2000),
            multiplier: 2.0,
            jitter_enabled: true,
        }
    }
}

impl RetryPolicy {
    /// Deterministic backoff for the given attempt index.
    ///
    /// Non-decreasing in `attempt` and never above `max_delay`.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let max_secs = self.max_delay.as_secs_f64();
        let raw = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);

        // powi overflows to +inf long before u32::MAX attempts
        if !raw.is_finite() || raw >= max_secs {
            return self.max_delay;
        }
        Duration::from_secs_f64(raw.max(0.0))
    }

    /// Backoff actually slept between attempts.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay(attempt);
        if !self.jitter_enabled || delay.is_zero() {
            return delay;
        }
        let upper = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
        Duration::from_nanos(rand::thread_rng().gen_range(upper / 2..=upper))
    }

    /// Whether another attempt may follow `attempt`.
    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
