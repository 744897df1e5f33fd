//! Retry policy and backoff delay calculation.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::error::RawFailure;

/// Predicate deciding whether a failure is worth another attempt.
pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Attempt budget, backoff parameters and retry predicate for one retry sequence.
///
/// Policies are derived per invocation and never persisted.
pub struct RetryPolicy<E = RawFailure> {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound for any single delay, jitter included.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub backoff_factor: f64,
    /// Fraction of the delay added as uniform random jitter.
    pub jitter_factor: f64,
    should_retry: RetryPredicate<E>,
}

impl<E: 'static> RetryPolicy<E> {
    /// Creates a policy with default backoff (factor 2, 10% jitter, 30s cap)
    /// that retries every failure.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: Duration::from_secs(30).max(base_delay),
            backoff_factor: 2.0,
            jitter_factor: 0.1,
            should_retry: Arc::new(|_: &E| true),
        }
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Sets the jitter fraction, clamped to `[0, 1]`.
    pub fn with_jitter_factor(mut self, jitter: f64) -> Self {
        self.jitter_factor = jitter.clamp(0.0, 1.0);
        self
    }

    /// Replaces the retry predicate.
    pub fn with_should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(predicate);
        self
    }

    /// Returns true if `error` is eligible for another attempt.
    pub fn should_retry(&self, error: &E) -> bool {
        (self.should_retry)(error)
    }

    /// Delay to wait after failed `attempt` (1-based), with random jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let sample: f64 = rand::rng().random();
        self.compute_delay(attempt, sample)
    }

    /// Delay for `attempt` given a jitter sample in `[0, 1)`.
    ///
    /// `min(base * factor^(attempt - 1), max)` plus up to `jitter_factor` of
    /// itself, clamped to `max` again and floored to whole milliseconds.
    pub fn compute_delay(&self, attempt: u32, sample: f64) -> Duration {
        let exponent = attempt.max(1).saturating_sub(1).min(i32::MAX as u32) as i32;
        let max_ms = self.max_delay.as_millis() as f64;
        let base_ms = self.base_delay.as_millis() as f64;

        let exponential = (base_ms * self.backoff_factor.powi(exponent)).min(max_ms);
        let jitter = exponential * self.jitter_factor * sample.clamp(0.0, 1.0);
        let total = (exponential + jitter).min(max_ms).floor();

        Duration::from_millis(total as u64)
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            backoff_factor: self.backoff_factor,
            jitter_factor: self.jitter_factor,
            should_retry: Arc::clone(&self.should_retry),
        }
    }
}

impl<E> std::fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_factor", &self.backoff_factor)
            .field("jitter_factor", &self.jitter_factor)
            .finish_non_exhaustive()
    }
}
