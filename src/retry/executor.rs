//! Retry loop around a fallible asynchronous operation.
//!
//! Progress is reported as a stream of [`RetryEvent`] values instead of
//! callbacks, so the caller decides what an attempt means for the UI.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;

use super::RetryPolicy;

/// One failed attempt that is about to be retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryAttemptRecord<E> {
    /// The failure of this attempt.
    pub error: E,
    /// The attempt that failed (1-based).
    pub attempt: u32,
    /// Total attempts allowed by the policy.
    pub max_attempts: u32,
    /// Delay before the next attempt.
    pub delay: Duration,
}

/// Events emitted while a retry sequence runs.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryEvent<E> {
    /// An attempt failed and another will follow after `delay`.
    Retrying(RetryAttemptRecord<E>),
    /// The first attempt succeeded.
    Succeeded,
    /// A later attempt succeeded.
    Recovered { attempts: u32 },
    /// The sequence ended with `error`.
    GaveUp { error: E, attempts: u32 },
}

/// Value returned by a successful sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
    pub value: T,
    /// Attempts made, including the successful one.
    pub attempts: u32,
}

impl<T> RetryOutcome<T> {
    /// True if success came after at least one failure.
    pub fn recovered(&self) -> bool {
        self.attempts > 1
    }
}

/// Runs operations under a [`RetryPolicy`].
///
/// The executor holds no state: every call owns its attempt counter and
/// timer, so concurrent sequences never interfere. Once a delay has started
/// it always runs to completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryExecutor;

impl RetryExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Runs `operation` starting at attempt 1.
    ///
    /// # Errors
    ///
    /// Returns the last failure once `max_attempts` is reached or the
    /// policy declines to retry it.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: F,
        policy: &RetryPolicy<E>,
        events: Option<mpsc::UnboundedSender<RetryEvent<E>>>,
    ) -> Result<RetryOutcome<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Clone + Display + 'static,
    {
        self.drive(None, operation, policy, events).await
    }

    /// Continues a sequence whose first attempt already failed with `error`.
    ///
    /// `error` counts as attempt 1; `operation` is invoked for attempts
    /// 2 and later.
    ///
    /// # Errors
    ///
    /// Same as [`RetryExecutor::run`].
    pub async fn run_after_failure<T, E, F, Fut>(
        &self,
        error: E,
        operation: F,
        policy: &RetryPolicy<E>,
        events: Option<mpsc::UnboundedSender<RetryEvent<E>>>,
    ) -> Result<RetryOutcome<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Clone + Display + 'static,
    {
        self.drive(Some(error), operation, policy, events).await
    }

    async fn drive<T, E, F, Fut>(
        &self,
        mut pending: Option<E>,
        mut operation: F,
        policy: &RetryPolicy<E>,
        events: Option<mpsc::UnboundedSender<RetryEvent<E>>>,
    ) -> Result<RetryOutcome<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Clone + Display + 'static,
    {
        let emit = |event: RetryEvent<E>| {
            if let Some(sender) = &events {
                // A dropped receiver only means nobody is listening.
                let _ = sender.send(event);
            }
        };

        let max_attempts = policy.max_attempts.max(1);
        let mut attempt: u32 = 1;

        loop {
            let result = match pending.take() {
                Some(error) => Err(error),
                None => operation().await,
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "operation recovered after retry");
                        emit(RetryEvent::Recovered { attempts: attempt });
                    } else {
                        emit(RetryEvent::Succeeded);
                    }
                    return Ok(RetryOutcome {
                        value,
                        attempts: attempt,
                    });
                }
                Err(error) => error,
            };

            if attempt >= max_attempts || !policy.should_retry(&error) {
                tracing::warn!(attempt, max_attempts, error = %error, "giving up");
                emit(RetryEvent::GaveUp {
                    error: error.clone(),
                    attempts: attempt,
                });
                return Err(error);
            }

            let delay = policy.delay_for_attempt(attempt);
            tracing::warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "attempt failed, retrying"
            );
            emit(RetryEvent::Retrying(RetryAttemptRecord {
                error,
                attempt,
                max_attempts,
                delay,
            }));

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy(max_attempts: u32) -> RetryPolicy<String> {
        RetryPolicy::new(max_attempts, Duration::from_millis(100))
    }

    fn failing_until(successful_call: u32) -> (Arc<AtomicU32>, impl FnMut() -> std::future::Ready<Result<u32, String>>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let operation = move || {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(if call >= successful_call {
                Ok(call)
            } else {
                Err(format!("failure {}", call))
            })
        };
        (calls, operation)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success() {
        let (calls, operation) = failing_until(1);
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let outcome = RetryExecutor::new()
            .run(operation, &policy(3), Some(sender))
            .await
            .expect("success");

        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.recovered());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(receiver.recv().await, Some(RetryEvent::Succeeded));
        assert_eq!(receiver.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_failures() {
        let (calls, operation) = failing_until(3);
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let outcome = RetryExecutor::new()
            .run(operation, &policy(5), Some(sender))
            .await
            .expect("success");

        assert_eq!(outcome.value, 3);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let mut retrying = Vec::new();
        while let Some(event) = receiver.recv().await {
            match event {
                RetryEvent::Retrying(record) => retrying.push(record.attempt),
                RetryEvent::Recovered { attempts } => assert_eq!(attempts, 3),
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(retrying, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error_after_max_attempts() {
        let (calls, operation) = failing_until(u32::MAX);

        let error = RetryExecutor::new()
            .run(operation, &policy(3), None)
            .await
            .expect_err("exhausted");

        assert_eq!(error, "failure 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_predicate_stops_immediately() {
        let (calls, operation) = failing_until(u32::MAX);
        let policy = policy(5).with_should_retry(|_: &String| false);
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let error = RetryExecutor::new()
            .run(operation, &policy, Some(sender))
            .await
            .expect_err("no retry");

        assert_eq!(error, "failure 1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            receiver.recv().await,
            Some(RetryEvent::GaveUp {
                error: "failure 1".to_string(),
                attempts: 1
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_after_failure_counts_initial_error() {
        let (calls, operation) = failing_until(u32::MAX);

        let error = RetryExecutor::new()
            .run_after_failure("initial".to_string(), operation, &policy(3), None)
            .await
            .expect_err("exhausted");

        assert_eq!(error, "failure 2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_after_failure_recovery() {
        let (_, operation) = failing_until(1);

        let outcome = RetryExecutor::new()
            .run_after_failure("initial".to_string(), operation, &policy(3), None)
            .await
            .expect("recovered");

        assert_eq!(outcome.attempts, 2);
        assert!(outcome.recovered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_computed_delay_between_attempts() {
        let (_, operation) = failing_until(2);
        let policy = policy(3).with_jitter_factor(0.0);
        let start = tokio::time::Instant::now();

        RetryExecutor::new()
            .run(operation, &policy, None)
            .await
            .expect("success");

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(110));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_attempts_behaves_as_single_attempt() {
        let (calls, operation) = failing_until(u32::MAX);
        let result = RetryExecutor::new().run(operation, &policy(0), None).await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
