//! Derives a [`RetryPolicy`] for a classified failure.

use std::time::Duration;

use crate::error::{ClassifiedError, ErrorDescriptor, ErrorType, RawFailure};

use super::RetryPolicy;

/// Backoff parameters for one row of the type-keyed default table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyRow {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    pub jitter_factor: f64,
}

impl PolicyRow {
    pub const DEFAULT: PolicyRow = PolicyRow {
        max_attempts: 3,
        base_delay_ms: 1_000,
        max_delay_ms: 30_000,
        backoff_factor: 2.0,
        jitter_factor: 0.1,
    };

    pub const NETWORK: PolicyRow = PolicyRow {
        max_attempts: 5,
        base_delay_ms: 2_000,
        max_delay_ms: 60_000,
        backoff_factor: 1.5,
        jitter_factor: 0.2,
    };

    pub const API: PolicyRow = PolicyRow {
        max_attempts: 3,
        base_delay_ms: 1_500,
        max_delay_ms: 45_000,
        backoff_factor: 2.0,
        jitter_factor: 0.15,
    };

    pub const RATE_LIMIT: PolicyRow = PolicyRow {
        max_attempts: 2,
        base_delay_ms: 60_000,
        max_delay_ms: 300_000,
        backoff_factor: 2.0,
        jitter_factor: 0.1,
    };

    pub const RECAPTCHA: PolicyRow = PolicyRow {
        max_attempts: 2,
        base_delay_ms: 3_000,
        ..PolicyRow::DEFAULT
    };

    /// Row used for `error_type`. Email service failures share the API row.
    pub fn for_type(error_type: ErrorType) -> PolicyRow {
        match error_type {
            ErrorType::Network => Self::NETWORK,
            ErrorType::Api | ErrorType::EmailService => Self::API,
            ErrorType::RateLimit => Self::RATE_LIMIT,
            ErrorType::Recaptcha => Self::RECAPTCHA,
            ErrorType::Validation | ErrorType::Unknown => Self::DEFAULT,
        }
    }

    fn into_policy(self) -> RetryPolicy<RawFailure> {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_backoff_factor(self.backoff_factor)
            .with_jitter_factor(self.jitter_factor)
    }
}

/// Builds retry policies from catalog descriptors and the type-keyed table.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicyResolver;

impl RetryPolicyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolves the policy for a classified failure.
    ///
    /// Returns `None` when the descriptor marks the failure non-retryable,
    /// whatever the type-level table would allow. Descriptor retry hints take
    /// precedence over the table; the remaining backoff parameters still come
    /// from the row for the error's type.
    pub fn resolve(
        &self,
        classified: &ClassifiedError,
        descriptor: &ErrorDescriptor,
    ) -> Option<RetryPolicy<RawFailure>> {
        if !descriptor.retryable {
            tracing::debug!(code = %classified.code, "failure is not retryable");
            return None;
        }

        let row = PolicyRow::for_type(classified.error_type);

        if descriptor.has_retry_hints() {
            let base_delay = descriptor
                .retry_delay()
                .unwrap_or(Duration::from_millis(row.base_delay_ms));
            let max_delay = Duration::from_millis(row.max_delay_ms).max(base_delay);
            let policy = RetryPolicy::new(
                descriptor.max_retries.unwrap_or(row.max_attempts),
                base_delay,
            )
            .with_max_delay(max_delay)
            .with_backoff_factor(row.backoff_factor)
            .with_jitter_factor(row.jitter_factor);
            return Some(policy);
        }

        Some(self.for_type(classified.error_type))
    }

    /// Policy from the type-keyed table, with its type-specific predicate.
    pub fn for_type(&self, error_type: ErrorType) -> RetryPolicy<RawFailure> {
        let policy = PolicyRow::for_type(error_type).into_policy();
        match error_type {
            ErrorType::Network => policy.with_should_retry(RawFailure::is_network),
            ErrorType::RateLimit => {
                policy.with_should_retry(|raw: &RawFailure| raw.api_error() == Some("rate_limited"))
            }
            ErrorType::Api => policy
                .with_should_retry(|raw: &RawFailure| raw.is_server_error() || raw.is_timeout()),
            ErrorType::EmailService => policy.with_should_retry(|raw: &RawFailure| {
                raw.api_error() == Some("email_service_error") || raw.is_server_error()
            }),
            ErrorType::Recaptcha => policy.with_should_retry(|raw: &RawFailure| {
                raw.provider_code() != Some("missing_secret")
            }),
            ErrorType::Validation | ErrorType::Unknown => policy,
        }
    }
}
