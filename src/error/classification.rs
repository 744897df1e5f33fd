//! Error classification into the closed `{type, code}` taxonomy.
//!
//! Classification is total: every [`RawFailure`] maps to a [`ClassifiedError`]
//! and nothing here can fail. The order of the checks is part of the contract,
//! since connectivity state overrides whatever the failure itself reports.

use serde::{Deserialize, Serialize};

use super::catalog::UNKNOWN_CODE;
use super::raw::{NetworkFailureKind, RawFailure};
use crate::network::NetworkMonitor;

/// The closed set of failure origins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// A form field failed validation; the user must correct the input.
    Validation,
    /// Transport failure or no connectivity.
    Network,
    /// The API reported an error.
    Api,
    /// The API is throttling requests.
    RateLimit,
    /// Third-party verification (reCAPTCHA) failed.
    Recaptcha,
    /// The email delivery service failed.
    EmailService,
    /// Nothing recognizable.
    Unknown,
}

impl ErrorType {
    /// All variants, in declaration order.
    pub const ALL: [ErrorType; 7] = [
        ErrorType::Validation,
        ErrorType::Network,
        ErrorType::Api,
        ErrorType::RateLimit,
        ErrorType::Recaptcha,
        ErrorType::EmailService,
        ErrorType::Unknown,
    ];

    /// Snake-case name as used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Network => "network",
            Self::Api => "api",
            Self::RateLimit => "rate_limit",
            Self::Recaptcha => "recaptcha",
            Self::EmailService => "email_service",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a failure: its origin and catalog code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassifiedError {
    /// Origin of the failure.
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    /// Catalog key such as `network.timeout`.
    pub code: String,
}

impl ClassifiedError {
    /// Creates a new classification.
    pub fn new(error_type: ErrorType, code: impl Into<String>) -> Self {
        Self {
            error_type,
            code: code.into(),
        }
    }

    /// The universal fallback classification.
    pub fn unknown() -> Self {
        Self::new(ErrorType::Unknown, UNKNOWN_CODE)
    }

    /// Returns true for network-class failures.
    pub fn is_network(&self) -> bool {
        self.error_type == ErrorType::Network
    }
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code, self.error_type)
    }
}

/// Provider codes recognized as reCAPTCHA failures.
pub const RECAPTCHA_CODES: [&str; 5] = [
    "missing_token",
    "missing_secret",
    "verification_failed",
    "low_score",
    "network_error",
];

/// Classifies a failure given the current connectivity state.
///
/// First match wins:
/// 1. transport failures map to `network.failed`, `network.timeout` or `network.offline`
/// 2. being offline maps anything else to `network.offline`
/// 3. API error strings map through a fixed table, others pass through as `api.<error>`
/// 4. field validation maps to `validation.<code>` (or `validation.invalid`)
/// 5. known reCAPTCHA codes map to `recaptcha.<code>`; other codes are kept verbatim as unknown
/// 6. everything else is `unknown`
pub fn classify(raw: &RawFailure, online: bool) -> ClassifiedError {
    if let RawFailure::Network { failure, .. } = raw {
        let code = match failure {
            NetworkFailureKind::Failed => "network.failed",
            NetworkFailureKind::Timeout => "network.timeout",
            NetworkFailureKind::Offline => "network.offline",
        };
        return ClassifiedError::new(ErrorType::Network, code);
    }

    if !online {
        return ClassifiedError::new(ErrorType::Network, "network.offline");
    }

    match raw {
        RawFailure::Api { error, .. } => classify_api_error(error),
        RawFailure::Validation { code, .. } => ClassifiedError::new(
            ErrorType::Validation,
            format!("validation.{}", code.as_deref().unwrap_or("invalid")),
        ),
        RawFailure::Provider { code, .. } if RECAPTCHA_CODES.contains(&code.as_str()) => {
            ClassifiedError::new(ErrorType::Recaptcha, format!("recaptcha.{}", code))
        }
        RawFailure::Provider { code, .. } => ClassifiedError::new(ErrorType::Unknown, code.clone()),
        RawFailure::Network { .. } | RawFailure::Unrecognized { .. } => ClassifiedError::unknown(),
    }
}

fn classify_api_error(error: &str) -> ClassifiedError {
    match error {
        "missing_token" => ClassifiedError::new(ErrorType::Api, "api.missing_token"),
        "recaptcha_failed" => ClassifiedError::new(ErrorType::Recaptcha, "api.recaptcha_failed"),
        "missing_required_fields" => {
            ClassifiedError::new(ErrorType::Api, "api.missing_required_fields")
        }
        "rate_limited" => ClassifiedError::new(ErrorType::RateLimit, "api.rate_limited"),
        "email_service_error" => {
            ClassifiedError::new(ErrorType::EmailService, "api.email_service_error")
        }
        other if other.starts_with("api.") => ClassifiedError::new(ErrorType::Api, other),
        other => ClassifiedError::new(ErrorType::Api, format!("api.{}", other)),
    }
}

/// Classifier bound to a connectivity monitor.
#[derive(Clone, Debug)]
pub struct Classifier {
    monitor: NetworkMonitor,
}

impl Classifier {
    /// Creates a classifier that polls `monitor` on every call.
    pub fn new(monitor: NetworkMonitor) -> Self {
        Self { monitor }
    }

    /// Classifies a failure against the current connectivity state.
    pub fn classify(&self, raw: &RawFailure) -> ClassifiedError {
        let classified = classify(raw, self.monitor.is_online());
        tracing::debug!(
            error_type = %classified.error_type,
            code = %classified.code,
            "classified failure"
        );
        classified
    }

    /// The monitor this classifier consults.
    pub fn monitor(&self) -> &NetworkMonitor {
        &self.monitor
    }
}
