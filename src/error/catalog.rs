//! Static catalog of user-facing error descriptors.
//!
//! The catalog is the single source of truth for the copy, severity and retry
//! hints shown for each failure code. It is built once and never mutated;
//! unknown codes resolve to the `unknown` entry.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ErrorType;

/// Code every unresolved lookup falls back to.
pub const UNKNOWN_CODE: &str = "unknown";

/// How disruptive an error is for the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The user can continue; minor issue.
    Low,
    /// User action required, but recoverable.
    Medium,
    /// Blocks a specific piece of functionality.
    High,
    /// System failure requiring immediate attention.
    Critical,
}

impl Severity {
    /// Returns true for severities that must not auto-dismiss.
    pub fn is_urgent(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }

    /// Lowercase name as used in logs and display configs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable catalog entry describing how a failure code is presented.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorDescriptor {
    /// Message shown to the user.
    pub user_message: &'static str,
    /// Severity of the failure.
    pub severity: Severity,
    /// Guidance on how to recover.
    pub recovery: &'static str,
    /// Label read by assistive technology.
    pub aria_label: &'static str,
    /// Whether retrying can plausibly succeed.
    pub retryable: bool,
    /// Form field the entry refers to, for validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    /// Suggested base delay between retries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
    /// Suggested number of attempts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl ErrorDescriptor {
    const fn fixed(
        user_message: &'static str,
        severity: Severity,
        recovery: &'static str,
        aria_label: &'static str,
    ) -> Self {
        Self {
            user_message,
            severity,
            recovery,
            aria_label,
            retryable: false,
            field: None,
            retry_delay_ms: None,
            max_retries: None,
        }
    }

    const fn for_field(self, field: &'static str) -> Self {
        Self {
            field: Some(field),
            ..self
        }
    }

    const fn retry(self, delay_ms: u64, max_retries: u32) -> Self {
        Self {
            retryable: true,
            retry_delay_ms: Some(delay_ms),
            max_retries: Some(max_retries),
            ..self
        }
    }

    /// Suggested base delay as a [`Duration`].
    pub fn retry_delay(&self) -> Option<Duration> {
        self.retry_delay_ms.map(Duration::from_millis)
    }

    /// True if the descriptor supplies its own retry hints.
    pub fn has_retry_hints(&self) -> bool {
        self.retry_delay_ms.is_some() || self.max_retries.is_some()
    }
}

use Severity::{Critical, High, Low, Medium};

static ENTRIES: &[(&str, ErrorDescriptor)] = &[
    // Validation
    (
        "validation.name_required",
        ErrorDescriptor::fixed(
            "Name is required.",
            Medium,
            "Please enter your full name.",
            "Name field error: name is required",
        )
        .for_field("name"),
    ),
    (
        "validation.name_too_short",
        ErrorDescriptor::fixed(
            "Name must be at least 3 characters long.",
            Low,
            "Please enter your full name.",
            "Name field error: too short",
        )
        .for_field("name"),
    ),
    (
        "validation.name_too_long",
        ErrorDescriptor::fixed(
            "Name is too long.",
            Low,
            "Use at most 50 characters.",
            "Name field error: too long",
        )
        .for_field("name"),
    ),
    (
        "validation.name_invalid",
        ErrorDescriptor::fixed(
            "Name contains invalid characters.",
            Low,
            "Use letters and spaces only.",
            "Name field error: invalid characters",
        )
        .for_field("name"),
    ),
    (
        "validation.email_required",
        ErrorDescriptor::fixed(
            "Email is required.",
            Medium,
            "Please enter a valid email address.",
            "Email field error: email is required",
        )
        .for_field("email"),
    ),
    (
        "validation.email_invalid",
        ErrorDescriptor::fixed(
            "Invalid email.",
            Low,
            "Check the email format (e.g. name@domain.com).",
            "Email field error: invalid format",
        )
        .for_field("email"),
    ),
    (
        "validation.email_too_long",
        ErrorDescriptor::fixed(
            "Email is too long.",
            Low,
            "Use at most 100 characters.",
            "Email field error: too long",
        )
        .for_field("email"),
    ),
    (
        "validation.phone_required",
        ErrorDescriptor::fixed(
            "Phone number is required.",
            Medium,
            "Please enter a valid phone number.",
            "Phone field error: phone is required",
        )
        .for_field("phone"),
    ),
    (
        "validation.phone_invalid",
        ErrorDescriptor::fixed(
            "Invalid phone number.",
            Low,
            "Enter a valid phone number including the area code.",
            "Phone field error: invalid format",
        )
        .for_field("phone"),
    ),
    (
        "validation.message_required",
        ErrorDescriptor::fixed(
            "Message is required.",
            Medium,
            "Please describe your question or request.",
            "Message field error: message is required",
        )
        .for_field("message"),
    ),
    (
        "validation.message_too_short",
        ErrorDescriptor::fixed(
            "Message is too short.",
            Low,
            "The message must be at least 10 characters long.",
            "Message field error: too short",
        )
        .for_field("message"),
    ),
    (
        "validation.message_too_long",
        ErrorDescriptor::fixed(
            "Message is too long.",
            Low,
            "Use at most 2000 characters.",
            "Message field error: too long",
        )
        .for_field("message"),
    ),
    (
        "validation.message_contains_links",
        ErrorDescriptor::fixed(
            "Links are not allowed in the message.",
            Medium,
            "Remove any link or URL from the message.",
            "Message field error: contains links",
        )
        .for_field("message"),
    ),
    (
        "validation.consent_required",
        ErrorDescriptor::fixed(
            "You must accept the privacy terms.",
            Medium,
            "Tick the consent box to continue.",
            "Consent error: accepting the terms is required",
        )
        .for_field("consent"),
    ),
    (
        "validation.missing_required_fields",
        ErrorDescriptor::fixed(
            "Required fields are missing.",
            Medium,
            "Fill in all required fields.",
            "Validation error: required fields are missing",
        ),
    ),
    (
        "validation.invalid",
        ErrorDescriptor::fixed(
            "Invalid value.",
            Low,
            "Check the value you entered.",
            "Validation error: invalid value",
        ),
    ),
    // Network
    (
        "network.offline",
        ErrorDescriptor::fixed(
            "You are offline.",
            High,
            "Check your internet connection and try again.",
            "Connection error: no internet connection",
        )
        .retry(2_000, 5),
    ),
    (
        "network.timeout",
        ErrorDescriptor::fixed(
            "The connection timed out.",
            Medium,
            "Try again in a moment.",
            "Connection error: time limit exceeded",
        )
        .retry(1_000, 3),
    ),
    (
        "network.failed",
        ErrorDescriptor::fixed(
            "Connection failed.",
            Medium,
            "Check your connection and try again.",
            "Connection error: communication failure",
        )
        .retry(1_500, 3),
    ),
    (
        "network.dns_error",
        ErrorDescriptor::fixed(
            "DNS resolution failed.",
            High,
            "Check your DNS settings or try again later.",
            "Connection error: DNS problem",
        )
        .retry(3_000, 2),
    ),
    // API
    (
        "api.missing_token",
        ErrorDescriptor::fixed(
            "Verification token is missing.",
            High,
            "Reload the page and try again.",
            "Security error: verification token missing",
        )
        .retry(2_000, 2),
    ),
    (
        "api.recaptcha_failed",
        ErrorDescriptor::fixed(
            "Security verification failed.",
            High,
            "Wait a moment and try again.",
            "Security error: reCAPTCHA verification failed",
        )
        .retry(3_000, 2),
    ),
    (
        "api.missing_required_fields",
        ErrorDescriptor::fixed(
            "Required fields are missing.",
            Medium,
            "Fill in all required fields.",
            "Validation error: required fields are missing",
        ),
    ),
    (
        "api.rate_limited",
        ErrorDescriptor::fixed(
            "Too many attempts. Please wait a moment.",
            Medium,
            "Wait a few minutes before trying again.",
            "Limit error: too many attempts",
        )
        .retry(60_000, 1),
    ),
    (
        "api.email_service_error",
        ErrorDescriptor::fixed(
            "The email service failed.",
            High,
            "Try again later or contact us by phone.",
            "Service error: email delivery failed",
        )
        .retry(5_000, 2),
    ),
    (
        "api.server_error",
        ErrorDescriptor::fixed(
            "Internal server error.",
            High,
            "Try again in a few minutes.",
            "Server error: internal error",
        )
        .retry(10_000, 2),
    ),
    (
        "api.service_unavailable",
        ErrorDescriptor::fixed(
            "Service temporarily unavailable.",
            High,
            "Try again in a few minutes or contact us by phone.",
            "Service error: service unavailable",
        )
        .retry(15_000, 1),
    ),
    // reCAPTCHA
    (
        "recaptcha.missing_token",
        ErrorDescriptor::fixed(
            "Security verification was not completed.",
            High,
            "Reload the page and try again.",
            "Security error: reCAPTCHA verification not completed",
        )
        .retry(2_000, 2),
    ),
    (
        "recaptcha.missing_secret",
        ErrorDescriptor::fixed(
            "Security configuration error.",
            Critical,
            "Contact technical support.",
            "Critical error: security configuration is incorrect",
        ),
    ),
    (
        "recaptcha.verification_failed",
        ErrorDescriptor::fixed(
            "reCAPTCHA verification failed.",
            High,
            "Wait a moment and try again.",
            "Security error: reCAPTCHA verification failed",
        )
        .retry(3_000, 2),
    ),
    (
        "recaptcha.low_score",
        ErrorDescriptor::fixed(
            "Security verification failed.",
            High,
            "Try again or use a different browser.",
            "Security error: low reCAPTCHA score",
        )
        .retry(5_000, 1),
    ),
    (
        "recaptcha.network_error",
        ErrorDescriptor::fixed(
            "Security verification error.",
            Medium,
            "Check your connection and try again.",
            "Connection error: security verification failed",
        )
        .retry(2_000, 3),
    ),
    // Email service
    (
        "email_service_unavailable",
        ErrorDescriptor::fixed(
            "Email service unavailable.",
            High,
            "Try again later or contact us by phone.",
            "Service error: email service unavailable",
        )
        .retry(10_000, 2),
    ),
    (
        "email_send_failed",
        ErrorDescriptor::fixed(
            "Failed to send email.",
            High,
            "Try again or contact us directly.",
            "Delivery error: failed to send email",
        )
        .retry(5_000, 2),
    ),
    (
        "email_template_error",
        ErrorDescriptor::fixed(
            "Email formatting error.",
            Medium,
            "Try again. If it persists, contact us by phone.",
            "Formatting error: email template problem",
        )
        .retry(2_000, 1),
    ),
    // Generic
    (
        "timeout",
        ErrorDescriptor::fixed(
            "The operation took longer than expected.",
            Medium,
            "Try again with a more stable connection.",
            "Time error: operation took too long to complete",
        )
        .retry(2_000, 2),
    ),
    (
        UNKNOWN_CODE,
        ErrorDescriptor::fixed(
            "An unexpected error occurred.",
            Medium,
            "Try again. If the problem persists, contact us.",
            "Unknown error: an unexpected problem occurred",
        )
        .retry(3_000, 2),
    ),
];

/// Lookup table from failure code to [`ErrorDescriptor`].
#[derive(Clone, Debug)]
pub struct ErrorCatalog {
    entries: HashMap<&'static str, &'static ErrorDescriptor>,
    unknown: &'static ErrorDescriptor,
}

impl Default for ErrorCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorCatalog {
    /// Builds the catalog from the built-in entries.
    pub fn new() -> Self {
        let entries: HashMap<_, _> = ENTRIES.iter().map(|(code, d)| (*code, d)).collect();
        let unknown = ENTRIES
            .iter()
            .find(|(code, _)| *code == UNKNOWN_CODE)
            .map(|(_, d)| d)
            .unwrap_or(&ENTRIES[ENTRIES.len() - 1].1);
        Self { entries, unknown }
    }

    /// Looks up a code, falling back to the `unknown` entry.
    pub fn lookup(&self, code: &str) -> &'static ErrorDescriptor {
        self.get(code).unwrap_or(self.unknown)
    }

    /// Looks up a code without falling back.
    pub fn get(&self, code: &str) -> Option<&'static ErrorDescriptor> {
        self.entries.get(code).copied()
    }

    /// Returns true if the code has its own entry.
    pub fn contains(&self, code: &str) -> bool {
        self.entries.contains_key(code)
    }

    /// All codes in the catalog, sorted.
    pub fn codes(&self) -> Vec<&'static str> {
        let mut codes: Vec<_> = self.entries.keys().copied().collect();
        codes.sort_unstable();
        codes
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the user can recover from this code without outside help.
    pub fn is_recoverable(&self, code: &str) -> bool {
        let descriptor = self.lookup(code);
        descriptor.retryable && descriptor.severity != Severity::Critical
    }
}

/// Colour, icon and labels used to present a severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SeverityIndicator {
    pub color: &'static str,
    pub icon: &'static str,
    pub label: &'static str,
    pub aria_label: &'static str,
}

impl From<Severity> for SeverityIndicator {
    fn from(severity: Severity) -> Self {
        let (color, icon, label, aria_label) = match severity {
            Severity::Low => ("yellow", "⚠️", "Attention", "Attention notice"),
            Severity::Medium => ("orange", "🔶", "Warning", "Important warning"),
            Severity::High => ("red", "🔴", "Error", "Critical error"),
            Severity::Critical => ("darkred", "🚨", "Critical", "Critical system error"),
        };
        Self {
            color,
            icon,
            label,
            aria_label,
        }
    }
}

/// Recovery guidance for a classified failure, most specific first.
pub fn recovery_steps(error_type: ErrorType, descriptor: &ErrorDescriptor) -> Vec<String> {
    let extra: &[&str] = match error_type {
        ErrorType::Network => &[
            "Check your Wi-Fi or mobile data connection.",
            "Try reloading the page.",
        ],
        ErrorType::Recaptcha => &[
            "Clear your browser cache and cookies.",
            "Try using a private browsing window.",
        ],
        ErrorType::RateLimit => &[
            "Wait a few minutes before trying again.",
            "If you need urgent help, call us directly.",
        ],
        ErrorType::EmailService => &[
            "Try again in a few minutes.",
            "Contact us by phone.",
        ],
        _ => &["If the problem persists, contact us."],
    };

    std::iter::once(descriptor.recovery)
        .chain(extra.iter().copied())
        .filter(|step| !step.trim().is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_code() {
        let catalog = ErrorCatalog::new();
        let descriptor = catalog.lookup("network.timeout");
        assert_eq!(descriptor.severity, Severity::Medium);
        assert!(descriptor.retryable);
        assert_eq!(descriptor.max_retries, Some(3));
        assert_eq!(descriptor.retry_delay(), Some(Duration::from_millis(1_000)));
    }

    #[test]
    fn test_lookup_missing_code_falls_back_to_unknown() {
        let catalog = ErrorCatalog::new();
        assert!(catalog.get("api.something_new").is_none());
        assert_eq!(
            catalog.lookup("api.something_new"),
            catalog.lookup(UNKNOWN_CODE)
        );
    }

    #[test]
    fn test_codes_are_unique() {
        let catalog = ErrorCatalog::new();
        assert_eq!(catalog.len(), ENTRIES.len());
        assert!(!catalog.is_empty());
    }

    #[test]
    fn test_non_retryable_entries_carry_no_hints() {
        for (code, descriptor) in ENTRIES {
            if !descriptor.retryable {
                assert!(!descriptor.has_retry_hints(), "{} has retry hints", code);
            }
        }
    }

    #[test]
    fn test_validation_entries_are_never_retryable() {
        let catalog = ErrorCatalog::new();
        for code in catalog.codes() {
            if code.starts_with("validation.") {
                assert!(!catalog.lookup(code).retryable, "{} is retryable", code);
            }
        }
    }

    #[test]
    fn test_missing_secret_is_critical_and_not_recoverable() {
        let catalog = ErrorCatalog::new();
        let descriptor = catalog.lookup("recaptcha.missing_secret");
        assert_eq!(descriptor.severity, Severity::Critical);
        assert!(!descriptor.retryable);
        assert!(!catalog.is_recoverable("recaptcha.missing_secret"));
        assert!(catalog.is_recoverable("network.failed"));
    }

    #[test]
    fn test_severity_ordering_and_urgency() {
        assert!(Severity::Low < Severity::Critical);
        assert!(Severity::High.is_urgent());
        assert!(Severity::Critical.is_urgent());
        assert!(!Severity::Medium.is_urgent());
        assert_eq!(Severity::High.to_string(), "high");
    }

    #[test]
    fn test_severity_indicator() {
        let indicator = SeverityIndicator::from(Severity::Critical);
        assert_eq!(indicator.color, "darkred");
        assert_eq!(indicator.label, "Critical");
    }

    #[test]
    fn test_recovery_steps_network() {
        let catalog = ErrorCatalog::new();
        let steps = recovery_steps(ErrorType::Network, catalog.lookup("network.offline"));
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0], "Check your internet connection and try again.");
    }

    #[test]
    fn test_recovery_steps_default() {
        let catalog = ErrorCatalog::new();
        let steps = recovery_steps(ErrorType::Unknown, catalog.lookup(UNKNOWN_CODE));
        assert_eq!(
            steps,
            vec![
                "Try again. If the problem persists, contact us.".to_string(),
                "If the problem persists, contact us.".to_string(),
            ]
        );
    }
}
