//! Normalized failure shapes entering the recovery layer.
//!
//! Failures arrive from very different places: the HTTP client, the form
//! validator, third-party verification SDKs, or plain JSON blobs handed over
//! by a caller. Each source converts its failure into a [`RawFailure`] once,
//! at the boundary, so the classifier only ever matches over a closed set of
//! tags.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which kind of transport-level failure occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkFailureKind {
    /// The request could not be delivered (DNS, connect, reset).
    Failed,
    /// The request was aborted after exceeding its deadline.
    Timeout,
    /// The platform reported no connectivity when the request was attempted.
    Offline,
}

/// A failure normalized at the system boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawFailure {
    /// Transport-level failure (`NetworkError` / `TimeoutError`).
    Network {
        failure: NetworkFailureKind,
        #[serde(default)]
        message: Option<String>,
    },
    /// The API answered with an error code string, optionally with a status.
    Api {
        error: String,
        #[serde(default)]
        status: Option<u16>,
        #[serde(default)]
        message: Option<String>,
    },
    /// A form field failed validation.
    Validation {
        field: String,
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    /// A third-party provider (e.g. reCAPTCHA) reported a failure code.
    Provider {
        code: String,
        #[serde(default)]
        message: Option<String>,
    },
    /// Nothing recognizable; kept only for its message.
    Unrecognized {
        #[serde(default)]
        message: Option<String>,
    },
}

impl RawFailure {
    /// Creates a network failure.
    pub fn network(failure: NetworkFailureKind) -> Self {
        Self::Network {
            failure,
            message: None,
        }
    }

    /// Creates a request timeout failure.
    pub fn timeout() -> Self {
        Self::network(NetworkFailureKind::Timeout)
    }

    /// Creates an API failure carrying the reported error code.
    pub fn api(error: impl Into<String>, status: Option<u16>) -> Self {
        Self::Api {
            error: error.into(),
            status,
            message: None,
        }
    }

    /// Creates a field validation failure.
    pub fn validation(field: impl Into<String>, code: Option<&str>) -> Self {
        Self::Validation {
            field: field.into(),
            code: code.map(str::to_string),
            message: None,
        }
    }

    /// Creates a provider failure.
    pub fn provider(code: impl Into<String>) -> Self {
        Self::Provider {
            code: code.into(),
            message: None,
        }
    }

    /// Creates an unrecognized failure.
    pub fn unrecognized(message: impl Into<String>) -> Self {
        Self::Unrecognized {
            message: Some(message.into()),
        }
    }

    /// Attaches a human-readable message, replacing any previous one.
    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        let text = Some(text.into());
        match &mut self {
            Self::Network { message, .. }
            | Self::Api { message, .. }
            | Self::Validation { message, .. }
            | Self::Provider { message, .. }
            | Self::Unrecognized { message } => *message = text,
        }
        self
    }

    /// The message attached to this failure, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Network { message, .. }
            | Self::Api { message, .. }
            | Self::Validation { message, .. }
            | Self::Provider { message, .. }
            | Self::Unrecognized { message } => message.as_deref(),
        }
    }

    /// HTTP status associated with the failure, if known.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns true for `NetworkError`/`TimeoutError` style failures.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Returns true if the transport reported a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Network {
                failure: NetworkFailureKind::Timeout,
                ..
            }
        )
    }

    /// Returns true if the failure carries a 5xx status.
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| s >= 500)
    }

    /// The API error string, if this is an API failure.
    pub fn api_error(&self) -> Option<&str> {
        match self {
            Self::Api { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The provider code, if this is a provider failure.
    pub fn provider_code(&self) -> Option<&str> {
        match self {
            Self::Provider { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Normalizes a duck-typed JSON failure.
    ///
    /// Fields are checked in a fixed order because one object can carry several
    /// signals at once:
    ///
    /// 1. network signals: `NetworkError`/`NETWORK_ERROR` first, then
    ///    `TimeoutError`/`TIMEOUT_ERROR`, then a `NETWORK_OFFLINE` code
    /// 2. an `error` string
    /// 3. a `field` attribute
    /// 4. a `code` string
    ///
    /// Anything else, including non-objects, becomes [`RawFailure::Unrecognized`].
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::Unrecognized {
                message: value.as_str().map(str::to_string),
            };
        };

        let text = |key: &str| object.get(key).and_then(Value::as_str);
        let message = text("message").map(str::to_string);
        let name = text("name");
        let code = text("code");

        let network = match (name, code) {
            (Some("NetworkError"), _) | (_, Some("NETWORK_ERROR")) => {
                Some(NetworkFailureKind::Failed)
            }
            (Some("TimeoutError"), _) | (_, Some("TIMEOUT_ERROR")) => {
                Some(NetworkFailureKind::Timeout)
            }
            (_, Some("NETWORK_OFFLINE")) => Some(NetworkFailureKind::Offline),
            _ => None,
        };
        if let Some(failure) = network {
            return Self::Network { failure, message };
        }

        if let Some(error) = text("error").filter(|e| !e.is_empty()) {
            let status = object
                .get("status")
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok());
            return Self::Api {
                error: error.to_string(),
                status,
                message,
            };
        }

        if let Some(field) = text("field").filter(|f| !f.is_empty()) {
            return Self::Validation {
                field: field.to_string(),
                code: code.filter(|c| !c.is_empty()).map(str::to_string),
                message,
            };
        }

        if let Some(code) = code.filter(|c| !c.is_empty()) {
            return Self::Provider {
                code: code.to_string(),
                message,
            };
        }

        Self::Unrecognized { message }
    }
}

impl std::fmt::Display for RawFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(message) = self.message() {
            return write!(f, "{}", message);
        }
        match self {
            Self::Network { failure, .. } => match failure {
                NetworkFailureKind::Failed => write!(f, "network request failed"),
                NetworkFailureKind::Timeout => write!(f, "request timeout"),
                NetworkFailureKind::Offline => write!(f, "no internet connection"),
            },
            Self::Api { error, status, .. } => match status {
                Some(status) => write!(f, "HTTP {}: {}", status, error),
                None => write!(f, "api error: {}", error),
            },
            Self::Validation { field, code, .. } => write!(
                f,
                "validation failed for '{}': {}",
                field,
                code.as_deref().unwrap_or("invalid")
            ),
            Self::Provider { code, .. } => write!(f, "provider error: {}", code),
            Self::Unrecognized { .. } => write!(f, "Unknown error"),
        }
    }
}

impl std::error::Error for RawFailure {}
