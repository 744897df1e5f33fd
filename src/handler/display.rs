//! Display configuration handed to the UI layer.
//!
//! The UI renders a [`DisplayConfig`] as is; severity styling, actions and
//! accessibility attributes are all decided here.

use serde::{Deserialize, Serialize};

use crate::error::{
    recovery_steps, ClassifiedError, ErrorDescriptor, ErrorType, RawFailure, Severity,
    SeverityIndicator,
};

/// Where and how an error is shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayType {
    #[default]
    Toast,
    Inline,
    Modal,
    Banner,
}

/// What an action button does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Retry,
    Dismiss,
    Contact,
    Reload,
    Navigate,
}

/// A button offered alongside the error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub label: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub primary: bool,
}

impl Action {
    fn new(kind: ActionKind, label: &str) -> Self {
        Self {
            kind,
            label: label.to_string(),
            primary: false,
        }
    }

    fn primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

/// ARIA attributes for the rendered error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilityAttributes {
    pub aria_label: String,
    pub role: String,
    pub tab_index: i32,
}

/// A classified failure together with its user-facing description.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendlyError {
    #[serde(flatten)]
    pub classified: ClassifiedError,
    pub message: String,
    pub severity: Severity,
    pub recovery: String,
    pub recovery_steps: Vec<String>,
    pub aria_label: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Diagnostic text carried by the raw failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl FriendlyError {
    pub fn new(
        classified: ClassifiedError,
        descriptor: &ErrorDescriptor,
        raw: &RawFailure,
    ) -> Self {
        let field = descriptor.field.map(str::to_string).or_else(|| match raw {
            RawFailure::Validation { field, .. } => Some(field.clone()),
            _ => None,
        });

        Self {
            recovery_steps: recovery_steps(classified.error_type, descriptor),
            classified,
            message: descriptor.user_message.to_string(),
            severity: descriptor.severity,
            recovery: descriptor.recovery.to_string(),
            aria_label: descriptor.aria_label.to_string(),
            retryable: descriptor.retryable,
            field,
            retry_delay_ms: descriptor.retry_delay_ms,
            max_retries: descriptor.max_retries,
            detail: raw.message().map(str::to_string),
        }
    }

    /// Fixed description used when handling itself failed.
    pub fn fallback(message: &str) -> Self {
        Self {
            classified: ClassifiedError::unknown(),
            message: message.to_string(),
            severity: Severity::High,
            recovery: "Try again or contact us directly.".to_string(),
            recovery_steps: vec!["Try again or contact us directly.".to_string()],
            aria_label: message.to_string(),
            retryable: true,
            field: None,
            retry_delay_ms: None,
            max_retries: None,
            detail: None,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        self.classified.error_type
    }

    pub fn code(&self) -> &str {
        &self.classified.code
    }

    /// Text announced to assistive technology.
    pub fn announcement(&self) -> String {
        if self.aria_label.is_empty() {
            format!("Error: {}", self.message)
        } else {
            self.aria_label.clone()
        }
    }
}

/// Everything the UI needs to render one error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayConfig {
    #[serde(rename = "type")]
    pub display_type: DisplayType,
    pub title: String,
    pub message: String,
    pub recovery: String,
    pub severity: Severity,
    pub indicator: SeverityIndicator,
    pub actions: Vec<Action>,
    pub accessibility: AccessibilityAttributes,
    pub auto_close: bool,
    pub persistent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_label: Option<String>,
}

impl DisplayConfig {
    /// Builds the display for `error`.
    ///
    /// Without an explicit `display_type`, validation errors render inline
    /// next to their field and everything else uses `default_type`.
    pub fn build(
        error: &FriendlyError,
        display_type: Option<DisplayType>,
        default_type: DisplayType,
        can_retry: bool,
    ) -> Self {
        let display_type = display_type.unwrap_or(match error.error_type() {
            ErrorType::Validation => DisplayType::Inline,
            _ => default_type,
        });

        Self {
            display_type,
            title: title_for(error.severity).to_string(),
            message: error.message.clone(),
            recovery: error.recovery.clone(),
            severity: error.severity,
            indicator: SeverityIndicator::from(error.severity),
            actions: actions_for(error, can_retry),
            accessibility: AccessibilityAttributes {
                aria_label: error.announcement(),
                role: "alert".to_string(),
                tab_index: -1,
            },
            auto_close: !error.severity.is_urgent(),
            persistent: error.severity.is_urgent(),
            field_label: error.field.as_deref().map(|f| field_label(f).to_string()),
            field: error.field.clone(),
        }
    }

    pub fn has_action(&self, kind: ActionKind) -> bool {
        self.actions.iter().any(|a| a.kind == kind)
    }
}

fn title_for(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "Critical error",
        Severity::High => "Error",
        Severity::Medium => "Attention",
        Severity::Low => "Notice",
    }
}

fn actions_for(error: &FriendlyError, can_retry: bool) -> Vec<Action> {
    let mut actions = Vec::new();

    if error.retryable && can_retry {
        actions.push(Action::new(ActionKind::Retry, "Try again").primary());
    }
    if error.severity.is_urgent() || error.error_type() == ErrorType::EmailService {
        actions.push(Action::new(ActionKind::Contact, "Contact us"));
    }
    if error.error_type() == ErrorType::Network {
        actions.push(Action::new(ActionKind::Reload, "Reload page"));
    }
    actions.push(Action::new(ActionKind::Dismiss, "Close"));

    actions
}

/// Human-readable label for a form field; unknown fields are returned as is.
pub fn field_label(field: &str) -> &str {
    match field {
        "name" => "Name",
        "email" => "Email",
        "phone" => "Phone",
        "message" => "Message",
        "consent" => "Consent",
        "appointment_date" => "Appointment date",
        "appointment_time" => "Appointment time",
        other => other,
    }
}
