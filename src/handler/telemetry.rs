//! Structured error entries for the telemetry collaborator.
//!
//! This layer only produces [`LogEntry`] values; persisting or shipping them
//! is up to the [`ErrorSink`].

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::{ErrorType, Severity};

/// Error returned by a sink that could not accept an entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("telemetry sink rejected entry: {0}")]
pub struct SinkError(pub String);

/// Context of one handled error occurrence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    pub error_id: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub action: String,
    /// Caller-supplied extra fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One structured telemetry record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub context: ErrorContext,
}

/// Receives telemetry entries.
pub trait ErrorSink: Send + Sync {
    /// Records `entry`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry could not be accepted.
    fn log_error(&self, entry: &LogEntry) -> Result<(), SinkError>;
}

/// Sink that emits entries as tracing events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn log_error(&self, entry: &LogEntry) -> Result<(), SinkError> {
        let context = serde_json::to_string(&entry.context).map_err(|e| SinkError(e.to_string()))?;
        if entry.severity.is_urgent() {
            tracing::error!(
                error_id = %entry.context.error_id,
                error_type = %entry.error_type,
                code = %entry.code,
                severity = %entry.severity,
                context = %context,
                "{}",
                entry.message
            );
        } else {
            tracing::warn!(
                error_id = %entry.context.error_id,
                error_type = %entry.error_type,
                code = %entry.code,
                severity = %entry.severity,
                context = %context,
                "{}",
                entry.message
            );
        }
        Ok(())
    }
}

/// Sink that keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }
}

impl ErrorSink for MemorySink {
    fn log_error(&self, entry: &LogEntry) -> Result<(), SinkError> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}
