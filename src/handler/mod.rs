//! Client error orchestration.
//!
//! [`ClientErrorHandler`] drives one logical error occurrence through
//! `RECEIVED -> CLASSIFIED -> DISPLAYED -> (AUTO_RETRYING -> RETRY_SUCCEEDED |
//! RETRY_EXHAUSTED) -> TERMINAL`. It classifies the failure, builds the
//! display, announces it, optionally retries with backoff and finally hands
//! network-class submissions to the offline queue. It never lets an internal
//! failure reach the caller.

pub mod contacts;
pub mod display;
pub mod telemetry;

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::announce::{Announcer, LogAnnouncer, Priority};
use crate::error::{ClassifiedError, Classifier, ErrorCatalog, ErrorDescriptor, RawFailure};
use crate::network::NetworkMonitor;
use crate::queue::OfflineFallbackQueue;
use crate::retry::{RetryEvent, RetryExecutor, RetryOutcome, RetryPolicy, RetryPolicyResolver};
use crate::settings::RecourseConfig;

pub use contacts::{FallbackAdvice, FallbackContacts};
pub use display::{
    field_label, AccessibilityAttributes, Action, ActionKind, DisplayConfig, DisplayType,
    FriendlyError,
};
pub use telemetry::{ErrorContext, ErrorSink, LogEntry, MemorySink, SinkError, TracingSink};

/// Reason reported when auto-retry applies but nothing can be retried.
pub const NO_RETRY_FUNCTION: &str = "No retry function provided";

/// Message shown when handling itself failed.
pub const FALLBACK_MESSAGE: &str = "An unexpected error occurred. Try again or contact us.";

/// Announced when every automatic attempt failed.
pub const EXHAUSTED_MESSAGE: &str = "All attempts failed. Please contact us directly if needed.";

/// Announced after a successful manual retry.
pub const MANUAL_RETRY_SUCCESS_MESSAGE: &str = "Operation completed successfully.";

/// Operation re-run by automatic and manual retries.
pub type RetryFn = Arc<dyn Fn() -> BoxFuture<'static, Result<Value, RawFailure>> + Send + Sync>;

/// Wraps an async closure as a [`RetryFn`].
pub fn retry_fn<F, Fut>(operation: F) -> RetryFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RawFailure>> + Send + 'static,
{
    Arc::new(move || operation().boxed())
}

/// Errors raised inside the handler itself.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Telemetry(#[from] SinkError),

    #[error("error handler panicked: {0}")]
    Panicked(String),
}

/// Handler behaviour, loaded from the `[handler]` configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerOptions {
    pub default_display_type: DisplayType,
    pub auto_retry: bool,
    /// Automatic retries allowed per error occurrence.
    pub max_retries: u32,
    pub enable_accessibility: bool,
    pub log_errors: bool,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            default_display_type: DisplayType::Toast,
            auto_retry: true,
            max_retries: 3,
            enable_accessibility: true,
            log_errors: true,
        }
    }
}

/// Per-call options for [`ClientErrorHandler::handle`].
#[derive(Clone, Default)]
pub struct HandleOptions {
    /// Where the failure came from; defaults to `client`.
    pub source: Option<String>,
    /// What the user was doing; defaults to `unknown`.
    pub action: Option<String>,
    pub display_type: Option<DisplayType>,
    pub retry: Option<RetryFn>,
    /// Submission to store for later replay if retries are exhausted.
    pub payload: Option<Value>,
    pub context: Map<String, Value>,
}

impl HandleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn display_type(mut self, display_type: DisplayType) -> Self {
        self.display_type = Some(display_type);
        self
    }

    pub fn retry(mut self, retry: RetryFn) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn context_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

impl std::fmt::Debug for HandleOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleOptions")
            .field("source", &self.source)
            .field("action", &self.action)
            .field("display_type", &self.display_type)
            .field("retry", &self.retry.is_some())
            .field("payload", &self.payload)
            .field("context", &self.context)
            .finish()
    }
}

/// Lifecycle states of one error occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandleState {
    Received,
    Classified,
    Displayed,
    AutoRetrying,
    RetrySucceeded,
    RetryExhausted,
    Terminal,
}

/// How handling ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandleOutcome {
    /// The error was displayed; no automatic retry ran.
    Displayed,
    /// Auto-retry applied but no retry function was supplied.
    NoRetryFunction { reason: String },
    /// An automatic retry succeeded.
    RetrySucceeded { attempts: u32 },
    /// Every automatic attempt failed.
    RetryExhausted { attempts: u32, queued: bool },
    /// A manual retry succeeded.
    ManualRetrySucceeded,
    /// Handling itself failed; a fixed response was returned.
    Fallback,
}

/// Result of handling one error occurrence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleResult {
    pub success: bool,
    pub error_id: String,
    pub outcome: HandleOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FriendlyError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_config: Option<DisplayConfig>,
    pub context: ErrorContext,
    /// Value produced by a successful retry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackAdvice>,
    pub transitions: Vec<HandleState>,
}

impl HandleResult {
    /// Value of the `reason` reported for a missing retry function.
    pub fn reason(&self) -> Option<&str> {
        match &self.outcome {
            HandleOutcome::NoRetryFunction { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.outcome == HandleOutcome::Fallback
    }
}

/// Orchestrates classification, display, announcements, retries and fallback.
pub struct ClientErrorHandler {
    options: HandlerOptions,
    classifier: Classifier,
    catalog: Arc<ErrorCatalog>,
    resolver: RetryPolicyResolver,
    executor: RetryExecutor,
    announcer: Arc<dyn Announcer>,
    sink: Arc<dyn ErrorSink>,
    queue: Option<OfflineFallbackQueue>,
    contacts: FallbackContacts,
    retry_attempts: Mutex<HashMap<String, u32>>,
}

impl ClientErrorHandler {
    /// Handler with default options, logging announcer and tracing telemetry.
    pub fn new(monitor: NetworkMonitor) -> Self {
        Self {
            options: HandlerOptions::default(),
            classifier: Classifier::new(monitor),
            catalog: Arc::new(ErrorCatalog::new()),
            resolver: RetryPolicyResolver::new(),
            executor: RetryExecutor::new(),
            announcer: Arc::new(LogAnnouncer),
            sink: Arc::new(TracingSink),
            queue: None,
            contacts: FallbackContacts::default(),
            retry_attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Handler configured from `config`.
    pub fn from_config(config: &RecourseConfig, monitor: NetworkMonitor) -> Self {
        Self::new(monitor)
            .with_options(config.handler.clone())
            .with_contacts(config.contacts.clone())
    }

    pub fn with_options(mut self, options: HandlerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_announcer(mut self, announcer: Arc<dyn Announcer>) -> Self {
        self.announcer = announcer;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_queue(mut self, queue: OfflineFallbackQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn with_contacts(mut self, contacts: FallbackContacts) -> Self {
        self.contacts = contacts;
        self
    }

    pub fn options(&self) -> &HandlerOptions {
        &self.options
    }

    pub fn catalog(&self) -> &ErrorCatalog {
        &self.catalog
    }

    pub fn monitor(&self) -> &NetworkMonitor {
        self.classifier.monitor()
    }

    pub fn queue(&self) -> Option<&OfflineFallbackQueue> {
        self.queue.as_ref()
    }

    /// Automatic retries recorded for an in-flight error occurrence.
    pub fn retry_count(&self, error_id: &str) -> u32 {
        self.retry_attempts.lock().get(error_id).copied().unwrap_or(0)
    }

    /// Handles one failure.
    ///
    /// Never fails: internal errors and panics degrade to
    /// [`ClientErrorHandler::handle_fallback_error`].
    pub async fn handle(&self, raw: RawFailure, options: HandleOptions) -> HandleResult {
        let context = self.context_for(&options);

        let processed = AssertUnwindSafe(self.process(&raw, &options, context.clone()))
            .catch_unwind()
            .await;

        let failure = match processed {
            Ok(Ok(result)) => return result,
            Ok(Err(e)) => e,
            Err(panic) => HandlerError::Panicked(panic_message(&*panic)),
        };
        tracing::error!(error = %failure, error_id = %context.error_id, "error handler failed");
        self.handle_fallback_error(&raw, context).await
    }

    /// Handles an API error response given as JSON.
    pub async fn handle_api_error(&self, response: &Value, options: HandleOptions) -> HandleResult {
        self.handle(RawFailure::from_value(response), options.source("api"))
            .await
    }

    /// Handles a form validation failure, displayed inline.
    pub async fn handle_form_error(&self, raw: RawFailure, options: HandleOptions) -> HandleResult {
        self.handle(
            raw,
            options.source("form").display_type(DisplayType::Inline),
        )
        .await
    }

    /// Runs `retry` once on user request.
    ///
    /// A failure is handled as a new occurrence with source `retry`.
    pub async fn handle_retry(&self, retry: RetryFn) -> HandleResult {
        let options = HandleOptions::new()
            .source("retry")
            .action("manual_retry")
            .retry(Arc::clone(&retry));

        match retry().await {
            Ok(value) => {
                self.announce(MANUAL_RETRY_SUCCESS_MESSAGE, Priority::Polite)
                    .await;
                HandleResult {
                    success: true,
                    error_id: generate_error_id(),
                    outcome: HandleOutcome::ManualRetrySucceeded,
                    error: None,
                    display_config: None,
                    context: self.context_for(&options),
                    value: Some(value),
                    fallback: None,
                    transitions: vec![HandleState::Terminal],
                }
            }
            Err(raw) => self.handle(raw, options).await,
        }
    }

    /// Forgets any retry bookkeeping for `error_id`.
    pub fn dismiss(&self, error_id: &str) {
        tracing::debug!(error_id, "dismissing error");
        self.retry_attempts.lock().remove(error_id);
    }

    /// Announces and returns the direct contact channels.
    pub async fn contact(&self) -> FallbackContacts {
        self.announce(&self.contacts.announcement(), Priority::Polite)
            .await;
        self.contacts.clone()
    }

    /// Fixed response used when handling itself failed. Never fails.
    pub async fn handle_fallback_error(
        &self,
        raw: &RawFailure,
        context: ErrorContext,
    ) -> HandleResult {
        tracing::error!(error = %raw, error_id = %context.error_id, "fallback error handling");

        if self.options.enable_accessibility {
            let announced = AssertUnwindSafe(
                self.announcer
                    .announce(FALLBACK_MESSAGE, Priority::Assertive),
            )
            .catch_unwind()
            .await;
            if announced.is_err() {
                tracing::error!("fallback announcement failed");
            }
        }

        HandleResult {
            success: false,
            error_id: context.error_id.clone(),
            outcome: HandleOutcome::Fallback,
            error: Some(FriendlyError::fallback(FALLBACK_MESSAGE)),
            display_config: None,
            context,
            value: None,
            fallback: Some(FallbackAdvice {
                message: FALLBACK_MESSAGE.to_string(),
                queued: false,
                contacts: self.contacts.clone(),
            }),
            transitions: vec![HandleState::Received, HandleState::Terminal],
        }
    }

    async fn process(
        &self,
        raw: &RawFailure,
        options: &HandleOptions,
        context: ErrorContext,
    ) -> Result<HandleResult, HandlerError> {
        let mut transitions = vec![HandleState::Received];

        let classified = self.classifier.classify(raw);
        let descriptor = self.catalog.lookup(&classified.code);
        let friendly = FriendlyError::new(classified.clone(), descriptor, raw);
        transitions.push(HandleState::Classified);

        if self.options.log_errors {
            self.sink.log_error(&LogEntry {
                timestamp: context.timestamp,
                error_type: classified.error_type,
                code: classified.code.clone(),
                severity: descriptor.severity,
                message: raw.to_string(),
                context: context.clone(),
            })?;
        }

        let display_config = DisplayConfig::build(
            &friendly,
            options.display_type,
            self.options.default_display_type,
            options.retry.is_some(),
        );
        self.announce(
            &friendly.announcement(),
            Priority::from_severity(friendly.severity),
        )
        .await;
        transitions.push(HandleState::Displayed);

        let mut result = HandleResult {
            success: false,
            error_id: context.error_id.clone(),
            outcome: HandleOutcome::Displayed,
            error: Some(friendly),
            display_config: Some(display_config),
            context,
            value: None,
            fallback: None,
            transitions,
        };

        if self.should_auto_retry(&result.error_id, descriptor) {
            match (&options.retry, self.resolver.resolve(&classified, descriptor)) {
                (None, _) => {
                    result.outcome = HandleOutcome::NoRetryFunction {
                        reason: NO_RETRY_FUNCTION.to_string(),
                    };
                }
                (Some(retry), Some(policy)) => {
                    let policy = self.cap_attempts(&result.error_id, policy);
                    if policy.max_attempts <= 1 {
                        // Nothing left to retry; the handled failure was the only attempt.
                        tracing::info!(error_id = %result.error_id, "no automatic retry budget");
                        self.escalate(1, &classified, options, &mut result).await;
                    } else {
                        result.transitions.push(HandleState::AutoRetrying);
                        self.auto_retry(raw, retry, policy, &classified, options, &mut result)
                            .await;
                    }
                }
                (Some(_), None) => {}
            }
        }

        result.transitions.push(HandleState::Terminal);
        Ok(result)
    }

    fn should_auto_retry(&self, error_id: &str, descriptor: &ErrorDescriptor) -> bool {
        self.options.auto_retry
            && descriptor.retryable
            && self.retry_count(error_id) < self.options.max_retries
    }

    /// Caps the policy by the handler's remaining retries for `error_id`.
    fn cap_attempts(
        &self,
        error_id: &str,
        mut policy: RetryPolicy<RawFailure>,
    ) -> RetryPolicy<RawFailure> {
        let remaining = self
            .options
            .max_retries
            .saturating_sub(self.retry_count(error_id));
        // The failure being handled is attempt 1.
        policy.max_attempts = policy.max_attempts.min(remaining.saturating_add(1));
        policy
    }

    async fn auto_retry(
        &self,
        raw: &RawFailure,
        retry: &RetryFn,
        policy: RetryPolicy<RawFailure>,
        classified: &ClassifiedError,
        options: &HandleOptions,
        result: &mut HandleResult,
    ) {
        let error_id = result.error_id.clone();
        let used = self.retry_count(&error_id);

        let (sender, mut receiver) = mpsc::unbounded_channel();
        let run = self.executor.run_after_failure(
            raw.clone(),
            || retry(),
            &policy,
            Some(sender),
        );
        let progress = async {
            while let Some(event) = receiver.recv().await {
                if let RetryEvent::Retrying(record) = event {
                    *self
                        .retry_attempts
                        .lock()
                        .entry(error_id.clone())
                        .or_insert(0) += 1;
                    self.announce(
                        &retry_progress_message(
                            record.attempt + 1,
                            record.max_attempts,
                            record.delay,
                        ),
                        Priority::Polite,
                    )
                    .await;
                }
            }
        };
        let (outcome, ()) = tokio::join!(run, progress);

        let retries = self
            .retry_attempts
            .lock()
            .remove(&error_id)
            .unwrap_or(used)
            .saturating_sub(used);

        match outcome {
            Ok(RetryOutcome { value, attempts }) => {
                tracing::info!(error_id = %error_id, attempts, "automatic retry succeeded");
                self.announce(
                    &format!("Succeeded on attempt {}. Operation completed.", attempts),
                    Priority::Polite,
                )
                .await;
                result.success = true;
                result.outcome = HandleOutcome::RetrySucceeded { attempts };
                result.value = Some(value);
                result.error = None;
                result.display_config = None;
                result.transitions.push(HandleState::RetrySucceeded);
            }
            Err(last) => {
                let attempts = retries + 1;
                tracing::warn!(error_id = %error_id, attempts, error = %last, "automatic retry exhausted");
                self.announce(EXHAUSTED_MESSAGE, Priority::Assertive).await;
                self.escalate(attempts, classified, options, result).await;
            }
        }
    }

    /// Hands a network-class payload to the queue and attaches contact advice.
    async fn escalate(
        &self,
        attempts: u32,
        classified: &ClassifiedError,
        options: &HandleOptions,
        result: &mut HandleResult,
    ) {
        let queued = classified.is_network() && self.enqueue(options.payload.as_ref()).await;
        result.outcome = HandleOutcome::RetryExhausted { attempts, queued };
        result.fallback = Some(FallbackAdvice {
            message: self.contacts.message.clone(),
            queued,
            contacts: self.contacts.clone(),
        });
        result.transitions.push(HandleState::RetryExhausted);
    }

    async fn enqueue(&self, payload: Option<&Value>) -> bool {
        match (&self.queue, payload) {
            (Some(queue), Some(payload)) => queue.enqueue(payload.clone()).await,
            _ => false,
        }
    }

    async fn announce(&self, message: &str, priority: Priority) {
        if self.options.enable_accessibility {
            self.announcer.announce(message, priority).await;
        }
    }

    fn context_for(&self, options: &HandleOptions) -> ErrorContext {
        ErrorContext {
            error_id: generate_error_id(),
            timestamp: Utc::now(),
            source: options.source.clone().unwrap_or_else(|| "client".to_string()),
            action: options.action.clone().unwrap_or_else(|| "unknown".to_string()),
            extra: options.context.clone(),
        }
    }
}

impl std::fmt::Debug for ClientErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientErrorHandler")
            .field("options", &self.options)
            .field("queue", &self.queue)
            .field("pending_retries", &self.retry_attempts.lock().len())
            .finish_non_exhaustive()
    }
}

/// Progress text announced before waiting for the next attempt.
pub fn retry_progress_message(next_attempt: u32, max_attempts: u32, delay: Duration) -> String {
    let seconds = (delay.as_millis() as u64).div_ceil(1000);
    format!(
        "Attempt {} of {}. Retrying in {} seconds.",
        next_attempt, max_attempts, seconds
    )
}

/// Generates an id of the form `err_<base36 millis>_<6 base36 chars>`.
pub fn generate_error_id() -> String {
    let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .map(|_| std::char::from_digit(rng.random_range(0..36), 36).unwrap_or('0'))
        .collect();
    format!("err_{}_{}", to_base36(millis), suffix)
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(std::char::from_digit((value % 36) as u32, 36).unwrap_or('0'));
        value /= 36;
    }
    digits.iter().rev().collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announce::LiveRegion;
    use crate::error::NetworkFailureKind;
    use crate::queue::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Harness {
        handler: ClientErrorHandler,
        region: LiveRegion,
        sink: Arc<MemorySink>,
        monitor: NetworkMonitor,
    }

    fn harness(options: HandlerOptions) -> Harness {
        let monitor = NetworkMonitor::new(true);
        let region = LiveRegion::new(Duration::from_millis(100), Duration::from_secs(10));
        let sink = Arc::new(MemorySink::new());
        let handler = ClientErrorHandler::new(monitor.clone())
            .with_options(options)
            .with_announcer(Arc::new(region.clone()))
            .with_sink(sink.clone());
        Harness {
            handler,
            region,
            sink,
            monitor,
        }
    }

    fn counting_retry(succeed_on_call: u32) -> (Arc<AtomicU32>, RetryFn) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let retry = retry_fn(move || {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call >= succeed_on_call {
                    Ok(json!({ "sent": true }))
                } else {
                    Err(RawFailure::network(NetworkFailureKind::Failed))
                }
            }
        });
        (calls, retry)
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_error_is_displayed_inline_without_retry() {
        let h = harness(HandlerOptions::default());
        let (calls, retry) = counting_retry(1);

        let result = h
            .handler
            .handle(
                RawFailure::validation("email", Some("invalid")),
                HandleOptions::new().retry(retry),
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.outcome, HandleOutcome::Displayed);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let display = result.display_config.expect("display");
        assert_eq!(display.display_type, DisplayType::Inline);
        assert!(!display.persistent);
        assert_eq!(
            result.transitions,
            vec![
                HandleState::Received,
                HandleState::Classified,
                HandleState::Displayed,
                HandleState::Terminal
            ]
        );
        assert_eq!(h.region.history().len(), 1);
        assert_eq!(h.region.history()[0].priority, Priority::Polite);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_retry_success_announces_progress_then_outcome() {
        let h = harness(HandlerOptions::default());
        let (calls, retry) = counting_retry(1);

        let result = h
            .handler
            .handle(RawFailure::timeout(), HandleOptions::new().retry(retry))
            .await;

        assert!(result.success);
        assert_eq!(result.outcome, HandleOutcome::RetrySucceeded { attempts: 2 });
        assert_eq!(result.value, Some(json!({ "sent": true })));
        assert!(result.error.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.handler.retry_count(&result.error_id), 0);

        let messages = h.region.messages();
        assert_eq!(messages.len(), 3);
        assert!(messages[1].starts_with("Attempt 2 of 3. Retrying in "));
        assert_eq!(messages[2], "Succeeded on attempt 2. Operation completed.");
        assert!(result.transitions.contains(&HandleState::RetrySucceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_network_failure_is_queued() {
        let store = Arc::new(MemoryStore::new());
        let queue = OfflineFallbackQueue::with_defaults(store);
        let h = harness(HandlerOptions::default());
        let handler = h.handler.with_queue(queue.clone());
        let (calls, retry) = counting_retry(u32::MAX);

        let result = handler
            .handle(
                RawFailure::network(NetworkFailureKind::Failed),
                HandleOptions::new()
                    .retry(retry)
                    .payload(json!({ "email": "a@b.c" })),
            )
            .await;

        assert!(!result.success);
        assert_eq!(
            result.outcome,
            HandleOutcome::RetryExhausted {
                attempts: 3,
                queued: true
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(queue.len(), 1);
        assert!(result.fallback.expect("fallback").queued);

        let last = h.region.history().pop().expect("announcement");
        assert_eq!(last.message, EXHAUSTED_MESSAGE);
        assert_eq!(last.priority, Priority::Assertive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_non_network_failure_is_not_queued() {
        let store = Arc::new(MemoryStore::new());
        let queue = OfflineFallbackQueue::with_defaults(store);
        let h = harness(HandlerOptions::default());
        let handler = h.handler.with_queue(queue.clone());
        let retry = retry_fn(|| async { Err(RawFailure::api("server_error", Some(500))) });

        let result = handler
            .handle(
                RawFailure::api("server_error", Some(500)),
                HandleOptions::new().retry(retry).payload(json!({})),
            )
            .await;

        assert!(matches!(
            result.outcome,
            HandleOutcome::RetryExhausted { queued: false, .. }
        ));
        assert!(queue.is_empty());
        assert!(result.fallback.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_policy_skips_auto_retry() {
        let h = harness(HandlerOptions::default());
        let (calls, retry) = counting_retry(1);

        let result = h
            .handler
            .handle(
                RawFailure::api("rate_limited", Some(429)),
                HandleOptions::new().retry(retry).payload(json!({})),
            )
            .await;

        assert!(!result.success);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            result.outcome,
            HandleOutcome::RetryExhausted {
                attempts: 1,
                queued: false
            }
        );
        assert!(result.fallback.is_some());
        assert_eq!(
            result.transitions,
            vec![
                HandleState::Received,
                HandleState::Classified,
                HandleState::Displayed,
                HandleState::RetryExhausted,
                HandleState::Terminal
            ]
        );
        assert!(!h
            .region
            .messages()
            .iter()
            .any(|message| message == EXHAUSTED_MESSAGE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_retry_function_reports_reason() {
        let h = harness(HandlerOptions::default());
        let result = h
            .handler
            .handle(RawFailure::timeout(), HandleOptions::new())
            .await;

        assert!(!result.success);
        assert_eq!(result.reason(), Some(NO_RETRY_FUNCTION));
        assert!(result.display_config.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_retry_disabled() {
        let h = harness(HandlerOptions {
            auto_retry: false,
            ..HandlerOptions::default()
        });
        let (calls, retry) = counting_retry(1);

        let result = h
            .handler
            .handle(RawFailure::timeout(), HandleOptions::new().retry(retry))
            .await;

        assert_eq!(result.outcome, HandleOutcome::Displayed);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(result
            .display_config
            .expect("display")
            .has_action(ActionKind::Retry));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_max_retries_caps_policy() {
        let h = harness(HandlerOptions {
            max_retries: 1,
            ..HandlerOptions::default()
        });
        let (calls, retry) = counting_retry(u32::MAX);

        let result = h
            .handler
            .handle(
                RawFailure::network(NetworkFailureKind::Offline),
                HandleOptions::new().retry(retry),
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result.outcome,
            HandleOutcome::RetryExhausted { attempts: 2, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_accessibility_disabled_is_silent() {
        let h = harness(HandlerOptions {
            enable_accessibility: false,
            ..HandlerOptions::default()
        });
        h.handler
            .handle(RawFailure::provider("missing_secret"), HandleOptions::new())
            .await;
        assert!(h.region.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_telemetry_entry() {
        let h = harness(HandlerOptions::default());
        let result = h
            .handler
            .handle(
                RawFailure::api("rate_limited", Some(429)),
                HandleOptions::new()
                    .source("api")
                    .action("submit_contact")
                    .context_value("form", "contact"),
            )
            .await;

        let entries = h.sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].code, "api.rate_limited");
        assert_eq!(entries[0].context.error_id, result.error_id);
        assert_eq!(entries[0].context.source, "api");
        assert_eq!(entries[0].context.extra["form"], "contact");
    }

    struct FailingSink;

    impl ErrorSink for FailingSink {
        fn log_error(&self, _entry: &LogEntry) -> Result<(), SinkError> {
            Err(SinkError("collector offline".to_string()))
        }
    }

    struct PanickingSink;

    impl ErrorSink for PanickingSink {
        fn log_error(&self, _entry: &LogEntry) -> Result<(), SinkError> {
            panic!("sink exploded");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_internal_error_degrades_to_fallback() {
        let h = harness(HandlerOptions::default());
        let handler = h.handler.with_sink(Arc::new(FailingSink));

        let result = handler
            .handle(RawFailure::timeout(), HandleOptions::new())
            .await;

        assert!(result.is_fallback());
        assert!(!result.success);
        let error = result.error.expect("fallback error");
        assert_eq!(error.message, FALLBACK_MESSAGE);
        assert!(error.retryable);
        assert_eq!(
            h.region.history().pop().map(|a| a.priority),
            Some(Priority::Assertive)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_degrades_to_fallback() {
        let h = harness(HandlerOptions::default());
        let handler = h.handler.with_sink(Arc::new(PanickingSink));

        let result = handler
            .handle(RawFailure::unrecognized("boom"), HandleOptions::new())
            .await;

        assert!(result.is_fallback());
        assert!(result.error_id.starts_with("err_"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_classification_through_handler() {
        let h = harness(HandlerOptions {
            auto_retry: false,
            ..HandlerOptions::default()
        });
        h.monitor.handle_status_change(false);

        let result = h
            .handler
            .handle(RawFailure::provider("low_score"), HandleOptions::new())
            .await;
        assert_eq!(result.error.expect("error").code(), "network.offline");
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_retry() {
        let h = harness(HandlerOptions {
            auto_retry: false,
            ..HandlerOptions::default()
        });

        let (_, ok) = counting_retry(1);
        let result = h.handler.handle_retry(ok).await;
        assert!(result.success);
        assert_eq!(result.outcome, HandleOutcome::ManualRetrySucceeded);
        assert_eq!(
            h.region.messages().last().map(String::as_str),
            Some(MANUAL_RETRY_SUCCESS_MESSAGE)
        );

        let (_, failing) = counting_retry(u32::MAX);
        let result = h.handler.handle_retry(failing).await;
        assert!(!result.success);
        assert_eq!(result.context.source, "retry");
        assert_eq!(result.context.action, "manual_retry");
    }

    #[tokio::test(start_paused = true)]
    async fn test_form_and_api_entry_points() {
        let h = harness(HandlerOptions::default());

        let form = h
            .handler
            .handle_form_error(RawFailure::validation("name", Some("name_required")), HandleOptions::new())
            .await;
        assert_eq!(form.context.source, "form");
        assert_eq!(
            form.display_config.expect("display").field_label.as_deref(),
            Some("Name")
        );

        let api = h
            .handler
            .handle_api_error(
                &json!({ "error": "missing_required_fields", "status": 400 }),
                HandleOptions::new(),
            )
            .await;
        assert_eq!(api.context.source, "api");
        assert_eq!(api.error.expect("error").code(), "api.missing_required_fields");
    }

    #[tokio::test(start_paused = true)]
    async fn test_contact_announces_channels() {
        let h = harness(HandlerOptions::default());
        let handler = h.handler.with_contacts(FallbackContacts {
            phone: "+1 555 0100".to_string(),
            ..FallbackContacts::default()
        });

        let contacts = handler.contact().await;
        assert_eq!(contacts.phone, "+1 555 0100");
        assert_eq!(
            h.region.messages(),
            vec!["Contact information: phone +1 555 0100.".to_string()]
        );
    }

    #[test]
    fn test_dismiss_clears_counter() {
        let handler = ClientErrorHandler::new(NetworkMonitor::new(true));
        handler.retry_attempts.lock().insert("err_x".to_string(), 2);
        assert_eq!(handler.retry_count("err_x"), 2);
        handler.dismiss("err_x");
        assert_eq!(handler.retry_count("err_x"), 0);
    }

    #[test]
    fn test_error_id_format() {
        let id = generate_error_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "err");
        assert!(parts[1].chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(parts[2].len(), 6);
        assert_ne!(generate_error_id(), id);
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_retry_progress_message_rounds_up() {
        assert_eq!(
            retry_progress_message(2, 3, Duration::from_millis(1_001)),
            "Attempt 2 of 3. Retrying in 2 seconds."
        );
        assert_eq!(
            retry_progress_message(3, 5, Duration::from_millis(3_000)),
            "Attempt 3 of 5. Retrying in 3 seconds."
        );
    }

    #[test]
    fn test_handle_result_serialization() {
        let context = ErrorContext {
            error_id: "err_1_aaaaaa".to_string(),
            timestamp: Utc::now(),
            source: "client".to_string(),
            action: "unknown".to_string(),
            extra: Map::new(),
        };
        let result = HandleResult {
            success: false,
            error_id: "err_1_aaaaaa".to_string(),
            outcome: HandleOutcome::NoRetryFunction {
                reason: NO_RETRY_FUNCTION.to_string(),
            },
            error: None,
            display_config: None,
            context,
            value: None,
            fallback: None,
            transitions: vec![HandleState::Received, HandleState::Terminal],
        };
        let value = serde_json::to_value(&result).expect("serialize");
        assert_eq!(value["errorId"], "err_1_aaaaaa");
        assert_eq!(value["outcome"]["kind"], "no_retry_function");
        assert_eq!(value["outcome"]["reason"], NO_RETRY_FUNCTION);
        assert_eq!(value["transitions"][0], "RECEIVED");
    }
}
