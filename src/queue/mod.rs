//! Offline fallback queue for failed submissions.
//!
//! A best-effort "try again later" safety net: when a submission exhausts
//! its retries it is persisted here and replayed later. The queue keeps only
//! the most recent entries, has no priorities and replays in insertion order.
//! Enqueue, replay and clear are serialized, so a submission stored while a
//! replay is in flight is never overwritten by the replay's final write.

pub mod store;

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::settings::QueueSettings;

pub use store::{FileStore, MemoryStore, StoreError, StoreResult, SubmissionStore};

/// Errors that can occur when persisting the queue.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// A persisted failed submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedSubmission {
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
}

impl QueuedSubmission {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            timestamp: Utc::now(),
            retry_count: 0,
        }
    }
}

/// Outcome of replaying one queued submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayResult {
    pub success: bool,
    pub original_timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of a replay pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplayReport {
    /// Submissions attempted during this pass.
    pub retried: usize,
    /// Submissions left untouched because they reached the retry cap.
    pub skipped: usize,
    pub results: Vec<ReplayResult>,
}

impl ReplayReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }
}

/// Bounded, durable queue of failed submissions.
///
/// Clones share one mutation lock.
#[derive(Clone)]
pub struct OfflineFallbackQueue {
    store: Arc<dyn SubmissionStore>,
    key: String,
    capacity: usize,
    max_retries: u32,
    gate: Arc<Mutex<()>>,
}

impl OfflineFallbackQueue {
    pub fn new(store: Arc<dyn SubmissionStore>, settings: &QueueSettings) -> Self {
        Self {
            store,
            key: settings.key.clone(),
            capacity: settings.capacity.max(1),
            max_retries: settings.max_replay_retries,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Queue over `store` with the default key and limits.
    pub fn with_defaults(store: Arc<dyn SubmissionStore>) -> Self {
        Self::new(store, &QueueSettings::default())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current entries, oldest first.
    ///
    /// Unreadable or corrupt storage reads as an empty queue.
    pub fn list(&self) -> Vec<QueuedSubmission> {
        let raw = match self.store.read(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, key = %self.key, "fallback queue unreadable, treating as empty");
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, key = %self.key, "fallback queue corrupt, treating as empty");
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persists `payload` for a later replay.
    ///
    /// Returns false when storage is unavailable; the caller should then
    /// offer the direct contact channels instead.
    pub async fn enqueue(&self, payload: Value) -> bool {
        let _guard = self.gate.lock().await;
        let mut entries = self.list();
        entries.push(QueuedSubmission::new(payload));
        if entries.len() > self.capacity {
            let excess = entries.len() - self.capacity;
            entries.drain(..excess);
        }

        match self.save(&entries) {
            Ok(()) => {
                tracing::info!(queued = entries.len(), "submission stored for retry");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to store submission for retry");
                false
            }
        }
    }

    /// Replays every entry below the retry cap through `submit`.
    ///
    /// Successful entries are dropped; failed ones stay with their retry
    /// count incremented. Entries at or above the cap are kept untouched.
    /// Other mutations wait until the pass has been persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the remaining entries cannot be persisted.
    pub async fn replay_all<F, Fut, E>(&self, mut submit: F) -> QueueResult<ReplayReport>
    where
        F: FnMut(Value) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: std::fmt::Display,
    {
        let _guard = self.gate.lock().await;
        let entries = self.list();
        let mut report = ReplayReport::default();
        if entries.is_empty() {
            return Ok(report);
        }

        let mut remaining = Vec::with_capacity(entries.len());
        for mut entry in entries {
            if entry.retry_count >= self.max_retries {
                report.skipped += 1;
                remaining.push(entry);
                continue;
            }

            report.retried += 1;
            match submit(entry.payload.clone()).await {
                Ok(()) => report.results.push(ReplayResult {
                    success: true,
                    original_timestamp: entry.timestamp,
                    error: None,
                }),
                Err(e) => {
                    entry.retry_count += 1;
                    report.results.push(ReplayResult {
                        success: false,
                        original_timestamp: entry.timestamp,
                        error: Some(e.to_string()),
                    });
                    remaining.push(entry);
                }
            }
        }

        self.save(&remaining)?;
        tracing::info!(
            retried = report.retried,
            succeeded = report.succeeded(),
            skipped = report.skipped,
            "replayed queued submissions"
        );
        Ok(report)
    }

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if storage rejects the removal.
    pub async fn clear(&self) -> QueueResult<()> {
        let _guard = self.gate.lock().await;
        self.store.remove(&self.key)?;
        Ok(())
    }

    fn save(&self, entries: &[QueuedSubmission]) -> QueueResult<()> {
        let json = serde_json::to_string(entries)?;
        self.store.write(&self.key, &json)?;
        Ok(())
    }
}

impl std::fmt::Debug for OfflineFallbackQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineFallbackQueue")
            .field("key", &self.key)
            .field("capacity", &self.capacity)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn queue() -> (Arc<MemoryStore>, OfflineFallbackQueue) {
        let store = Arc::new(MemoryStore::new());
        let queue = OfflineFallbackQueue::with_defaults(store.clone());
        (store, queue)
    }

    fn seed(store: &MemoryStore, retry_counts: &[u32]) {
        let entries: Vec<QueuedSubmission> = retry_counts
            .iter()
            .enumerate()
            .map(|(i, count)| QueuedSubmission {
                payload: json!({ "id": i }),
                timestamp: Utc::now(),
                retry_count: *count,
            })
            .collect();
        store
            .write("failed_submissions", &serde_json::to_string(&entries).expect("json"))
            .expect("write");
    }

    #[tokio::test]
    async fn test_enqueue_keeps_five_most_recent() {
        let (_, queue) = queue();
        for id in 0..6 {
            assert!(queue.enqueue(json!({ "id": id })).await);
        }

        let ids: Vec<i64> = queue
            .list()
            .iter()
            .map(|entry| entry.payload["id"].as_i64().expect("id"))
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(queue.list().iter().all(|entry| entry.retry_count == 0));
    }

    #[tokio::test]
    async fn test_enqueue_reports_unavailable_storage() {
        let (store, queue) = queue();
        store.set_available(false);
        assert!(!queue.enqueue(json!({ "id": 1 })).await);
    }

    #[tokio::test]
    async fn test_corrupt_storage_reads_as_empty() {
        let (store, queue) = queue();
        store.write("failed_submissions", "{not json").expect("write");

        assert!(queue.is_empty());
        assert!(queue.enqueue(json!({ "id": 1 })).await);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_serialized_shape() {
        let (store, queue) = queue();
        queue.enqueue(json!({ "email": "a@b.c" })).await;

        let raw = store.read("failed_submissions").expect("read").expect("value");
        let value: Value = serde_json::from_str(&raw).expect("json");
        let entry = &value[0];
        assert_eq!(entry["payload"]["email"], "a@b.c");
        assert_eq!(entry["retryCount"], 0);
        assert!(entry["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_replay_drops_successes_and_counts_failures() {
        let (store, queue) = queue();
        seed(&store, &[0, 1]);

        let report = queue
            .replay_all(|payload| async move {
                if payload["id"] == 0 {
                    Ok(())
                } else {
                    Err("still down")
                }
            })
            .await
            .expect("replay");

        assert_eq!(report.retried, 2);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.results[1].error.as_deref(), Some("still down"));

        let remaining = queue.list();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].payload["id"], 1);
        assert_eq!(remaining[0].retry_count, 2);
    }

    #[tokio::test]
    async fn test_replay_skips_capped_entries_without_dropping() {
        let (store, queue) = queue();
        seed(&store, &[3, 5, 0]);

        let mut submitted = Vec::new();
        let report = queue
            .replay_all(|payload| {
                submitted.push(payload);
                async { Ok::<(), String>(()) }
            })
            .await
            .expect("replay");

        assert_eq!(submitted.len(), 1);
        assert_eq!(report.retried, 1);
        assert_eq!(report.skipped, 2);

        let counts: Vec<u32> = queue.list().iter().map(|e| e.retry_count).collect();
        assert_eq!(counts, vec![3, 5]);
    }

    #[tokio::test]
    async fn test_replay_empty_queue() {
        let (_, queue) = queue();
        let report = queue
            .replay_all(|_| async { Ok::<(), String>(()) })
            .await
            .expect("replay");
        assert_eq!(report, ReplayReport::default());
    }

    #[tokio::test]
    async fn test_clear() {
        let (_, queue) = queue();
        queue.enqueue(json!({})).await;
        queue.clear().await.expect("clear");
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_during_replay_is_kept() {
        let (store, queue) = queue();
        seed(&store, &[0]);

        let replay = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .replay_all(|_| async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err::<(), _>("still down")
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(queue.enqueue(json!({ "id": "new" })).await);
        replay.await.expect("join").expect("replay");

        let entries = queue.list();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].payload["id"], 0);
        assert_eq!(entries[0].retry_count, 1);
        assert_eq!(entries[1].payload["id"], "new");
        assert_eq!(entries[1].retry_count, 0);
    }
}
