//! In-memory live region with clear-then-set announcements.
//!
//! Identical consecutive text is not reliably re-read by screen readers, so
//! every announcement first clears the region, waits a short debounce, then
//! sets the new text. Text clears itself after a while so it is not re-read
//! when the region is polled later.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Announcement, Announcer, Priority};
use crate::settings::AnnouncerSettings;

/// Announcements retained for inspection; older ones are dropped.
pub const HISTORY_LIMIT: usize = 32;

#[derive(Debug, Default)]
struct RegionState {
    current: Option<Announcement>,
    generation: u64,
    history: VecDeque<Announcement>,
}

/// A persistent announcement region.
///
/// Announcements are serialized: a second call waits until the first one has
/// set its text, so per-flow ordering is preserved.
#[derive(Debug, Clone)]
pub struct LiveRegion {
    debounce: Duration,
    clear_after: Duration,
    state: Arc<Mutex<RegionState>>,
    serial: Arc<tokio::sync::Mutex<()>>,
}

impl LiveRegion {
    pub fn new(debounce: Duration, clear_after: Duration) -> Self {
        Self {
            debounce,
            clear_after,
            state: Arc::new(Mutex::new(RegionState::default())),
            serial: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn from_settings(settings: &AnnouncerSettings) -> Self {
        Self::new(settings.debounce(), settings.clear_after())
    }

    /// Text currently in the region.
    pub fn current(&self) -> Option<Announcement> {
        self.state.lock().current.clone()
    }

    /// The most recent [`HISTORY_LIMIT`] announcements, oldest first.
    pub fn history(&self) -> Vec<Announcement> {
        self.state.lock().history.iter().cloned().collect()
    }

    /// Messages of [`LiveRegion::history`].
    pub fn messages(&self) -> Vec<String> {
        self.state
            .lock()
            .history
            .iter()
            .map(|a| a.message.clone())
            .collect()
    }
}

impl Default for LiveRegion {
    fn default() -> Self {
        Self::from_settings(&AnnouncerSettings::default())
    }
}

#[async_trait]
impl Announcer for LiveRegion {
    async fn announce(&self, message: &str, priority: Priority) {
        let _turn = self.serial.lock().await;

        {
            let mut state = self.state.lock();
            state.current = None;
            state.generation += 1;
        }

        tokio::time::sleep(self.debounce).await;

        let announcement = Announcement::new(message, priority);
        let generation = {
            let mut state = self.state.lock();
            state.current = Some(announcement.clone());
            if state.history.len() == HISTORY_LIMIT {
                state.history.pop_front();
            }
            state.history.push_back(announcement);
            state.generation
        };
        tracing::debug!(%priority, text = message, "announced");

        let state = Arc::clone(&self.state);
        let clear_after = self.clear_after;
        tokio::spawn(async move {
            tokio::time::sleep(clear_after).await;
            let mut state = state.lock();
            if state.generation == generation {
                state.current = None;
            }
        });
    }
}
