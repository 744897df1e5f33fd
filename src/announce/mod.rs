//! Assistive-technology announcements.
//!
//! The orchestrator only talks to the [`Announcer`] trait. [`LiveRegion`]
//! models a persistent, visually hidden live region and [`LogAnnouncer`]
//! writes announcements to the diagnostic log for headless use.

pub mod live_region;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Severity;

pub use live_region::LiveRegion;

/// How urgently assistive technology should read an announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Read when the user is idle.
    Polite,
    /// Interrupts whatever is being read.
    Assertive,
}

impl Priority {
    /// `high` and `critical` interrupt; everything else waits.
    pub fn from_severity(severity: Severity) -> Self {
        if severity.is_urgent() {
            Priority::Assertive
        } else {
            Priority::Polite
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Polite => "polite",
            Priority::Assertive => "assertive",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message pushed to the announcement channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Announcement {
    pub message: String,
    pub priority: Priority,
}

impl Announcement {
    pub fn new(message: impl Into<String>, priority: Priority) -> Self {
        Self {
            message: message.into(),
            priority,
        }
    }
}

/// Sink for assistive-technology announcements.
#[async_trait]
pub trait Announcer: Send + Sync {
    /// Announces `message`; returns once it is visible to assistive technology.
    async fn announce(&self, message: &str, priority: Priority);
}

/// Announcer that writes to the diagnostic log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAnnouncer;

#[async_trait]
impl Announcer for LogAnnouncer {
    async fn announce(&self, message: &str, priority: Priority) {
        match priority {
            Priority::Assertive => tracing::warn!(%priority, "{}", message),
            Priority::Polite => tracing::info!(%priority, "{}", message),
        }
    }
}
