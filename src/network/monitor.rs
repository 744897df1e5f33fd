//! Event-driven connectivity monitor.
//!
//! The monitor keeps one boolean and a list of subscribers. Platform signals
//! are applied through [`NetworkMonitor::handle_status_change`], either
//! directly or by forwarding a channel of signals with
//! [`NetworkMonitor::watch`]. Nothing is polled.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type Callback = Arc<dyn Fn(bool) + Send + Sync>;

struct Inner {
    online: AtomicBool,
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, Callback)>>,
}

/// Shared connectivity state with change subscribers.
///
/// Cloning is cheap and every clone observes the same state.
///
/// # Example
///
/// ```ignore
/// use recourse::network::NetworkMonitor;
///
/// let monitor = NetworkMonitor::new(true);
/// let subscription = monitor.subscribe(|online| println!("online: {}", online));
///
/// monitor.handle_status_change(false);
/// assert!(!monitor.is_online());
///
/// subscription.unsubscribe();
/// ```
#[derive(Clone)]
pub struct NetworkMonitor {
    inner: Arc<Inner>,
}

impl NetworkMonitor {
    /// Creates a monitor seeded with the platform's current connectivity.
    pub fn new(online: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                online: AtomicBool::new(online),
                next_id: AtomicU64::new(0),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Returns the last connectivity state reported by the platform.
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Registers a callback invoked with the new state on every platform signal.
    ///
    /// Dropping the returned [`Subscription`] keeps the callback registered.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.subscribers.lock().push((id, Arc::new(callback)));
        Subscription {
            id,
            monitor: self.clone(),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Applies a platform connectivity signal.
    ///
    /// Subscribers run synchronously, in subscription order, after the lock
    /// has been released so they may subscribe or unsubscribe themselves.
    pub fn handle_status_change(&self, online: bool) {
        let previous = self.inner.online.swap(online, Ordering::SeqCst);
        if previous != online {
            tracing::info!(online, "connectivity changed");
        }

        let subscribers: Vec<Callback> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in subscribers {
            callback(online);
        }
    }

    /// Forwards platform signals from `signals` until the sender is dropped.
    pub fn watch(&self, mut signals: mpsc::Receiver<bool>) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            while let Some(online) = signals.recv().await {
                monitor.handle_status_change(online);
            }
            tracing::debug!("connectivity signal source closed");
        })
    }

    fn unsubscribe(&self, id: u64) {
        self.inner
            .subscribers
            .lock()
            .retain(|(subscriber, _)| *subscriber != id);
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl std::fmt::Debug for NetworkMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkMonitor")
            .field("online", &self.is_online())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle returned by [`NetworkMonitor::subscribe`].
pub struct Subscription {
    id: u64,
    monitor: NetworkMonitor,
}

impl Subscription {
    /// Removes the callback. Later signals no longer reach it.
    pub fn unsubscribe(self) {
        self.monitor.unsubscribe(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
