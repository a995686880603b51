//! Ordered, addressable queue of user-facing notices.

use std::{
    collections::VecDeque,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::{sync::broadcast, time::Instant};
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_NOTIFICATION_DURATION: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub message: String,
    pub severity: Severity,
    pub duration: Duration,
    pub posted_at: Instant,
}

impl Notification {
    pub fn expires_at(&self) -> Instant {
        self.posted_at + self.duration
    }
}

#[derive(Debug, Clone)]
pub enum NotificationEvent {
    Posted(Notification),
    Dismissed(Uuid),
}

/// Where workflow outcomes are sent. Controllers only ever talk to this
/// trait; rendering is up to whoever drains the relay.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: String, severity: Severity, duration: Option<Duration>) -> Uuid;

    fn success(&self, message: String) -> Uuid {
        self.notify(message, Severity::Success, None)
    }

    fn error(&self, message: String) -> Uuid {
        self.notify(message, Severity::Error, None)
    }

    fn warning(&self, message: String) -> Uuid {
        self.notify(message, Severity::Warning, None)
    }

    fn info(&self, message: String) -> Uuid {
        self.notify(message, Severity::Info, None)
    }
}

pub struct NotificationRelay {
    default_duration: Duration,
    queue: Mutex<VecDeque<Notification>>,
    events: broadcast::Sender<NotificationEvent>,
}

impl Default for NotificationRelay {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_DURATION)
    }
}

impl NotificationRelay {
    pub fn new(default_duration: Duration) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            default_duration,
            queue: Mutex::new(VecDeque::new()),
            events,
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Notification>> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.events.subscribe()
    }

    /// Entries in display order.
    pub fn entries(&self) -> Vec<Notification> {
        self.queue().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    pub fn dismiss(&self, id: Uuid) -> bool {
        let removed = {
            let mut queue = self.queue();
            let before = queue.len();
            queue.retain(|entry| entry.id != id);
            queue.len() != before
        };
        if removed {
            let _ = self.events.send(NotificationEvent::Dismissed(id));
        }
        removed
    }

    /// Removes every entry whose duration has elapsed at `now`.
    pub fn expire(&self, now: Instant) -> Vec<Uuid> {
        let expired: Vec<Uuid> = {
            let mut queue = self.queue();
            let expired = queue
                .iter()
                .filter(|entry| entry.expires_at() <= now)
                .map(|entry| entry.id)
                .collect::<Vec<_>>();
            queue.retain(|entry| entry.expires_at() > now);
            expired
        };
        for id in &expired {
            let _ = self.events.send(NotificationEvent::Dismissed(*id));
        }
        expired
    }

    /// Takes every pending entry, oldest first.
    pub fn drain(&self) -> Vec<Notification> {
        self.queue().drain(..).collect()
    }

    /// Expires entries every `tick` until the relay is dropped elsewhere.
    pub async fn run_expiry(self: Arc<Self>, tick: Duration) {
        let mut interval = tokio::time::interval(tick);
        loop {
            interval.tick().await;
            let expired = self.expire(Instant::now());
            if !expired.is_empty() {
                debug!(count = expired.len(), "notifications: expired");
            }
            if Arc::strong_count(&self) == 1 {
                break;
            }
        }
    }
}

impl NotificationSink for NotificationRelay {
    fn notify(&self, message: String, severity: Severity, duration: Option<Duration>) -> Uuid {
        let entry = Notification {
            id: Uuid::new_v4(),
            message,
            severity,
            duration: duration.unwrap_or(self.default_duration),
            posted_at: Instant::now(),
        };
        let id = entry.id;
        debug!(%severity, message = %entry.message, "notifications: posted");
        self.queue().push_back(entry.clone());
        let _ = self.events.send(NotificationEvent::Posted(entry));
        id
    }
}

#[cfg(test)]
#[path = "tests/notifications_tests.rs"]
mod tests;
