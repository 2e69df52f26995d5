//! User-facing notifications fanned out over a broadcast channel.
//!
//! [`Notifier`] is the toast surface of the client: pollers and actions
//! publish short-lived [`Notification`]s, and any number of views (or
//! the CLI logger) subscribe to them.

use std::time::Duration;

use chrono::Utc;
use flux_core::types::Timestamp;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// How long a toast stays visible unless configured otherwise.
pub const DEFAULT_TTL: Duration = Duration::from_millis(2500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// A transient, auto-expiring message for the user.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    /// How long the view should keep it on screen.
    pub ttl_ms: u64,
    pub issued_at: Timestamp,
}

/// Publishes [`Notification`]s to every current subscriber.
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
    ttl: Duration,
    lifecycle: CancellationToken,
}

impl Notifier {
    /// Create a notifier that goes silent once `lifecycle` is cancelled.
    pub fn new(ttl: Duration, lifecycle: CancellationToken) -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self {
            sender,
            ttl,
            lifecycle,
        }
    }

    /// Subscribe to all notifications published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn info(&self, title: impl Into<String>, message: impl Into<String>) {
        self.publish(NotificationLevel::Info, title, message);
    }

    pub fn success(&self, title: impl Into<String>, message: impl Into<String>) {
        self.publish(NotificationLevel::Success, title, message);
    }

    pub fn error(&self, title: impl Into<String>, message: impl Into<String>) {
        self.publish(NotificationLevel::Error, title, message);
    }

    /// Publish a notification. Dropped silently when nobody listens or
    /// the session has been torn down.
    pub fn publish(
        &self,
        level: NotificationLevel,
        title: impl Into<String>,
        message: impl Into<String>,
    ) {
        if self.lifecycle.is_cancelled() {
            return;
        }

        let notification = Notification {
            id: Uuid::new_v4(),
            level,
            title: title.into(),
            message: message.into(),
            ttl_ms: self.ttl.as_millis() as u64,
            issued_at: Utc::now(),
        };

        tracing::debug!(?level, title = %notification.title, "Notification published");
        // Ignore the SendError, it only means there are zero receivers.
        let _ = self.sender.send(notification);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, CancellationToken::new())
    }
}
