//! Notification payloads and the sink contract

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Visual weight of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationVariant {
    #[default]
    Default,
    /// Error-styled: rollbacks and failures
    Destructive,
}

/// User-facing notification emitted on update state changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: NotificationVariant,
    /// Display time; `None` keeps the notification until dismissed
    pub duration: Option<Duration>,
}

impl Notification {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NotificationVariant::Default,
            duration: None,
        }
    }

    pub fn destructive(mut self) -> Self {
        self.variant = NotificationVariant::Destructive;
        self
    }

    pub fn lasting(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Whether the notification stays until the user dismisses it
    pub fn is_persistent(&self) -> bool {
        self.duration.is_none()
    }
}

/// Fire-and-forget receiver of notifications
///
/// Implementations must not block and must not call back into the manager.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl<T: NotificationSink + ?Sized> NotificationSink for std::sync::Arc<T> {
    fn notify(&self, notification: Notification) {
        (**self).notify(notification)
    }
}
