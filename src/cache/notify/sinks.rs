//! Notification sink implementations

use std::sync::Mutex;

use tokio::sync::mpsc;

use super::types::{Notification, NotificationSink, NotificationVariant};

/// Routes notifications through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: Notification) {
        match notification.variant {
            NotificationVariant::Destructive => {
                log::warn!("{}: {}", notification.title, notification.description)
            }
            NotificationVariant::Default => {
                log::info!("{}: {}", notification.title, notification.description)
            }
        }
    }
}

/// Discards every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _notification: Notification) {}
}

/// Keeps every notification in memory, oldest first
#[derive(Debug, Default)]
pub struct RecordingSink {
    received: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything received so far
    pub fn notifications(&self) -> Vec<Notification> {
        self.received
            .lock()
            .map(|received| received.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Drain everything received so far
    pub fn take(&self) -> Vec<Notification> {
        match self.received.lock() {
            Ok(mut received) => std::mem::take(&mut *received),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn len(&self) -> usize {
        self.notifications().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        match self.received.lock() {
            Ok(mut received) => received.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}

/// Forwards notifications into an unbounded tokio channel for an async UI loop
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            log::debug!("Notification receiver dropped, discarding notification");
        }
    }
}
