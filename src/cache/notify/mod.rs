//! User-facing notifications for optimistic update state changes

pub mod messages;
pub mod sinks;
pub mod types;

pub use sinks::{ChannelSink, LogSink, NullSink, RecordingSink};
pub use types::{Notification, NotificationSink, NotificationVariant};
