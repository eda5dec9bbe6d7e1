//! Notification texts for each update state change
//!
//! Kept apart from the state machine so transitions can be exercised without
//! a sink and the wording can change without touching transition logic.

use std::time::Duration;

use super::types::Notification;
use crate::cache::optimistic::types::UpdateType;

const PENDING_DURATION: Duration = Duration::from_secs(1);
const SUCCESS_DURATION: Duration = Duration::from_secs(2);
const RETRY_DURATION: Duration = Duration::from_secs(2);
const ROLLBACK_DURATION: Duration = Duration::from_secs(5);

pub fn pending(update_type: UpdateType) -> Notification {
    Notification::new("Updating...", format!("Applying {} locally", update_type))
        .lasting(PENDING_DURATION)
}

pub fn confirmed() -> Notification {
    Notification::new("Success", "Changes saved successfully").lasting(SUCCESS_DURATION)
}

pub fn rolled_back(reason: Option<&str>) -> Notification {
    Notification::new(
        "Update failed",
        reason.unwrap_or("Changes have been reverted"),
    )
    .destructive()
    .lasting(ROLLBACK_DURATION)
}

pub fn retrying(attempt: u32, max_retries: u32) -> Notification {
    Notification::new(
        "Retrying...",
        format!("Attempt {}/{}", attempt, max_retries),
    )
    .lasting(RETRY_DURATION)
}

/// Rollback reason used once retries run out
pub fn exhausted_reason(attempts: u32, error: &str) -> String {
    format!("Failed after {} attempts: {}", attempts, error)
}

/// Persistent prompt asking the user to settle a conflict by hand
pub fn manual_conflict() -> Notification {
    Notification::new(
        "Conflict detected",
        "Your changes conflict with recent updates. Please review and resolve.",
    )
}
