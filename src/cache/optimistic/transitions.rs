//! Pure state transitions of an optimistic update
//!
//! Nothing here touches the cache, timers or notifications. Each transition
//! mutates the record and reports what the cache slot must become; the
//! manager applies that effect and emits notifications afterwards.
//!
//! ```text
//!   pending ──confirm──────────────► confirmed
//!      │ ╲──rollback / timeout─────► rolled_back
//!      │
//!   failure (retries left) ──► pending
//!   failure (exhausted)    ──► rolled_back
//! ```

use std::time::Duration;

use super::retry::BackoffStrategy;
use super::types::{OptimisticUpdate, UpdateStatus};

/// What the cache slot must become after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEffect<V> {
    /// Leave the slot as it is
    Keep,
    /// Overwrite the slot
    Set(V),
    /// Drop the slot so it is refetched
    Invalidate,
}

/// Decision taken when a mutation failure is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDecision {
    /// Back to pending; retry after `delay`
    Retry {
        attempt: u32,
        max_retries: u32,
        delay: Duration,
    },
    /// Budget spent; the caller must roll back
    Exhausted { attempts: u32 },
}

/// Mark the update confirmed, reconciling with `server_data` when given.
///
/// Returns `None` if the update already reached a terminal state.
pub fn confirm<V>(update: &mut OptimisticUpdate<V>, server_data: Option<V>) -> Option<CacheEffect<V>> {
    if update.status.is_terminal() {
        return None;
    }
    update.status = UpdateStatus::Confirmed;
    update.next_retry_at = None;
    Some(match server_data {
        Some(data) => CacheEffect::Set(data),
        None => CacheEffect::Keep,
    })
}

/// Mark the update rolled back and restore the pre-update snapshot.
///
/// Without a snapshot the slot is invalidated rather than guessed at.
/// Returns `None` if the update already reached a terminal state.
pub fn rollback<V: Clone>(update: &mut OptimisticUpdate<V>) -> Option<CacheEffect<V>> {
    if update.status.is_terminal() {
        return None;
    }
    update.status = UpdateStatus::RolledBack;
    update.next_retry_at = None;
    Some(match &update.original_data {
        Some(original) => CacheEffect::Set(original.clone()),
        None => CacheEffect::Invalidate,
    })
}

/// Spend one retry from the update's budget.
///
/// Returns `None` if the update already reached a terminal state.
pub fn register_failure<V>(
    update: &mut OptimisticUpdate<V>,
    retry_delay: Duration,
    backoff: BackoffStrategy,
) -> Option<FailureDecision> {
    if update.status.is_terminal() {
        return None;
    }
    update.status = UpdateStatus::Failed;
    update.retry_count = update.retry_count.saturating_add(1);

    if update.retry_count <= update.max_retries {
        update.status = UpdateStatus::Pending;
        let delay = backoff.delay(retry_delay, update.retry_count);
        update.next_retry_at = Some(tokio::time::Instant::now() + delay);
        Some(FailureDecision::Retry {
            attempt: update.retry_count,
            max_retries: update.max_retries,
            delay,
        })
    } else {
        // Left as Failed only until the caller rolls back or, with rollback
        // disabled, parks it as pending again.
        update.next_retry_at = None;
        Some(FailureDecision::Exhausted {
            attempts: update.retry_count,
        })
    }
}
