//! Core types for optimistic update tracking

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::traits::QueryKey;

/// Opaque identifier of one optimistic update, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateId(Uuid);

impl UpdateId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Semantic intent of an optimistic change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    Create,
    Update,
    Delete,
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UpdateType::Create => "create",
            UpdateType::Update => "update",
            UpdateType::Delete => "delete",
        })
    }
}

/// Lifecycle status of an optimistic update
///
/// `Failed` is only ever held for the duration of a failure decision; it
/// resolves to `Pending` (retry) or `RolledBack` before the transition ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    Pending,
    Confirmed,
    Failed,
    RolledBack,
}

impl UpdateStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UpdateStatus::Confirmed | UpdateStatus::RolledBack)
    }
}

/// One in-flight speculative change against a cache slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimisticUpdate<V> {
    pub id: UpdateId,
    pub update_type: UpdateType,
    pub query_key: QueryKey,
    /// Value now visible to readers of the slot
    pub optimistic_data: V,
    /// Slot contents captured right before the optimistic write
    pub original_data: Option<V>,
    /// Milliseconds since the Unix epoch at creation
    pub timestamp_ms: u64,
    /// Creation order among updates of the same manager
    pub sequence: u64,
    pub status: UpdateStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    /// When the caller should re-issue the mutation, set while retrying
    #[serde(skip)]
    pub next_retry_at: Option<tokio::time::Instant>,
}

impl<V> OptimisticUpdate<V> {
    pub(crate) fn new(
        update_type: UpdateType,
        query_key: QueryKey,
        optimistic_data: V,
        original_data: Option<V>,
        sequence: u64,
        max_retries: u32,
    ) -> Self {
        Self {
            id: UpdateId::generate(),
            update_type,
            query_key,
            optimistic_data,
            original_data,
            timestamp_ms: now_ms(),
            sequence,
            status: UpdateStatus::Pending,
            retry_count: 0,
            max_retries,
            next_retry_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == UpdateStatus::Pending
    }
}

/// Outcome of reporting a failed mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Re-issue the mutation after `delay`
    Retrying {
        attempt: u32,
        max_retries: u32,
        delay: Duration,
    },
    /// Retries ran out and the update was rolled back
    RolledBack { attempts: u32 },
    /// Retries ran out but rollback is disabled; the update stays pending
    Exhausted { attempts: u32 },
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
