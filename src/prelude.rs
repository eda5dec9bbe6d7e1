//! Optimist prelude - convenient imports for users

// Re-export the public API
pub use crate::optimist::{Optimist, OptimistBuilder};

// Error types callers match on
pub use crate::cache::types::{OptimistError, OptimistResult, RecoveryHint};

// Update model and policies
pub use crate::cache::optimistic::{
    BackoffStrategy, ConflictResolution, FailureOutcome, LifetimeStats, OptimisticUpdate,
    ShallowMerge, UpdateId, UpdateStats, UpdateStatus, UpdateType,
};

// Collaborator contracts and stock implementations
pub use crate::cache::config::OptimisticConfig;
pub use crate::cache::notify::{
    ChannelSink, LogSink, Notification, NotificationSink, NotificationVariant, NullSink,
    RecordingSink,
};
pub use crate::cache::store::MemoryStore;
pub use crate::cache::traits::{CacheStore, QueryKey};

// Re-export serde traits that users' value types commonly derive
pub use serde::{Deserialize, Serialize};
