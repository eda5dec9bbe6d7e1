//! Optimist - optimistic mutations over a keyed query cache
//!
//! Writes a speculative value into the cache the moment a user acts, tracks
//! it until the server answers, and settles it by confirmation, rollback or
//! conflict resolution. A timeout rolls back anything left unsettled.
//!
//! # Features
//!
//! - **Snapshot rollback**: the pre-update value is captured and restored exactly
//! - **Bounded retries**: linear, exponential or Fibonacci backoff between attempts
//! - **Conflict strategies**: server wins, client wins, merge, or manual review
//! - **Timeout safety net**: unsettled updates roll back after a configurable delay
//! - **Pluggable collaborators**: bring your own cache store and notification sink
//!
//! # Example
//!
//! ```no_run
//! use optimist::prelude::*;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let optimist: Optimist<u32> = Optimist::builder().max_retries(2).build()?;
//! let id = optimist.apply_optimistic_update(["likes", "42"], |n| n.copied().unwrap_or(0) + 1, UpdateType::Update);
//! optimist.confirm_update(id, None);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod optimist;
pub mod prelude;

pub use cache::config::OptimisticConfig;
pub use cache::notify::{Notification, NotificationSink, NotificationVariant};
pub use cache::optimistic::{
    ConflictResolution, FailureOutcome, OptimisticUpdate, UpdateId, UpdateStatus, UpdateType,
};
pub use cache::store::MemoryStore;
pub use cache::traits::{CacheStore, QueryKey};
pub use cache::types::{OptimistError, OptimistResult};
pub use optimist::{Optimist, OptimistBuilder};
