//! Optimistic update tracking: state machine, registry, timers and policies
//!
//! The public entry point is [`crate::Optimist`]; this module holds the
//! pieces it is assembled from.

pub mod conflict;
pub mod registry;
pub mod retry;
pub mod statistics;
pub mod timer;
pub mod transitions;
pub mod types;

#[cfg(test)]
mod tests;

pub use conflict::{ConflictResolution, Resolver, ShallowMerge};
pub use retry::BackoffStrategy;
pub use statistics::{LifetimeStats, UpdateStats};
pub use types::{FailureOutcome, OptimisticUpdate, UpdateId, UpdateStatus, UpdateType};
