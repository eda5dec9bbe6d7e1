//! Configuration for optimistic update behaviour

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::optimistic::retry::BackoffStrategy;
use crate::cache::types::{OptimistError, OptimistResult};

/// Configuration for optimistic update behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimisticConfig {
    /// Arm a timeout per update and allow rollbacks at all
    pub enable_rollback: bool,
    /// Time a pending update may stay unresolved before it is rolled back
    pub rollback_timeout_ms: u64,
    /// Retries allowed per update before it is rolled back
    pub max_retries: u32,
    /// Base retry delay fed to the backoff strategy
    pub retry_delay_ms: u64,
    pub backoff: BackoffStrategy,
    /// Time terminal updates stay readable before removal
    pub cleanup_delay_ms: u64,
    /// Emit an "updating" notification on apply
    pub notify_pending: bool,
    /// Emit a success notification on confirm
    pub notify_success: bool,
}

impl Default for OptimisticConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimisticConfig {
    pub fn new() -> Self {
        Self {
            enable_rollback: true,
            rollback_timeout_ms: 10_000,
            max_retries: 3,
            retry_delay_ms: 1_000,
            backoff: BackoffStrategy::Linear,
            cleanup_delay_ms: 5_000,
            notify_pending: false,
            notify_success: true,
        }
    }

    /// Interactive edits: short timeout, visible progress
    pub fn interactive() -> Self {
        Self {
            rollback_timeout_ms: 10_000,
            notify_pending: true,
            ..Self::new()
        }
    }

    /// Background saves: longer timeout, quiet on success
    pub fn background() -> Self {
        Self {
            rollback_timeout_ms: 15_000,
            retry_delay_ms: 2_000,
            notify_success: false,
            ..Self::new()
        }
    }

    pub fn rollback_timeout(&self) -> Duration {
        Duration::from_millis(self.rollback_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }

    /// Reject settings that would make the safety net meaningless
    pub fn validate(&self) -> OptimistResult<()> {
        if self.enable_rollback && self.rollback_timeout_ms == 0 {
            return Err(OptimistError::invalid_configuration(
                "rollback_timeout_ms must be positive when rollback is enabled",
            ));
        }
        if self.cleanup_delay_ms == 0 {
            return Err(OptimistError::invalid_configuration(
                "cleanup_delay_ms must be positive so settled updates stay readable",
            ));
        }
        let worst_case_backoff = self
            .backoff
            .delay(self.retry_delay(), self.max_retries.max(1));
        if self.enable_rollback && worst_case_backoff >= self.rollback_timeout() {
            log::warn!(
                "Last retry delay {:?} reaches the rollback timeout {:?}; late retries will be cut off",
                worst_case_backoff,
                self.rollback_timeout()
            );
        }
        Ok(())
    }
}
