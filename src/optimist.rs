//! Public API of the optimistic mutation manager
//!
//! An [`Optimist`] writes a speculative value into a keyed cache right away,
//! tracks it as pending, and later settles it by confirmation, rollback,
//! bounded retries or conflict resolution. A per-update timeout rolls back
//! anything the caller never settles, so the cache cannot stay in a
//! speculative state longer than the configured timeout.
//!
//! Updates against the same query key are not serialized: each is tracked
//! independently and whichever settles last decides what the slot holds.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::cache::config::OptimisticConfig;
use crate::cache::notify::{LogSink, NotificationSink, messages};
use crate::cache::optimistic::conflict::{self, ConflictResolution, ShallowMerge};
use crate::cache::optimistic::registry::{TrackedUpdate, UpdateRegistry};
use crate::cache::optimistic::retry::BackoffStrategy;
use crate::cache::optimistic::statistics::{LifetimeStats, OptimisticStatistics, UpdateStats};
use crate::cache::optimistic::timer::TimerHandle;
use crate::cache::optimistic::transitions::{self, CacheEffect, FailureDecision};
use crate::cache::optimistic::types::{
    FailureOutcome, OptimisticUpdate, UpdateId, UpdateStatus, UpdateType,
};
use crate::cache::store::MemoryStore;
use crate::cache::traits::{CacheStore, QueryKey};
use crate::cache::types::{OptimistError, OptimistResult};

const TIMEOUT_REASON: &str = "Update timed out";

struct Shared<V> {
    store: Arc<dyn CacheStore<V>>,
    notifier: Arc<dyn NotificationSink>,
    config: OptimisticConfig,
    registry: UpdateRegistry<V>,
    stats: OptimisticStatistics,
    /// Runtime the timers are spawned on, whatever thread the caller is on
    runtime: Option<Handle>,
}

/// Optimistic mutation manager over a keyed cache
///
/// Cheap to clone; clones share the same tracked set, store and timers.
/// Timers run on the tokio runtime captured when the manager is built (or
/// set with [`OptimistBuilder::runtime`]), so updates may be applied from
/// any thread. Built outside a runtime and without a handle, timers fall
/// back to the caller's runtime; with none at all, updates simply have no
/// timeout and are never garbage-collected until
/// [`Optimist::clear_all_updates`].
pub struct Optimist<V>
where
    V: Clone + Send + Sync + 'static,
{
    shared: Arc<Shared<V>>,
}

impl<V> Clone for Optimist<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<V> fmt::Debug for Optimist<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Optimist")
            .field("tracked", &self.shared.registry.len())
            .field("config", &self.shared.config)
            .finish()
    }
}

impl<V> Optimist<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create new manager builder with fluent configuration
    pub fn builder() -> OptimistBuilder<V> {
        OptimistBuilder::new()
    }

    pub fn config(&self) -> &OptimisticConfig {
        &self.shared.config
    }

    /// Current value of a cache slot, read through the injected store
    pub fn read(&self, query_key: &QueryKey) -> Option<V> {
        self.shared.store.get(query_key)
    }

    // ========== Lifecycle ==========

    /// Apply `update_fn` to the slot at `query_key` and track the change.
    ///
    /// The pre-update value is captured before the write so a rollback
    /// restores exactly that snapshot. Never fails.
    pub fn apply_optimistic_update<F>(
        &self,
        query_key: impl Into<QueryKey>,
        update_fn: F,
        update_type: UpdateType,
    ) -> UpdateId
    where
        F: FnOnce(Option<&V>) -> V,
    {
        let query_key = query_key.into();
        let original_data = self.shared.store.get(&query_key);
        let optimistic_data = update_fn(original_data.as_ref());

        let update = OptimisticUpdate::new(
            update_type,
            query_key.clone(),
            optimistic_data.clone(),
            original_data,
            self.shared.registry.next_sequence(),
            self.shared.config.max_retries,
        );
        let id = update.id;

        self.shared.store.set(&query_key, optimistic_data);
        self.shared.registry.insert(TrackedUpdate::new(update));

        if self.shared.config.enable_rollback {
            // Armed under the entry lock so the timer cannot act before it is attached.
            if let Some(mut entry) = self.shared.registry.get_mut(&id) {
                entry.timeout = self.arm_timeout(id);
            }
        }

        self.shared.stats.record_applied(self.shared.registry.len());
        log::debug!("Applied optimistic {} {} on {}", update_type, id, query_key);

        if self.shared.config.notify_pending {
            self.shared.notifier.notify(messages::pending(update_type));
        }
        id
    }

    /// Settle the update as confirmed, reconciling with `server_data` if given.
    ///
    /// Returns `false` (and changes nothing) for unknown or already settled ids.
    pub fn confirm_update(&self, id: UpdateId, server_data: Option<V>) -> bool {
        {
            let Some(mut entry) = self.shared.registry.get_mut(&id) else {
                log::debug!("Confirm for unknown update {} ignored", id);
                return false;
            };
            let Some(effect) = transitions::confirm(&mut entry.update, server_data) else {
                log::debug!("Confirm for settled update {} ignored", id);
                return false;
            };
            entry.cancel_timeout();
            self.apply_effect(&entry.update.query_key, effect);
            entry.cleanup = self.arm_cleanup(id);
        }

        self.shared.stats.record_confirmed();
        log::debug!("Confirmed optimistic update {}", id);
        if self.shared.config.notify_success {
            self.shared.notifier.notify(messages::confirmed());
        }
        true
    }

    /// Revert the update to its pre-update snapshot, or invalidate the slot
    /// when there was none.
    ///
    /// Returns `false` when rollback is disabled or the id is unknown or settled.
    pub fn rollback_update(&self, id: UpdateId, reason: Option<&str>) -> bool {
        if !self.shared.config.enable_rollback {
            log::debug!("Rollback of {} skipped, rollback disabled", id);
            return false;
        }
        let rolled_back = match self.shared.registry.get_mut(&id) {
            Some(mut entry) => self.rollback_locked(&mut entry),
            None => false,
        };
        if rolled_back {
            self.after_rollback(id, reason);
        } else {
            log::debug!("Rollback for unknown or settled update {} ignored", id);
        }
        rolled_back
    }

    /// Report that the real mutation behind `id` failed.
    ///
    /// Spends one retry and tells the caller when to re-issue the mutation;
    /// once the budget is gone the update is rolled back. Returns `None` for
    /// unknown or settled ids.
    pub fn handle_update_failure<E>(&self, id: UpdateId, error: &E) -> Option<FailureOutcome>
    where
        E: fmt::Display + ?Sized,
    {
        let config = &self.shared.config;
        let (decision, rolled_back) = {
            let mut entry = self.shared.registry.get_mut(&id)?;
            let decision =
                transitions::register_failure(&mut entry.update, config.retry_delay(), config.backoff)?;
            let rolled_back = match decision {
                FailureDecision::Exhausted { .. } if config.enable_rollback => {
                    self.rollback_locked(&mut entry)
                }
                FailureDecision::Exhausted { .. } => {
                    entry.update.status = UpdateStatus::Pending;
                    false
                }
                FailureDecision::Retry { .. } => false,
            };
            (decision, rolled_back)
        };

        match decision {
            FailureDecision::Retry {
                attempt,
                max_retries,
                delay,
            } => {
                self.shared.stats.record_retry();
                log::info!(
                    "Optimistic update {} failed ({}), retry {}/{} in {:?}",
                    id,
                    error,
                    attempt,
                    max_retries,
                    delay
                );
                self.shared
                    .notifier
                    .notify(messages::retrying(attempt, max_retries));
                Some(FailureOutcome::Retrying {
                    attempt,
                    max_retries,
                    delay,
                })
            }
            FailureDecision::Exhausted { attempts } if rolled_back => {
                let reason = messages::exhausted_reason(attempts, &error.to_string());
                self.after_rollback(id, Some(&reason));
                Some(FailureOutcome::RolledBack { attempts })
            }
            FailureDecision::Exhausted { attempts } => {
                log::warn!(
                    "Optimistic update {} exhausted {} attempts with rollback disabled: {}",
                    id,
                    attempts,
                    error
                );
                Some(FailureOutcome::Exhausted { attempts })
            }
        }
    }

    /// Compute the value reconciling the update's optimistic data with
    /// `server_data`. Does not write the cache or change the update; feed the
    /// result into [`Optimist::confirm_update`].
    ///
    /// Unknown ids yield `server_data` unchanged.
    pub fn resolve_conflict(
        &self,
        id: UpdateId,
        server_data: V,
        resolution: ConflictResolution<V>,
    ) -> V
    where
        V: ShallowMerge,
    {
        let Some(update) = self.shared.registry.snapshot(&id) else {
            log::debug!("Conflict for unknown update {}, server data stands", id);
            return server_data;
        };

        log::debug!(
            "Resolving conflict on {} with {}",
            id,
            resolution.strategy_name()
        );
        if matches!(resolution, ConflictResolution::Manual) {
            self.shared.notifier.notify(messages::manual_conflict());
        }
        self.shared.stats.record_conflict();
        conflict::resolve(&update.optimistic_data, server_data, resolution)
    }

    /// Timer callback: roll back an update nobody settled in time
    pub(crate) fn handle_update_timeout(&self, id: UpdateId) {
        if self.rollback_update(id, Some(TIMEOUT_REASON)) {
            self.shared.stats.record_timeout();
            log::warn!("Optimistic update {} timed out and was rolled back", id);
        }
    }

    /// Apply optimistically, run `mutation`, and settle the update from its result.
    ///
    /// `mutation` is re-invoked after each backoff delay until it succeeds or
    /// the retry budget is spent. Success confirms with the returned server
    /// data, if any.
    pub async fn mutate<U, F, Fut, E>(
        &self,
        query_key: impl Into<QueryKey>,
        update_fn: U,
        update_type: UpdateType,
        mut mutation: F,
    ) -> OptimistResult<UpdateId>
    where
        U: FnOnce(Option<&V>) -> V,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<V>, E>>,
        E: fmt::Display,
    {
        let id = self.apply_optimistic_update(query_key, update_fn, update_type);

        loop {
            match mutation().await {
                Ok(server_data) => {
                    return if self.confirm_update(id, server_data) {
                        Ok(id)
                    } else {
                        Err(OptimistError::UpdateNotPending(id))
                    };
                }
                Err(error) => match self.handle_update_failure(id, &error) {
                    Some(FailureOutcome::Retrying { delay, .. }) => {
                        tokio::time::sleep(delay).await;
                        if !self.is_pending(id) {
                            return Err(OptimistError::UpdateNotPending(id));
                        }
                    }
                    Some(FailureOutcome::RolledBack { attempts }) => {
                        return Err(OptimistError::MutationFailed {
                            id,
                            attempts,
                            message: error.to_string(),
                        });
                    }
                    Some(FailureOutcome::Exhausted { attempts }) => {
                        return Err(OptimistError::RetriesExhausted { id, attempts });
                    }
                    None => return Err(OptimistError::UpdateNotPending(id)),
                },
            }
        }
    }

    // ========== Queries ==========

    /// Tracked updates addressing `query_key`, oldest first
    ///
    /// Includes settled updates until they are cleaned up, so late readers
    /// can still see how they ended.
    pub fn get_pending_updates(&self, query_key: &QueryKey) -> Vec<OptimisticUpdate<V>> {
        self.shared.registry.for_key(query_key)
    }

    pub fn has_pending_updates(&self, query_key: &QueryKey) -> bool {
        !self.get_pending_updates(query_key).is_empty()
    }

    /// Snapshot of one tracked update
    pub fn get_update(&self, id: UpdateId) -> Option<OptimisticUpdate<V>> {
        self.shared.registry.snapshot(&id)
    }

    pub fn is_pending(&self, id: UpdateId) -> bool {
        self.get_update(id).is_some_and(|update| update.is_pending())
    }

    /// Counts of tracked updates by status
    pub fn get_update_stats(&self) -> UpdateStats {
        UpdateStats::from_counts(self.shared.registry.count_by_status())
    }

    /// Counters accumulated since the manager was built
    pub fn lifetime_stats(&self) -> LifetimeStats {
        self.shared.stats.snapshot()
    }

    /// Cancel every timer and forget every tracked update
    pub fn clear_all_updates(&self) {
        let cleared = self.shared.registry.clear();
        log::debug!("Cleared {} tracked optimistic updates", cleared);
    }

    // ========== Internals ==========

    /// Roll back while the caller holds the entry lock
    fn rollback_locked(&self, entry: &mut TrackedUpdate<V>) -> bool {
        let Some(effect) = transitions::rollback(&mut entry.update) else {
            return false;
        };
        entry.cancel_timeout();
        self.apply_effect(&entry.update.query_key, effect);
        entry.cleanup = self.arm_cleanup(entry.update.id);
        true
    }

    /// Side effects of a rollback, run once the entry lock is released
    fn after_rollback(&self, id: UpdateId, reason: Option<&str>) {
        self.shared.stats.record_rolled_back();
        log::info!(
            "Rolled back optimistic update {}: {}",
            id,
            reason.unwrap_or("no reason given")
        );
        self.shared.notifier.notify(messages::rolled_back(reason));
    }

    fn apply_effect(&self, query_key: &QueryKey, effect: CacheEffect<V>) {
        match effect {
            CacheEffect::Keep => {}
            CacheEffect::Set(value) => self.shared.store.set(query_key, value),
            CacheEffect::Invalidate => self.shared.store.invalidate(query_key),
        }
    }

    fn arm_timeout(&self, id: UpdateId) -> Option<TimerHandle> {
        let weak = Arc::downgrade(&self.shared);
        TimerHandle::schedule(
            self.shared.runtime.as_ref(),
            self.shared.config.rollback_timeout(),
            async move {
                if let Some(shared) = weak.upgrade() {
                    Optimist { shared }.handle_update_timeout(id);
                }
            },
        )
    }

    fn arm_cleanup(&self, id: UpdateId) -> Option<TimerHandle> {
        let weak = Arc::downgrade(&self.shared);
        TimerHandle::schedule(
            self.shared.runtime.as_ref(),
            self.shared.config.cleanup_delay(),
            async move {
                if let Some(shared) = weak.upgrade()
                    && shared.registry.remove_if_terminal(&id)
                {
                    log::trace!("Cleaned up settled optimistic update {}", id);
                }
            },
        )
    }
}

/// Builder for [`Optimist`]
pub struct OptimistBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    store: Option<Arc<dyn CacheStore<V>>>,
    notifier: Option<Arc<dyn NotificationSink>>,
    config: OptimisticConfig,
    runtime: Option<Handle>,
}

impl<V> OptimistBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            store: None,
            notifier: None,
            config: OptimisticConfig::default(),
            runtime: None,
        }
    }

    /// Cache the manager writes into (default: a fresh [`MemoryStore`])
    pub fn store(mut self, store: impl CacheStore<V> + 'static) -> Self {
        let store: Arc<dyn CacheStore<V>> = Arc::new(store);
        self.store = Some(store);
        self
    }

    /// Sink receiving user-facing notifications (default: [`LogSink`])
    pub fn notifier(mut self, notifier: impl NotificationSink + 'static) -> Self {
        let notifier: Arc<dyn NotificationSink> = Arc::new(notifier);
        self.notifier = Some(notifier);
        self
    }

    /// Runtime timers are spawned on (default: the runtime `build` runs in)
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: OptimisticConfig) -> Self {
        self.config = config;
        self
    }

    pub fn enable_rollback(mut self, enabled: bool) -> Self {
        self.config.enable_rollback = enabled;
        self
    }

    pub fn rollback_timeout(mut self, timeout: Duration) -> Self {
        self.config.rollback_timeout_ms = saturating_millis(timeout);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay_ms = saturating_millis(delay);
        self
    }

    pub fn backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.config.backoff = backoff;
        self
    }

    pub fn cleanup_delay(mut self, delay: Duration) -> Self {
        self.config.cleanup_delay_ms = saturating_millis(delay);
        self
    }

    pub fn notify_pending(mut self, enabled: bool) -> Self {
        self.config.notify_pending = enabled;
        self
    }

    pub fn notify_success(mut self, enabled: bool) -> Self {
        self.config.notify_success = enabled;
        self
    }

    /// Validate the configuration and build the manager
    pub fn build(self) -> OptimistResult<Optimist<V>> {
        self.config.validate()?;

        let store: Arc<dyn CacheStore<V>> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryStore::<V>::new()),
        };
        let runtime = self.runtime.or_else(|| Handle::try_current().ok());
        if runtime.is_none() {
            log::debug!("Optimist built outside a tokio runtime, timers use the caller's runtime");
        }
        let notifier: Arc<dyn NotificationSink> = match self.notifier {
            Some(notifier) => notifier,
            None => Arc::new(LogSink),
        };

        Ok(Optimist {
            shared: Arc::new(Shared {
                store,
                notifier,
                config: self.config,
                registry: UpdateRegistry::new(),
                stats: OptimisticStatistics::new(),
                runtime,
            }),
        })
    }
}

impl<V> Default for OptimistBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
