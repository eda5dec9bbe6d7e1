//! Tracked set of optimistic updates and their timers

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::one::RefMut;

use super::timer::TimerHandle;
use super::types::{OptimisticUpdate, UpdateId, UpdateStatus};
use crate::cache::traits::QueryKey;

/// One tracked update plus the timers armed for it
#[derive(Debug)]
pub struct TrackedUpdate<V> {
    pub update: OptimisticUpdate<V>,
    /// Rollback safety net while pending
    pub timeout: Option<TimerHandle>,
    /// Deferred removal once terminal
    pub cleanup: Option<TimerHandle>,
}

impl<V> TrackedUpdate<V> {
    pub fn new(update: OptimisticUpdate<V>) -> Self {
        Self {
            update,
            timeout: None,
            cleanup: None,
        }
    }

    pub fn cancel_timeout(&mut self) {
        if let Some(timer) = self.timeout.take() {
            timer.cancel();
        }
    }
}

/// Concurrent map of tracked updates keyed by id
///
/// Each entry is locked independently, so transitions of one update are
/// atomic with respect to every other transition of that same update.
#[derive(Debug)]
pub struct UpdateRegistry<V> {
    tracked: DashMap<UpdateId, TrackedUpdate<V>>,
    sequence_counter: AtomicU64,
}

impl<V> Default for UpdateRegistry<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> UpdateRegistry<V> {
    pub fn new() -> Self {
        Self {
            tracked: DashMap::new(),
            sequence_counter: AtomicU64::new(0),
        }
    }

    /// Next creation sequence number
    pub fn next_sequence(&self) -> u64 {
        self.sequence_counter.fetch_add(1, Ordering::AcqRel)
    }

    pub fn insert(&self, tracked: TrackedUpdate<V>) {
        self.tracked.insert(tracked.update.id, tracked);
    }

    /// Exclusive access to one entry; do not hold across calls into the registry
    pub fn get_mut(&self, id: &UpdateId) -> Option<RefMut<'_, UpdateId, TrackedUpdate<V>>> {
        self.tracked.get_mut(id)
    }

    /// Remove the entry only if it is still terminal; its timers are dropped with it
    pub fn remove_if_terminal(&self, id: &UpdateId) -> bool {
        self.tracked
            .remove_if(id, |_, tracked| tracked.update.status.is_terminal())
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Drop every entry, aborting all armed timers
    pub fn clear(&self) -> usize {
        let count = self.tracked.len();
        self.tracked.clear();
        count
    }

    /// Status counts over the tracked set
    pub fn count_by_status(&self) -> [usize; 4] {
        let mut counts = [0usize; 4];
        for entry in self.tracked.iter() {
            let slot = match entry.update.status {
                UpdateStatus::Pending => 0,
                UpdateStatus::Confirmed => 1,
                UpdateStatus::Failed => 2,
                UpdateStatus::RolledBack => 3,
            };
            counts[slot] += 1;
        }
        counts
    }
}

impl<V: Clone> UpdateRegistry<V> {
    /// Snapshot of one record
    pub fn snapshot(&self, id: &UpdateId) -> Option<OptimisticUpdate<V>> {
        self.tracked.get(id).map(|entry| entry.update.clone())
    }

    /// Snapshots of every record addressing `key`, in creation order
    pub fn for_key(&self, key: &QueryKey) -> Vec<OptimisticUpdate<V>> {
        let mut updates: Vec<_> = self
            .tracked
            .iter()
            .filter(|entry| &entry.update.query_key == key)
            .map(|entry| entry.update.clone())
            .collect();
        updates.sort_by_key(|update| update.sequence);
        updates
    }
}
