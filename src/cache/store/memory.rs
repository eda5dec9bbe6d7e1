//! In-process keyed cache backed by a concurrent hash map

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::{DashMap, DashSet};

use crate::cache::traits::{CacheStore, QueryKey};

/// Concurrent in-memory [`CacheStore`]
///
/// Invalidating a slot drops its value and marks it stale until the next
/// `set`, which is what a query cache does before refetching.
#[derive(Debug)]
pub struct MemoryStore<V> {
    entries: DashMap<QueryKey, V>,
    stale: DashSet<QueryKey>,
    invalidations: AtomicU64,
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            stale: DashSet::new(),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Check whether a value is present at `key`
    pub fn contains_key(&self, key: &QueryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Check whether `key` was invalidated and not written since
    pub fn is_invalidated(&self, key: &QueryKey) -> bool {
        self.stale.contains(key)
    }

    /// Total invalidations performed on this store
    pub fn invalidation_count(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every value and stale marker
    pub fn clear(&self) {
        self.entries.clear();
        self.stale.clear();
    }
}

impl<V: Clone + Send + Sync> CacheStore<V> for MemoryStore<V> {
    fn get(&self, key: &QueryKey) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &QueryKey, value: V) {
        self.stale.remove(key);
        self.entries.insert(key.clone(), value);
    }

    fn invalidate(&self, key: &QueryKey) {
        self.entries.remove(key);
        self.stale.insert(key.clone());
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        log::trace!("Invalidated cache slot {}", key);
    }
}
