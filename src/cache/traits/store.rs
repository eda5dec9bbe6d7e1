//! Keyed cache store contract consumed by the optimistic manager

use std::sync::Arc;

use super::key::QueryKey;

/// Keyed cache the optimistic manager reads snapshots from and writes
/// speculative values into.
///
/// Any key-value store with invalidate semantics satisfies the contract.
/// Implementations must not call back into the manager from these methods.
pub trait CacheStore<V>: Send + Sync {
    /// Current value at `key`, if any
    fn get(&self, key: &QueryKey) -> Option<V>;

    /// Overwrite the value at `key`
    fn set(&self, key: &QueryKey, value: V);

    /// Drop the value at `key` and mark it stale so readers refetch it
    fn invalidate(&self, key: &QueryKey);
}

impl<V, T> CacheStore<V> for Arc<T>
where
    T: CacheStore<V> + ?Sized,
{
    fn get(&self, key: &QueryKey) -> Option<V> {
        (**self).get(key)
    }

    fn set(&self, key: &QueryKey, value: V) {
        (**self).set(key, value)
    }

    fn invalidate(&self, key: &QueryKey) {
        (**self).invalidate(key)
    }
}
