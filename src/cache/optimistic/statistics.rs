//! Statistics for optimistic updates

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;
use serde::{Deserialize, Serialize};

/// Counts of currently tracked updates partitioned by status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateStats {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub failed: usize,
    pub rolled_back: usize,
}

impl UpdateStats {
    pub(crate) fn from_counts(counts: [usize; 4]) -> Self {
        let [pending, confirmed, failed, rolled_back] = counts;
        Self {
            total: pending + confirmed + failed + rolled_back,
            pending,
            confirmed,
            failed,
            rolled_back,
        }
    }
}

/// Monotonic counters that survive cleanup of individual updates
#[derive(Debug, Default)]
pub struct OptimisticStatistics {
    applied: CachePadded<AtomicU64>,
    confirmed: CachePadded<AtomicU64>,
    rolled_back: CachePadded<AtomicU64>,
    retried: CachePadded<AtomicU64>,
    timed_out: CachePadded<AtomicU64>,
    conflicts_resolved: CachePadded<AtomicU64>,
    peak_tracked: CachePadded<AtomicU64>,
}

/// Point-in-time copy of [`OptimisticStatistics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LifetimeStats {
    pub applied: u64,
    pub confirmed: u64,
    pub rolled_back: u64,
    pub retried: u64,
    pub timed_out: u64,
    pub conflicts_resolved: u64,
    pub peak_tracked: u64,
}

impl LifetimeStats {
    /// Fraction of settled updates that were confirmed (0.0 to 1.0)
    pub fn confirmation_rate(&self) -> f64 {
        let settled = self.confirmed + self.rolled_back;
        if settled == 0 {
            0.0
        } else {
            self.confirmed as f64 / settled as f64
        }
    }
}

impl OptimisticStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_applied(&self, tracked_now: usize) {
        self.applied.fetch_add(1, Ordering::Relaxed);
        self.peak_tracked
            .fetch_max(tracked_now as u64, Ordering::Relaxed);
    }

    pub fn record_confirmed(&self) {
        self.confirmed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rolled_back(&self) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conflict(&self) {
        self.conflicts_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LifetimeStats {
        LifetimeStats {
            applied: self.applied.load(Ordering::Relaxed),
            confirmed: self.confirmed.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            conflicts_resolved: self.conflicts_resolved.load(Ordering::Relaxed),
            peak_tracked: self.peak_tracked.load(Ordering::Relaxed),
        }
    }
}
