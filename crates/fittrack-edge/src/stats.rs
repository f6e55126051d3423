//! Edge counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Request outcome counters
#[derive(Debug, Default)]
pub struct EdgeStats {
    pub(crate) asset_hits: AtomicU64,
    pub(crate) asset_misses: AtomicU64,
    pub(crate) origin_ok: AtomicU64,
    pub(crate) origin_failures: AtomicU64,
    pub(crate) kv_writes: AtomicU64,
    pub(crate) stale_served: AtomicU64,
    pub(crate) unavailable: AtomicU64,
    pub(crate) not_found: AtomicU64,
    pub(crate) dropped_writes: AtomicU64,
}

impl EdgeStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            asset_hits: self.asset_hits.load(Ordering::Relaxed),
            asset_misses: self.asset_misses.load(Ordering::Relaxed),
            origin_ok: self.origin_ok.load(Ordering::Relaxed),
            origin_failures: self.origin_failures.load(Ordering::Relaxed),
            kv_writes: self.kv_writes.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            dropped_writes: self.dropped_writes.load(Ordering::Relaxed),
        }
    }
}

/// Serializable counter values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct StatsSnapshot {
    pub asset_hits: u64,
    pub asset_misses: u64,
    pub origin_ok: u64,
    pub origin_failures: u64,
    pub kv_writes: u64,
    pub stale_served: u64,
    pub unavailable: u64,
    pub not_found: u64,
    pub dropped_writes: u64,
}
