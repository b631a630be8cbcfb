//! Debug counters mirroring the original engine's dump routines. Only compiled with the
//! `metrics` feature; a release build that doesn't enable it pays nothing for this module.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of a table's debug counters, read out under the table's lock so the numbers are a
/// consistent instant rather than independently-racing atomics.
#[derive(Clone, Copy, Debug, Default)]
pub struct TableMetrics {
    /// Number of times the dispatcher had to run `EnsureMiniCubeCorners`/`EnsureCorner` to
    /// populate a mini-cube, rather than reusing cached or already-present corners.
    pub populate_call_count: u64,
    pub validate_pass_count: u64,
    pub validate_fail_count: u64,
    pub cache_hit_count: u64,
    pub cache_miss_count: u64,
    /// Advisory only; see §9 Design Notes on the cache "duplicate" counter's semantics.
    pub cache_duplicate_count: u64,
}

/// The live, atomic counters a table updates as `Convert` runs.
#[derive(Default)]
pub(crate) struct MetricsCounters {
    populate_call_count: AtomicU64,
    validate_pass_count: AtomicU64,
    validate_fail_count: AtomicU64,
    cache_hit_count: AtomicU64,
    cache_miss_count: AtomicU64,
}

impl MetricsCounters {
    pub fn record_populate_call(&self) {
        self.populate_call_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validation(&self, linear: bool) {
        if linear {
            self.validate_pass_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.validate_fail_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_cache_hit(&self) {
        self.cache_hit_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_miss_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, cache_duplicate_count: u64) -> TableMetrics {
        TableMetrics {
            populate_call_count: self.populate_call_count.load(Ordering::Relaxed),
            validate_pass_count: self.validate_pass_count.load(Ordering::Relaxed),
            validate_fail_count: self.validate_fail_count.load(Ordering::Relaxed),
            cache_hit_count: self.cache_hit_count.load(Ordering::Relaxed),
            cache_miss_count: self.cache_miss_count.load(Ordering::Relaxed),
            cache_duplicate_count,
        }
    }
}
