//! Batch I/O statistics tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters maintained by the cache and the batch engine.
///
/// All fields are atomic for lock-free, thread-safe updates.
/// `Ordering::Relaxed` throughout: counters are independent and only
/// need atomicity, not ordering between each other.
#[derive(Debug, Default)]
pub struct BatchStats {
    /// Reads served from the cache.
    pub hits: AtomicU64,

    /// Reads that had to go to the backend.
    pub misses: AtomicU64,

    /// Entries stored after a successful physical read.
    pub insertions: AtomicU64,

    /// Entries evicted because a write intersected them, or by `clear`.
    pub invalidations: AtomicU64,

    /// Entries dropped because their TTL elapsed.
    pub expirations: AtomicU64,

    /// Physical backend calls issued, failed ones included.
    pub physical_calls: AtomicU64,

    /// Times the throttle made a caller wait.
    pub throttle_waits: AtomicU64,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    /// Get a snapshot of current statistics.
    ///
    /// `entries` is supplied by the cache, which owns that number.
    pub fn snapshot(&self, entries: usize) -> CacheStatistics {
        CacheStatistics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            physical_calls: self.physical_calls.load(Ordering::Relaxed),
            throttle_waits: self.throttle_waits.load(Ordering::Relaxed),
            entries,
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.insertions,
            &self.invalidations,
            &self.expirations,
            &self.physical_calls,
            &self.throttle_waits,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// A point-in-time snapshot of batch I/O statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub invalidations: u64,
    pub expirations: u64,
    pub physical_calls: u64,
    pub throttle_waits: u64,
    /// Entries currently held, expired-but-unswept ones included.
    pub entries: usize,
}

impl CacheStatistics {
    /// Cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStatistics {{ entries: {}, hits: {}, misses: {}, invalidations: {}, expirations: {}, calls: {}, hit_rate: {:.2}% }}",
            self.entries,
            self.hits,
            self.misses,
            self.invalidations,
            self.expirations,
            self.physical_calls,
            self.hit_rate() * 100.0
        )
    }
}
