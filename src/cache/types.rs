//! Cache statistics

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of cache activity counters
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of cache hits
    pub hits: u64,

    /// Total number of cache misses (including expired reads)
    pub misses: u64,

    /// Entries dropped by a lookup because they had outlived the age limit
    pub expired_on_read: u64,

    /// Entries removed by age-based cleanup passes
    pub evictions_age: u64,

    /// Entries removed by count-based cleanup passes
    pub evictions_count: u64,

    /// Number of explicit clears
    pub clears: u64,

    /// Number of entries currently in cache
    pub entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate total evictions
    pub fn total_evictions(&self) -> u64 {
        self.expired_on_read + self.evictions_age + self.evictions_count
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, entries: {}, evictions: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.entries,
            self.total_evictions()
        )
    }
}

/// Lock-free counters behind [`CacheStats`]
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub expired_on_read: AtomicU64,
    pub evictions_age: AtomicU64,
    pub evictions_count: AtomicU64,
    pub clears: AtomicU64,
}

impl StatsCounters {
    pub fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub fn snapshot(&self, entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired_on_read: self.expired_on_read.load(Ordering::Relaxed),
            evictions_age: self.evictions_age.load(Ordering::Relaxed),
            evictions_count: self.evictions_count.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            entries,
        }
    }
}
