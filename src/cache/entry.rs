//! Cache entry with revision tracking

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global write counter; orders entries written within the same clock tick.
static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A cached value together with the time of its last write
///
/// Entries are immutable: every write (insert or overwrite) creates a fresh
/// entry with a new revision time, replacing the previous one.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    value: V,
    revision_time: DateTime<Utc>,
    sequence: u64,
}

impl<V> CacheEntry<V> {
    /// Create a new cache entry revised now
    pub fn new(value: V) -> Self {
        Self::with_revision_time(value, Utc::now())
    }

    /// Create a new cache entry with an explicit revision time
    pub fn with_revision_time(value: V, revision_time: DateTime<Utc>) -> Self {
        Self {
            value,
            revision_time,
            sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// The cached value
    pub fn value(&self) -> &V {
        &self.value
    }

    /// UTC time of the write that produced this entry
    pub fn revision_time(&self) -> DateTime<Utc> {
        self.revision_time
    }

    /// Write order across all entries; later writes have larger numbers
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Whether the entry is strictly older than `limit_minutes` at `now`
    ///
    /// An entry exactly at the limit is not expired.
    pub fn is_older_than(&self, limit_minutes: u32, now: DateTime<Utc>) -> bool {
        now - self.revision_time > chrono::Duration::minutes(i64::from(limit_minutes))
    }

    /// Key used to order entries oldest-first
    pub(crate) fn recency_key(&self) -> (DateTime<Utc>, u64) {
        (self.revision_time, self.sequence)
    }
}
