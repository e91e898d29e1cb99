//! Eviction strategies and the policy-to-strategy selector
//!
//! A strategy is a pure function over the live entry map: it decides which
//! keys to drop and removes them in place. Strategies never fail; empty maps
//! and zero limits are silently left alone.

use crate::cache::entry::CacheEntry;
use crate::settings::{PolicyConfig, PolicyKind};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use tracing::debug;

/// Rule deciding which entries a cleanup pass removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionStrategy {
    /// No removals ever
    Unbounded,

    /// Remove entries strictly older than the limit
    AgeBased { age_limit_minutes: u32 },

    /// Keep at most `count_limit` entries, dropping the oldest first
    CountBased { count_limit: usize },
}

impl EvictionStrategy {
    /// Apply the strategy now. Returns the number of removed entries.
    pub fn evict<K, V>(&self, entries: &mut HashMap<K, CacheEntry<V>>) -> usize
    where
        K: Eq + Hash + Clone,
    {
        self.evict_at(entries, Utc::now())
    }

    /// Apply the strategy as of `now`. Returns the number of removed entries.
    pub fn evict_at<K, V>(&self, entries: &mut HashMap<K, CacheEntry<V>>, now: DateTime<Utc>) -> usize
    where
        K: Eq + Hash + Clone,
    {
        match *self {
            EvictionStrategy::Unbounded => 0,

            EvictionStrategy::AgeBased { .. } => {
                let before = entries.len();
                entries.retain(|_, entry| !self.is_expired(entry, now));
                before - entries.len()
            }

            EvictionStrategy::CountBased { count_limit } => {
                if count_limit == 0 || entries.len() <= count_limit {
                    return 0;
                }

                let excess = entries.len() - count_limit;
                let mut by_age: Vec<_> = entries
                    .iter()
                    .map(|(key, entry)| (entry.recency_key(), key.clone()))
                    .collect();
                by_age.sort_unstable_by(|a, b| a.0.cmp(&b.0));

                for (_, key) in by_age.into_iter().take(excess) {
                    entries.remove(&key);
                }
                excess
            }
        }
    }

    /// Whether a single entry has outlived this strategy's age limit
    ///
    /// Only the age-based strategy expires individual entries.
    pub fn is_expired<V>(&self, entry: &CacheEntry<V>, now: DateTime<Utc>) -> bool {
        match *self {
            EvictionStrategy::AgeBased { age_limit_minutes } if age_limit_minutes > 0 => {
                entry.is_older_than(age_limit_minutes, now)
            }
            _ => false,
        }
    }
}

impl fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionStrategy::Unbounded => write!(f, "unbounded"),
            EvictionStrategy::AgeBased { age_limit_minutes } => {
                write!(f, "age_based({}m)", age_limit_minutes)
            }
            EvictionStrategy::CountBased { count_limit } => {
                write!(f, "count_based({})", count_limit)
            }
        }
    }
}

/// Map the current policy to its strategy
///
/// Called afresh on every cleanup pass. A kind whose limit is missing falls
/// back to [`EvictionStrategy::Unbounded`].
pub fn select_strategy(config: &PolicyConfig) -> EvictionStrategy {
    match (config.kind, config.age_limit_minutes, config.count_limit) {
        (PolicyKind::AgeBased, Some(age_limit_minutes), _) => {
            EvictionStrategy::AgeBased { age_limit_minutes }
        }
        (PolicyKind::CountBased, _, Some(count_limit)) => {
            EvictionStrategy::CountBased { count_limit }
        }
        (PolicyKind::Unbounded, _, _) => EvictionStrategy::Unbounded,
        (kind, _, _) => {
            debug!("Eviction policy {} has no limit configured, not evicting", kind);
            EvictionStrategy::Unbounded
        }
    }
}
