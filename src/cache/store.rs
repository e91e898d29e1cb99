//! Main cache store with policy-driven eviction and live reconfiguration

use crate::cache::{
    config::CacheConfig,
    entry::CacheEntry,
    eviction::{select_strategy, EvictionStrategy},
    types::{CacheStats, StatsCounters},
};
use crate::error::{RateCacheError, Result};
use crate::settings::{CacheSettings, SettingField};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockWriteGuard, Weak};
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Thread-safe cache whose eviction policy follows live settings
///
/// This implementation provides:
/// - One `RwLock` over the whole entry map; lookups share it, writes and
///   cleanup passes take it exclusively so strategies see a consistent snapshot
/// - Age- or count-based eviction, re-selected from the settings on every pass
/// - A background watcher that runs a cleanup pass whenever a policy field
///   changes, without waiting for the next read or write
///
/// Nothing inside the cache awaits; producers run outside its critical
/// sections.
pub struct PolicyCache<K, V> {
    shared: Arc<Shared<K, V>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

/// State shared with the settings watcher
struct Shared<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    settings: Arc<CacheSettings>,
    stats: StatsCounters,
    enable_metrics: bool,
}

impl<K, V> PolicyCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache driven by `settings`
    ///
    /// Must be called from within a tokio runtime, which hosts the settings
    /// watcher.
    pub fn new(settings: Arc<CacheSettings>) -> Result<Self> {
        Self::build(settings, true)
    }

    /// Create a cache and its settings provider from `config`
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Self::build(config.build_settings()?, config.enable_metrics)
    }

    fn build(settings: Arc<CacheSettings>, enable_metrics: bool) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            RateCacheError::Runtime(format!("cache settings watcher needs a tokio runtime: {}", e))
        })?;

        info!("Initializing policy cache with policy: {:?}", settings.current());

        // Subscribe before spawning so no change after construction is missed
        let changes = settings.subscribe();
        let shared = Arc::new(Shared {
            entries: RwLock::new(HashMap::new()),
            settings,
            stats: StatsCounters::default(),
            enable_metrics,
        });

        let watcher = runtime.spawn(watch_settings(Arc::downgrade(&shared), changes));

        Ok(Self {
            shared,
            watcher: Mutex::new(Some(watcher)),
        })
    }

    /// Look up a value
    ///
    /// Under the age-based policy an entry older than the limit is removed
    /// and reported as a miss.
    pub fn try_get(&self, key: &K) -> Option<V> {
        self.try_get_at(key, Utc::now())
    }

    fn try_get_at(&self, key: &K, now: DateTime<Utc>) -> Option<V> {
        let shared = &self.shared;
        let strategy = select_strategy(&shared.settings.current());

        let expired_sequence = {
            let entries = shared.entries.read().unwrap_or_else(PoisonError::into_inner);

            match entries.get(key) {
                None => {
                    debug!("Cache miss: {:?}", key);
                    shared.count(&shared.stats.misses, 1);
                    return None;
                }
                Some(entry) if !strategy.is_expired(entry, now) => {
                    debug!("Cache hit: {:?}", key);
                    shared.count(&shared.stats.hits, 1);
                    return Some(entry.value().clone());
                }
                Some(entry) => entry.sequence(),
            }
        };

        // Only drop the write we saw expire; a concurrent put may have replaced it
        let mut entries = shared.write_entries();
        if entries
            .get(key)
            .is_some_and(|entry| entry.sequence() == expired_sequence)
        {
            entries.remove(key);
            shared.count(&shared.stats.expired_on_read, 1);
            debug!("Cache entry expired: {:?}", key);
        }
        shared.count(&shared.stats.misses, 1);

        None
    }

    /// Insert or overwrite a value, then run a cleanup pass
    pub fn put(&self, key: K, value: V) {
        self.put_entry(key, CacheEntry::new(value));
    }

    fn put_entry(&self, key: K, entry: CacheEntry<V>) {
        let mut entries = self.shared.write_entries();

        if entries.insert(key.clone(), entry).is_some() {
            debug!("Updating existing cache entry: {:?}", key);
        } else {
            debug!("Inserting new cache entry: {:?}", key);
        }

        self.shared.cleanup_locked(&mut entries);
    }

    /// Remove all entries
    pub fn clear(&self) {
        let mut entries = self.shared.write_entries();

        let count = entries.len();
        entries.clear();
        self.shared.count(&self.shared.stats.clears, 1);

        info!("Cleared {} entries from cache", count);
    }

    /// Apply the currently configured policy. Returns the number of removed entries.
    pub fn cleanup(&self) -> usize {
        self.shared.cleanup()
    }

    /// Stop reacting to settings changes
    ///
    /// Safe to call more than once; also runs on drop.
    pub fn dispose(&self) {
        let handle = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            handle.abort();
            info!("Policy cache disposed");
        }
    }

    /// Whether the settings watcher is still attached
    pub fn is_watching(&self) -> bool {
        self.watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Check if a key is present (ignores expiry, no side effects)
    pub fn contains_key(&self, key: &K) -> bool {
        self.shared.with_entries(|entries| entries.contains_key(key))
    }

    /// Get number of entries in cache
    pub fn len(&self) -> usize {
        self.shared.with_entries(|entries| entries.len())
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.shared.stats.snapshot(self.len())
    }

    /// The settings this cache follows
    pub fn settings(&self) -> &Arc<CacheSettings> {
        &self.shared.settings
    }
}

impl<K, V> Drop for PolicyCache<K, V> {
    fn drop(&mut self) {
        let handle = self
            .watcher
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl<K, V> fmt::Debug for PolicyCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyCache")
            .field("settings", &self.shared.settings)
            .field("enable_metrics", &self.shared.enable_metrics)
            .finish_non_exhaustive()
    }
}

impl<K, V> Shared<K, V>
where
    K: Eq + Hash + Clone,
{
    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_entries<T>(&self, f: impl FnOnce(&HashMap<K, CacheEntry<V>>) -> T) -> T {
        f(&self.entries.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn count(&self, counter: &AtomicU64, by: u64) {
        if self.enable_metrics && by > 0 {
            StatsCounters::bump(counter, by);
        }
    }

    fn cleanup(&self) -> usize {
        let mut entries = self.write_entries();
        self.cleanup_locked(&mut entries)
    }

    /// Cleanup pass; the caller holds the write lock
    fn cleanup_locked(&self, entries: &mut HashMap<K, CacheEntry<V>>) -> usize {
        let strategy = select_strategy(&self.settings.current());
        let removed = strategy.evict(entries);

        match strategy {
            EvictionStrategy::AgeBased { .. } => self.count(&self.stats.evictions_age, removed as u64),
            EvictionStrategy::CountBased { .. } => {
                self.count(&self.stats.evictions_count, removed as u64)
            }
            EvictionStrategy::Unbounded => {}
        }

        if removed > 0 {
            debug!("Cleanup ({}) removed {} entries, {} left", strategy, removed, entries.len());
        }

        removed
    }
}

/// Run a cleanup pass for every policy-relevant settings change
async fn watch_settings<K, V>(shared: Weak<Shared<K, V>>, mut changes: broadcast::Receiver<SettingField>)
where
    K: Eq + Hash + Clone,
{
    loop {
        let field = match changes.recv().await {
            Ok(field) => field,
            Err(RecvError::Lagged(missed)) => {
                warn!("Settings watcher missed {} notifications, cleaning up anyway", missed);
                SettingField::PolicyKind
            }
            Err(RecvError::Closed) => break,
        };

        if !field.affects_policy() {
            debug!("Ignoring settings change: {}", field);
            continue;
        }

        let Some(cache) = shared.upgrade() else {
            break;
        };
        debug!("Settings changed ({}), running cleanup", field);
        cache.cleanup();
    }

    debug!("Settings watcher stopped");
}
