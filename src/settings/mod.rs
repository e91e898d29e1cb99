//! # Cache Policy Settings
//!
//! The settings provider owns the live [`PolicyConfig`] and broadcasts the
//! name of every changed field. The cache subscribes to these notifications
//! and reacts to the three policy fields; everything else is ignored.
//!
//! ```rust
//! use rate_cache::settings::{CacheSettings, PolicyConfig, PolicyKind, SettingField};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = CacheSettings::in_memory(PolicyConfig::unbounded());
//! let mut changes = settings.subscribe();
//!
//! settings.set_count_limit(Some(100));
//! settings.set_policy_kind(PolicyKind::CountBased);
//!
//! assert_eq!(changes.recv().await?, SettingField::CountLimit);
//! assert_eq!(changes.recv().await?, SettingField::PolicyKind);
//! # Ok(())
//! # }
//! ```

pub mod persistence;

pub use persistence::{InMemorySettingsStore, JsonFileSettingsStore, SettingsStore};

use crate::error::{RateCacheError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Default capacity of the change-notification channel
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

/// Eviction policy family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Entries are never evicted
    #[default]
    Unbounded,

    /// Entries older than the age limit are evicted
    AgeBased,

    /// The oldest entries beyond the count limit are evicted
    CountBased,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Unbounded => write!(f, "unbounded"),
            PolicyKind::AgeBased => write!(f, "age_based"),
            PolicyKind::CountBased => write!(f, "count_based"),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = RateCacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unbounded" | "none" | "" => Ok(PolicyKind::Unbounded),
            "age" | "age_based" | "time" | "time_based" => Ok(PolicyKind::AgeBased),
            "count" | "count_based" | "size" | "size_based" => Ok(PolicyKind::CountBased),
            other => Err(RateCacheError::Config(format!(
                "unknown eviction policy '{}'",
                other
            ))),
        }
    }
}

/// Current eviction policy parameters
///
/// Only the limit matching `kind` is consulted. A kind whose limit is absent
/// behaves as [`PolicyKind::Unbounded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Selected policy family
    #[serde(rename = "eviction_strategy", default)]
    pub kind: PolicyKind,

    /// Maximum entry age in minutes (age-based policy)
    #[serde(rename = "max_age_minutes", default)]
    pub age_limit_minutes: Option<u32>,

    /// Maximum number of entries (count-based policy)
    #[serde(rename = "max_elements", default)]
    pub count_limit: Option<usize>,
}

impl PolicyConfig {
    /// Policy that never evicts
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Age-based policy with the given limit
    pub fn age_based(age_limit_minutes: u32) -> Self {
        Self {
            kind: PolicyKind::AgeBased,
            age_limit_minutes: Some(age_limit_minutes),
            count_limit: None,
        }
    }

    /// Count-based policy with the given limit
    pub fn count_based(count_limit: usize) -> Self {
        Self {
            kind: PolicyKind::CountBased,
            age_limit_minutes: None,
            count_limit: Some(count_limit),
        }
    }

    /// Whether the selected kind lacks the limit it needs
    pub fn is_incomplete(&self) -> bool {
        match self.kind {
            PolicyKind::Unbounded => false,
            PolicyKind::AgeBased => self.age_limit_minutes.is_none(),
            PolicyKind::CountBased => self.count_limit.is_none(),
        }
    }
}

/// Name of a changed setting
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SettingField {
    /// `age_limit_minutes` changed
    AgeLimit,

    /// `count_limit` changed
    CountLimit,

    /// `kind` changed
    PolicyKind,

    /// Any setting the cache does not care about
    Other(String),
}

impl SettingField {
    /// Whether a change to this field can alter eviction behaviour
    pub fn affects_policy(&self) -> bool {
        !matches!(self, SettingField::Other(_))
    }
}

impl fmt::Display for SettingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingField::AgeLimit => write!(f, "age_limit_minutes"),
            SettingField::CountLimit => write!(f, "count_limit"),
            SettingField::PolicyKind => write!(f, "policy_kind"),
            SettingField::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Live settings provider with change notifications and persistence
pub struct CacheSettings {
    current: RwLock<PolicyConfig>,
    store: Arc<dyn SettingsStore>,
    notifier: broadcast::Sender<SettingField>,
    /// Serialises writers so saves land in the same order as the changes
    writer: Mutex<()>,
}

impl CacheSettings {
    /// Create a settings provider starting from `initial`
    pub fn new(initial: PolicyConfig, store: Arc<dyn SettingsStore>, capacity: usize) -> Self {
        let (notifier, _) = broadcast::channel(capacity.max(1));

        Self {
            current: RwLock::new(initial),
            store,
            notifier,
            writer: Mutex::new(()),
        }
    }

    /// Create a settings provider from whatever `store` has saved
    ///
    /// Falls back to `fallback` when nothing was saved yet.
    pub fn load(store: Arc<dyn SettingsStore>, fallback: PolicyConfig, capacity: usize) -> Result<Self> {
        let initial = match store.load()? {
            Some(saved) => {
                info!("Loaded cache settings: {:?}", saved);
                saved
            }
            None => {
                debug!("No saved cache settings, using {:?}", fallback);
                fallback
            }
        };

        Ok(Self::new(initial, store, capacity))
    }

    /// Settings provider that persists nowhere
    pub fn in_memory(initial: PolicyConfig) -> Self {
        Self::new(
            initial,
            Arc::new(InMemorySettingsStore::default()),
            DEFAULT_NOTIFICATION_CAPACITY,
        )
    }

    /// Snapshot of the current policy
    pub fn current(&self) -> PolicyConfig {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SettingField> {
        self.notifier.subscribe()
    }

    /// Select the policy family. Returns whether anything changed.
    pub fn set_policy_kind(&self, kind: PolicyKind) -> bool {
        !self.update(|config| config.kind = kind).is_empty()
    }

    /// Set or clear the age limit. Returns whether anything changed.
    pub fn set_age_limit_minutes(&self, minutes: Option<u32>) -> bool {
        !self.update(|config| config.age_limit_minutes = minutes).is_empty()
    }

    /// Set or clear the count limit. Returns whether anything changed.
    pub fn set_count_limit(&self, limit: Option<usize>) -> bool {
        !self.update(|config| config.count_limit = limit).is_empty()
    }

    /// Replace the whole policy in one step, notifying once per changed field
    ///
    /// Readers see either the old or the new policy, never a mix of both.
    pub fn apply(&self, config: PolicyConfig) -> Vec<SettingField> {
        self.update(|current| *current = config)
    }

    /// Broadcast a change notification for `field`
    pub fn notify(&self, field: SettingField) {
        debug!("Setting changed: {}", field);
        // No subscribers is not an error
        let _ = self.notifier.send(field);
    }

    fn update(&self, mutate: impl FnOnce(&mut PolicyConfig)) -> Vec<SettingField> {
        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let (before, after) = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            let before = *current;
            mutate(&mut current);
            (before, *current)
        };

        let changed = changed_fields(&before, &after);
        if changed.is_empty() {
            return changed;
        }

        info!("Cache settings updated: {:?}", after);
        if after.is_incomplete() {
            warn!("Eviction policy {} has no limit configured, cache will not evict", after.kind);
        }

        // Readers are not blocked by the save; the writer guard keeps saves ordered
        if let Err(e) = self.store.save(&after) {
            warn!("Failed to persist cache settings: {}", e);
        }
        drop(writer);

        for field in &changed {
            self.notify(field.clone());
        }
        changed
    }
}

fn changed_fields(before: &PolicyConfig, after: &PolicyConfig) -> Vec<SettingField> {
    let mut changed = Vec::new();

    if before.age_limit_minutes != after.age_limit_minutes {
        changed.push(SettingField::AgeLimit);
    }
    if before.count_limit != after.count_limit {
        changed.push(SettingField::CountLimit);
    }
    if before.kind != after.kind {
        changed.push(SettingField::PolicyKind);
    }

    changed
}

impl fmt::Debug for CacheSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheSettings")
            .field("current", &self.current())
            .field("subscribers", &self.notifier.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_policy_kind_parsing() {
        assert_eq!("age".parse::<PolicyKind>().unwrap(), PolicyKind::AgeBased);
        assert_eq!("Count_Based".parse::<PolicyKind>().unwrap(), PolicyKind::CountBased);
        assert_eq!("".parse::<PolicyKind>().unwrap(), PolicyKind::Unbounded);
        assert!("lru".parse::<PolicyKind>().is_err());
    }

    #[test]
    fn test_policy_config_serde_names() {
        let json = serde_json::to_value(PolicyConfig::age_based(15)).unwrap();
        assert_eq!(json["eviction_strategy"], "age_based");
        assert_eq!(json["max_age_minutes"], 15);
        assert!(json["max_elements"].is_null());

        let parsed: PolicyConfig = serde_json::from_str(r#"{"max_elements": 3}"#).unwrap();
        assert_eq!(parsed.kind, PolicyKind::Unbounded);
        assert_eq!(parsed.count_limit, Some(3));
    }

    #[test]
    fn test_setting_field_affects_policy() {
        assert!(SettingField::AgeLimit.affects_policy());
        assert!(SettingField::CountLimit.affects_policy());
        assert!(SettingField::PolicyKind.affects_policy());
        assert!(!SettingField::Other("theme".to_string()).affects_policy());
    }

    #[tokio::test]
    async fn test_change_broadcast() {
        let settings = CacheSettings::in_memory(PolicyConfig::unbounded());
        let mut rx = settings.subscribe();

        assert!(settings.set_age_limit_minutes(Some(5)));
        assert!(settings.set_policy_kind(PolicyKind::AgeBased));

        assert_eq!(rx.recv().await.unwrap(), SettingField::AgeLimit);
        assert_eq!(rx.recv().await.unwrap(), SettingField::PolicyKind);
        assert_eq!(settings.current(), PolicyConfig::age_based(5));
    }

    #[tokio::test]
    async fn test_unchanged_value_is_silent() {
        let settings = CacheSettings::in_memory(PolicyConfig::count_based(10));
        let mut rx = settings.subscribe();

        assert!(!settings.set_count_limit(Some(10)));
        assert!(!settings.set_policy_kind(PolicyKind::CountBased));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_apply_reports_changed_fields() {
        let settings = CacheSettings::in_memory(PolicyConfig::count_based(10));

        let changed = settings.apply(PolicyConfig::age_based(30));
        assert_eq!(
            changed,
            vec![SettingField::AgeLimit, SettingField::CountLimit, SettingField::PolicyKind]
        );
        assert_eq!(settings.current(), PolicyConfig::age_based(30));

        assert!(settings.apply(PolicyConfig::age_based(30)).is_empty());
    }

    #[test]
    fn test_changes_are_persisted() {
        let store = Arc::new(InMemorySettingsStore::default());
        let settings = CacheSettings::new(PolicyConfig::unbounded(), store.clone(), 8);

        settings.set_count_limit(Some(42));
        settings.set_policy_kind(PolicyKind::CountBased);

        assert_eq!(store.load().unwrap(), Some(PolicyConfig::count_based(42)));
    }

    /// Store that records every save and can hold a save until released
    #[derive(Default)]
    struct RecordingStore {
        saves: Mutex<Vec<PolicyConfig>>,
        hold: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
    }

    impl SettingsStore for RecordingStore {
        fn load(&self) -> Result<Option<PolicyConfig>> {
            Ok(self.saves.lock().unwrap().last().copied())
        }

        fn save(&self, config: &PolicyConfig) -> Result<()> {
            if let Some((entered, release)) = self.hold.lock().unwrap().take() {
                entered.send(()).unwrap();
                release.recv().unwrap();
            }
            self.saves.lock().unwrap().push(*config);
            Ok(())
        }
    }

    #[test]
    fn test_apply_saves_final_policy_once() {
        let store = Arc::new(RecordingStore::default());
        let settings = CacheSettings::new(PolicyConfig::count_based(10), store.clone(), 8);

        settings.apply(PolicyConfig::age_based(30));

        let saves = store.saves.lock().unwrap();
        assert_eq!(*saves, vec![PolicyConfig::age_based(30)]);
        assert!(saves.iter().all(|saved| !saved.is_incomplete()));
    }

    #[test]
    fn test_apply_never_exposes_mixed_policy() {
        let settings = Arc::new(CacheSettings::in_memory(PolicyConfig::count_based(100)));
        let target = PolicyConfig {
            kind: PolicyKind::Unbounded,
            age_limit_minutes: None,
            count_limit: Some(1),
        };
        let stop = Arc::new(AtomicBool::new(false));

        let reader = {
            let settings = settings.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut seen = Vec::new();
                while !stop.load(Ordering::SeqCst) {
                    seen.push(settings.current());
                }
                seen
            })
        };

        for _ in 0..200 {
            settings.apply(target);
            settings.apply(PolicyConfig::count_based(100));
        }
        stop.store(true, Ordering::SeqCst);

        for seen in reader.join().unwrap() {
            assert!(seen == target || seen == PolicyConfig::count_based(100), "mixed policy {:?}", seen);
        }
    }

    #[test]
    fn test_readers_not_blocked_by_slow_save() {
        let store = Arc::new(RecordingStore::default());
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *store.hold.lock().unwrap() = Some((entered_tx, release_rx));

        let settings = Arc::new(CacheSettings::new(PolicyConfig::unbounded(), store.clone(), 8));

        let writer = {
            let settings = settings.clone();
            thread::spawn(move || settings.set_count_limit(Some(5)))
        };
        entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        // The save is still in progress; reads must not wait for it
        let (read_tx, read_rx) = mpsc::channel();
        {
            let settings = settings.clone();
            thread::spawn(move || read_tx.send(settings.current()).unwrap());
        }
        let seen = read_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(seen.count_limit, Some(5));

        release_tx.send(()).unwrap();
        assert!(writer.join().unwrap());
        assert_eq!(store.load().unwrap().and_then(|saved| saved.count_limit), Some(5));
    }

    #[test]
    fn test_load_prefers_saved_settings() {
        let store = Arc::new(InMemorySettingsStore::with_saved(PolicyConfig::age_based(7)));
        let settings = CacheSettings::load(store, PolicyConfig::unbounded(), 8).unwrap();
        assert_eq!(settings.current(), PolicyConfig::age_based(7));

        let empty = Arc::new(InMemorySettingsStore::default());
        let settings = CacheSettings::load(empty, PolicyConfig::count_based(3), 8).unwrap();
        assert_eq!(settings.current(), PolicyConfig::count_based(3));
    }
}
