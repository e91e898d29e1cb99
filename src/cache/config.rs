//! Construction-time configuration for the cache and its settings source

use crate::error::{RateCacheError, Result};
use crate::settings::{
    CacheSettings, InMemorySettingsStore, JsonFileSettingsStore, PolicyConfig, PolicyKind,
    SettingsStore, DEFAULT_NOTIFICATION_CAPACITY,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Environment variable naming the JSON settings file
pub const ENV_SETTINGS_PATH: &str = "RATE_CACHE_SETTINGS_PATH";
/// Environment variable for the notification channel capacity
pub const ENV_NOTIFY_CAPACITY: &str = "RATE_CACHE_NOTIFY_CAPACITY";
/// Environment variable selecting the initial policy kind
pub const ENV_POLICY: &str = "RATE_CACHE_POLICY";
/// Environment variable for the initial age limit
pub const ENV_MAX_AGE_MINUTES: &str = "RATE_CACHE_MAX_AGE_MINUTES";
/// Environment variable for the initial count limit
pub const ENV_MAX_ENTRIES: &str = "RATE_CACHE_MAX_ENTRIES";

/// Configuration for building a cache and its settings provider
///
/// The initial policy only applies when the settings store has nothing saved.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// JSON file holding the policy settings; in-memory when `None`
    pub settings_path: Option<PathBuf>,

    /// Capacity of the change-notification channel
    pub notification_capacity: usize,

    /// Policy used when no settings were saved yet
    pub initial_policy: PolicyConfig,

    /// Enable hit/miss/eviction counters
    pub enable_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            settings_path: None,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            initial_policy: PolicyConfig::unbounded(),
            enable_metrics: true,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Load configuration from the environment (and `.env`, if present)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(path) = lookup(ENV_SETTINGS_PATH) {
            builder = builder.settings_path(path);
        }
        if let Some(capacity) = lookup(ENV_NOTIFY_CAPACITY) {
            builder = builder.notification_capacity(parse_var(ENV_NOTIFY_CAPACITY, &capacity)?);
        }

        let kind = match lookup(ENV_POLICY) {
            Some(kind) => kind.parse::<PolicyKind>()?,
            None => PolicyKind::Unbounded,
        };
        let age_limit_minutes = lookup(ENV_MAX_AGE_MINUTES)
            .map(|v| parse_var(ENV_MAX_AGE_MINUTES, &v))
            .transpose()?;
        let count_limit = lookup(ENV_MAX_ENTRIES)
            .map(|v| parse_var(ENV_MAX_ENTRIES, &v))
            .transpose()?;

        let config = builder
            .initial_policy(PolicyConfig {
                kind,
                age_limit_minutes,
                count_limit,
            })
            .build();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.notification_capacity == 0 {
            return Err(RateCacheError::Config(
                "notification_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Create the settings provider this configuration describes
    pub fn build_settings(&self) -> Result<Arc<CacheSettings>> {
        self.validate()?;

        let store: Arc<dyn SettingsStore> = match &self.settings_path {
            Some(path) => {
                info!("Using cache settings file {}", path.display());
                Arc::new(JsonFileSettingsStore::new(path.clone()))
            }
            None => Arc::new(InMemorySettingsStore::default()),
        };

        Ok(Arc::new(CacheSettings::load(
            store,
            self.initial_policy,
            self.notification_capacity,
        )?))
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RateCacheError::Config(format!("{} has invalid value '{}'", name, value)))
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    settings_path: Option<PathBuf>,
    notification_capacity: Option<usize>,
    initial_policy: Option<PolicyConfig>,
    enable_metrics: Option<bool>,
}

impl CacheConfigBuilder {
    /// Persist policy settings as JSON at `path`
    pub fn settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Set the notification channel capacity
    pub fn notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = Some(capacity);
        self
    }

    /// Set the policy used when nothing was saved yet
    pub fn initial_policy(mut self, policy: PolicyConfig) -> Self {
        self.initial_policy = Some(policy);
        self
    }

    /// Enable or disable metrics collection
    pub fn enable_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = Some(enable);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            settings_path: self.settings_path.or(defaults.settings_path),
            notification_capacity: self
                .notification_capacity
                .unwrap_or(defaults.notification_capacity),
            initial_policy: self.initial_policy.unwrap_or(defaults.initial_policy),
            enable_metrics: self.enable_metrics.unwrap_or(defaults.enable_metrics),
        }
    }
}
