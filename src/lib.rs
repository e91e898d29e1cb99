//! # rate-cache
//!
//! A thread-safe, in-memory cache for historical exchange-rate lookups whose
//! eviction policy follows live configuration.
//!
//! ## Features
//!
//! - Unbounded, age-based and count-based eviction, switchable at runtime
//! - Immediate cleanup whenever a policy setting changes
//! - Day-granular cache keys, so repeated queries on the same day hit
//! - A caching decorator for any [`RateService`] that never stores failures
//! - JSON-file persistence of the policy settings
//!
//! ## Caching a Rate Service
//!
//! ```no_run
//! use rate_cache::{
//!     Amount, CacheConfig, CachedRateService, HistoricalRateQuery, RateCache, RateService,
//! };
//! use chrono::{Duration, Utc};
//! use std::sync::Arc;
//!
//! # async fn example(upstream: impl RateService) -> anyhow::Result<()> {
//! rate_cache::telemetry::init_tracing("rate_cache=info");
//!
//! let config = CacheConfig::from_env()?;
//! let cache = Arc::new(RateCache::from_config(&config)?);
//! let service = CachedRateService::new(upstream, cache.clone());
//!
//! let query = HistoricalRateQuery::new(
//!     "USD",
//!     "EUR",
//!     Amount::new(100.0)?,
//!     Utc::now() - Duration::days(30),
//!     Utc::now(),
//! );
//!
//! // The first call reaches upstream, the second is served from the cache
//! let rates = service.historical_rates(&query).await?;
//! let again = service.historical_rates(&query).await?;
//! assert_eq!(rates, again);
//!
//! println!("{}", cache.stats());
//! # Ok(())
//! # }
//! ```
//!
//! ## Changing the Policy
//!
//! ```no_run
//! use rate_cache::{PolicyKind, RateCache};
//!
//! # fn example(cache: &RateCache) {
//! let settings = cache.settings();
//! settings.set_age_limit_minutes(Some(30));
//! settings.set_policy_kind(PolicyKind::AgeBased);
//! // Entries older than 30 minutes are evicted right away
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod rates;
pub mod settings;
pub mod telemetry;

// Re-export main types for convenience
pub use cache::{
    select_strategy, CacheConfig, CacheConfigBuilder, CacheEntry, CacheStats, EvictionStrategy,
    PolicyCache,
};
pub use error::{RateCacheError, Result};
pub use rates::{
    currency_code, Amount, CachedRateService, CurrencyInfo, HistoricalRateQuery, HistoricalRates,
    LatestRates, RateCache, RateService,
};
pub use settings::{
    CacheSettings, InMemorySettingsStore, JsonFileSettingsStore, PolicyConfig, PolicyKind,
    SettingField, SettingsStore,
};
