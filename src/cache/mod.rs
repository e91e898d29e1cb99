//! # Policy-Driven Cache
//!
//! An in-memory, thread-safe cache whose eviction policy can be swapped at
//! runtime through [`CacheSettings`](crate::settings::CacheSettings).
//!
//! ## Features
//!
//! - **Age-Based Eviction**: entries older than a configured number of minutes
//!   are dropped on cleanup and on lookup
//! - **Count-Based Eviction**: the oldest entries beyond a configured count are
//!   dropped on cleanup
//! - **Live Reconfiguration**: every policy change triggers an immediate cleanup
//!   pass, so tightened limits hold without waiting for traffic
//! - **Safe Fallback**: a policy without its limit behaves as unbounded
//!
//! ## Example
//!
//! ```rust
//! use rate_cache::cache::PolicyCache;
//! use rate_cache::settings::{CacheSettings, PolicyConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = Arc::new(CacheSettings::in_memory(PolicyConfig::count_based(100)));
//! let cache: PolicyCache<String, String> = PolicyCache::new(settings.clone())?;
//!
//! cache.put("USD:EUR".to_string(), "0.92".to_string());
//!
//! if let Some(value) = cache.try_get(&"USD:EUR".to_string()) {
//!     println!("Cache hit: {}", value);
//! }
//!
//! // Tighten the policy; the cache cleans itself up in the background
//! settings.set_count_limit(Some(10));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod eviction;
pub mod store;
pub mod types;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::CacheEntry;
pub use eviction::{select_strategy, EvictionStrategy};
pub use store::PolicyCache;
pub use types::CacheStats;
