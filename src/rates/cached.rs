//! Caching decorator for a [`RateService`]

use crate::cache::PolicyCache;
use crate::error::Result;
use crate::rates::models::{Amount, CurrencyInfo, HistoricalRateQuery, HistoricalRates, LatestRates};
use crate::rates::service::RateService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Cache of historical rate responses keyed by query
pub type RateCache = PolicyCache<HistoricalRateQuery, HistoricalRates>;

/// Wraps a rate service and caches its historical-rate responses
///
/// Only `historical_rates` is cached. Failed lookups are returned unchanged
/// and never stored. The other operations go straight to the inner service.
pub struct CachedRateService<S> {
    inner: S,
    cache: Arc<RateCache>,
}

impl<S: RateService> CachedRateService<S> {
    /// Decorate `inner` with `cache`
    pub fn new(inner: S, cache: Arc<RateCache>) -> Self {
        Self { inner, cache }
    }

    /// The cache backing this service
    pub fn cache(&self) -> &Arc<RateCache> {
        &self.cache
    }

    /// The decorated service
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: RateService> RateService for CachedRateService<S> {
    async fn available_currencies(&self) -> Result<Vec<CurrencyInfo>> {
        self.inner.available_currencies().await
    }

    async fn latest_rate(
        &self,
        source_currency: &str,
        target_currency: &str,
        amount: Amount,
    ) -> Result<LatestRates> {
        self.inner
            .latest_rate(source_currency, target_currency, amount)
            .await
    }

    async fn historical_rates(&self, query: &HistoricalRateQuery) -> Result<HistoricalRates> {
        if let Some(cached) = self.cache.try_get(query) {
            debug!("Serving historical rates from cache: {}", query);
            return Ok(cached);
        }

        // The cache lock is never held across this await
        let rates = self.inner.historical_rates(query).await?;
        self.cache.put(query.clone(), rates.clone());

        Ok(rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RateCacheError;
    use crate::settings::{CacheSettings, PolicyConfig};
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingService {
        historical_calls: AtomicUsize,
        latest_calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl RateService for CountingService {
        async fn available_currencies(&self) -> Result<Vec<CurrencyInfo>> {
            Ok(vec![CurrencyInfo {
                code: "EUR".to_string(),
                description: "Euro".to_string(),
            }])
        }

        async fn latest_rate(&self, source: &str, target: &str, amount: Amount) -> Result<LatestRates> {
            self.latest_calls.fetch_add(1, Ordering::SeqCst);
            Ok(LatestRates {
                amount: amount.value(),
                source_currency: source.to_string(),
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                rates: [(target.to_string(), 0.9 * amount.value())].into_iter().collect(),
            })
        }

        async fn historical_rates(&self, query: &HistoricalRateQuery) -> Result<HistoricalRates> {
            self.historical_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RateCacheError::Upstream("503 Service Unavailable".to_string()));
            }
            Ok(HistoricalRates {
                amount: query.amount.value(),
                source_currency: query.source_currency.clone(),
                start_date: query.start_day(),
                end_date: query.end_day(),
                rates: BTreeMap::new(),
            })
        }
    }

    fn sample_query() -> HistoricalRateQuery {
        HistoricalRateQuery::new(
            "USD",
            "EUR",
            Amount::ONE,
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 8, 9, 0, 0).unwrap(),
        )
    }

    fn service(fail: bool) -> CachedRateService<CountingService> {
        let settings = Arc::new(CacheSettings::in_memory(PolicyConfig::unbounded()));
        let cache = Arc::new(RateCache::new(settings).unwrap());
        CachedRateService::new(
            CountingService {
                fail,
                ..Default::default()
            },
            cache,
        )
    }

    #[tokio::test]
    async fn test_second_lookup_is_served_from_cache() {
        let service = service(false);
        let query = sample_query();

        let first = service.historical_rates(&query).await.unwrap();
        let second = service.historical_rates(&query).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(service.inner().historical_calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let service = service(true);
        let query = sample_query();

        let result = service.historical_rates(&query).await;
        assert!(matches!(result, Err(RateCacheError::Upstream(_))));
        assert!(service.cache().try_get(&query).is_none());

        assert!(service.historical_rates(&query).await.is_err());
        assert_eq!(service.inner().historical_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_latest_rate_passes_through() {
        let service = service(false);

        service.latest_rate("USD", "EUR", Amount::ONE).await.unwrap();
        service.latest_rate("USD", "EUR", Amount::ONE).await.unwrap();

        assert_eq!(service.inner().latest_calls.load(Ordering::SeqCst), 2);
        assert!(service.cache().is_empty());

        let currencies = service.available_currencies().await.unwrap();
        assert_eq!(currencies.len(), 1);
    }
}
