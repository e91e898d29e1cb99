//! The exchange-rate producer seam

use crate::error::Result;
use crate::rates::models::{Amount, CurrencyInfo, HistoricalRateQuery, HistoricalRates, LatestRates};
use async_trait::async_trait;

/// Source of exchange-rate data, typically backed by a remote API
///
/// Implementations own their transport, timeouts and payload decoding.
#[async_trait]
pub trait RateService: Send + Sync {
    /// All currencies the source can convert between
    async fn available_currencies(&self) -> Result<Vec<CurrencyInfo>>;

    /// Latest rate for `amount` of `source_currency` in `target_currency`
    async fn latest_rate(
        &self,
        source_currency: &str,
        target_currency: &str,
        amount: Amount,
    ) -> Result<LatestRates>;

    /// Daily rates over the query's date range
    async fn historical_rates(&self, query: &HistoricalRateQuery) -> Result<HistoricalRates>;
}

#[async_trait]
impl<S> RateService for std::sync::Arc<S>
where
    S: RateService + ?Sized,
{
    async fn available_currencies(&self) -> Result<Vec<CurrencyInfo>> {
        (**self).available_currencies().await
    }

    async fn latest_rate(
        &self,
        source_currency: &str,
        target_currency: &str,
        amount: Amount,
    ) -> Result<LatestRates> {
        (**self).latest_rate(source_currency, target_currency, amount).await
    }

    async fn historical_rates(&self, query: &HistoricalRateQuery) -> Result<HistoricalRates> {
        (**self).historical_rates(query).await
    }
}
