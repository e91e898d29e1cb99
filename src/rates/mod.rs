//! Exchange-rate models, the producer seam, and its caching decorator

pub mod cached;
pub mod models;
pub mod service;

pub use cached::{CachedRateService, RateCache};
pub use models::{
    currency_code, Amount, CurrencyInfo, HistoricalRateQuery, HistoricalRates, LatestRates,
};
pub use service::RateService;
