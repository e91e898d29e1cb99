//! Exchange-rate domain models and the historical query cache key

use crate::error::{RateCacheError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A finite, non-negative amount of source currency
///
/// Amounts are compared and hashed by value, so two queries for the same
/// amount always share a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Amount(f64);

impl Amount {
    /// The amount used when none was given
    pub const ONE: Amount = Amount(1.0);

    /// Create an amount, rejecting NaN, infinities and negatives
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(RateCacheError::InvalidInput(format!(
                "amount must be a finite non-negative number, got {}",
                value
            )));
        }

        // Folds -0.0 into 0.0 so equal amounts hash identically
        Ok(Amount(value + 0.0))
    }

    /// The numeric value
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Eq for Amount {}

impl Hash for Amount {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl TryFrom<f64> for Amount {
    type Error = RateCacheError;

    fn try_from(value: f64) -> Result<Self> {
        Amount::new(value)
    }
}

impl From<Amount> for f64 {
    fn from(amount: Amount) -> f64 {
        amount.0
    }
}

impl FromStr for Amount {
    type Err = RateCacheError;

    fn from_str(s: &str) -> Result<Self> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| RateCacheError::InvalidInput(format!("The provided amount is not valid: '{}'", s)))?;
        Amount::new(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Extract the code from a display string such as `"EUR - Euro"`
///
/// Returns an empty string for blank input.
pub fn currency_code(formatted: &str) -> &str {
    formatted.split('-').next().unwrap_or_default().trim()
}

/// A historical rate query; the key of the rate cache
///
/// Two queries are equal when currencies and amount match exactly and both
/// dates fall on the same UTC calendar day. Time of day is ignored.
#[derive(Debug, Clone)]
pub struct HistoricalRateQuery {
    pub source_currency: String,
    pub target_currency: String,
    pub amount: Amount,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl HistoricalRateQuery {
    /// Create a new query
    pub fn new(
        source_currency: impl Into<String>,
        target_currency: impl Into<String>,
        amount: Amount,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        Self {
            source_currency: source_currency.into(),
            target_currency: target_currency.into(),
            amount,
            start_date,
            end_date,
        }
    }

    /// First day of the range
    pub fn start_day(&self) -> NaiveDate {
        self.start_date.date_naive()
    }

    /// Last day of the range
    pub fn end_day(&self) -> NaiveDate {
        self.end_date.date_naive()
    }

    fn identity(&self) -> (&str, &str, Amount, NaiveDate, NaiveDate) {
        (
            &self.source_currency,
            &self.target_currency,
            self.amount,
            self.start_day(),
            self.end_day(),
        )
    }
}

impl PartialEq for HistoricalRateQuery {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for HistoricalRateQuery {}

impl Hash for HistoricalRateQuery {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for HistoricalRateQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}->{} {}..{}",
            self.amount,
            currency_code(&self.source_currency),
            currency_code(&self.target_currency),
            self.start_day(),
            self.end_day()
        )
    }
}

/// Historical rates for a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRates {
    pub amount: f64,

    #[serde(rename = "base")]
    pub source_currency: String,

    pub start_date: NaiveDate,

    pub end_date: NaiveDate,

    /// Day -> target currency -> converted amount
    pub rates: BTreeMap<NaiveDate, BTreeMap<String, f64>>,
}

/// Latest rates for a single day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestRates {
    pub amount: f64,

    #[serde(rename = "base")]
    pub source_currency: String,

    pub date: NaiveDate,

    pub rates: HashMap<String, f64>,
}

/// A supported currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyInfo {
    pub code: String,
    pub description: String,
}

impl fmt::Display for CurrencyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.code, self.description)
    }
}
