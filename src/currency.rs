//! Currency normalization
//!
//! Every premium is reported in USD. Rates are injected through
//! [`RateSource`] and expressed as units of a currency per one USD, the same
//! way the records store their own `exchange_rate` for the local currency.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const USD: &str = "USD";

/// Currency the books are kept in locally
pub const LOCAL_CURRENCY: &str = "UZS";

/// Looks up how many units of a currency buy one USD
pub trait RateSource: Send + Sync {
    fn units_per_usd(&self, currency: &str, on: Option<NaiveDate>) -> Option<Decimal>;
}

// =============================================================================
// RATE TABLE
// =============================================================================

/// A snapshot of rates, keyed by ISO currency code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTable {
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    #[serde(default)]
    pub rates: BTreeMap<String, Decimal>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, currency: &str, units_per_usd: Decimal) -> Self {
        self.insert(currency, units_per_usd);
        self
    }

    /// Non-positive rates are ignored
    pub fn insert(&mut self, currency: &str, units_per_usd: Decimal) {
        if units_per_usd > Decimal::ZERO {
            self.rates
                .insert(currency.trim().to_uppercase(), units_per_usd);
        }
    }

    pub fn get(&self, currency: &str) -> Option<Decimal> {
        self.rates.get(&currency.trim().to_uppercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Built-in approximate rates, used when nothing fresher is available.
    /// They drift from market rates over time.
    pub fn approximate() -> Self {
        [
            ("USD", Decimal::ONE),
            ("UZS", Decimal::new(12_800, 0)),
            ("EUR", Decimal::new(92, 2)),
            ("GBP", Decimal::new(79, 2)),
            ("CHF", Decimal::new(88, 2)),
            ("RUB", Decimal::new(92, 0)),
            ("KZT", Decimal::new(480, 0)),
            ("TWD", Decimal::new(32, 0)),
            ("PGK", Decimal::new(39, 1)),
            ("CNY", Decimal::new(72, 1)),
            ("JPY", Decimal::new(150, 0)),
            ("KRW", Decimal::new(1_330, 0)),
            ("INR", Decimal::new(83, 0)),
            ("IDR", Decimal::new(15_700, 0)),
            ("MYR", Decimal::new(47, 1)),
            ("THB", Decimal::new(36, 0)),
            ("SGD", Decimal::new(135, 2)),
            ("HKD", Decimal::new(78, 1)),
            ("AED", Decimal::new(36_725, 4)),
            ("TRY", Decimal::new(32, 0)),
            ("CAD", Decimal::new(136, 2)),
            ("AUD", Decimal::new(152, 2)),
        ]
        .into_iter()
        .fold(Self::new(), |t, (c, r)| t.with_rate(c, r))
    }

    /// Reduced table applied to claim amounts from the own-share view
    pub fn claims_fallback() -> Self {
        Self::new()
            .with_rate("USD", Decimal::ONE)
            .with_rate("UZS", Decimal::new(12_800, 0))
            .with_rate("EUR", Decimal::new(92, 2))
            .with_rate("RUB", Decimal::new(92, 0))
    }

    /// Entries of `other` replace entries of `self`
    pub fn overlay(mut self, other: &RateTable) -> Self {
        for (ccy, rate) in &other.rates {
            self.insert(ccy, *rate);
        }
        if other.as_of.is_some() {
            self.as_of = other.as_of;
        }
        self
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let raw: RateTable = serde_yaml::from_str(yaml)?;
        // Re-insert to normalise codes and drop non-positive rates
        let mut table = RateTable {
            as_of: raw.as_of,
            ..Default::default()
        };
        for (ccy, rate) in raw.rates {
            table.insert(&ccy, rate);
        }
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let table = Self::from_yaml_str(&content)?;
        tracing::info!(path = %path.display(), rates = table.len(), "Loaded rate table");
        Ok(table)
    }
}

impl RateSource for RateTable {
    fn units_per_usd(&self, currency: &str, _on: Option<NaiveDate>) -> Option<Decimal> {
        self.get(currency)
    }
}

// =============================================================================
// CONVERTER
// =============================================================================

/// Converts amounts to USD with a rate source plus per-record local rates
pub struct CurrencyConverter<'a> {
    rates: &'a dyn RateSource,
    local_currency: String,
    /// Record rates at or below this mean "not set"
    min_record_rate: Decimal,
}

impl<'a> CurrencyConverter<'a> {
    pub fn new(rates: &'a dyn RateSource) -> Self {
        Self {
            rates,
            local_currency: LOCAL_CURRENCY.to_string(),
            min_record_rate: Decimal::ONE,
        }
    }

    pub fn with_local_currency(mut self, currency: &str) -> Self {
        self.local_currency = currency.trim().to_uppercase();
        self
    }

    /// Convert `amount` in `currency` to USD.
    ///
    /// `record_rate` is the row's own local-per-USD rate; it is trusted for
    /// the local currency only, and only above the "not set" threshold.
    /// Unknown currencies come back unconverted.
    pub fn to_usd(
        &self,
        amount: Decimal,
        currency: &str,
        record_rate: Decimal,
        on: Option<NaiveDate>,
    ) -> Decimal {
        if amount.is_zero() {
            return Decimal::ZERO;
        }

        let code = currency.trim().to_uppercase();
        if code.is_empty() || code == USD {
            return amount;
        }

        let rate = if code == self.local_currency && record_rate > self.min_record_rate {
            Some(record_rate)
        } else {
            self.rates.units_per_usd(&code, on)
        };

        match rate.and_then(|r| amount.checked_div(r)) {
            Some(usd) => usd,
            None => {
                tracing::debug!(currency = %code, "No usable rate, amount left unconverted");
                amount
            }
        }
    }
}
