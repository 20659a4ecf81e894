//! Central-bank rate client
//!
//! The feed quotes every currency in UZS per `Nominal` units. The converter
//! wants units per USD, so each quote is re-based on the USD quote:
//!
//! ```text
//! units_per_usd(X) = UZS_per_USD / (Rate_X / Nominal_X)
//! ```

use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use mosaic_types::CbuRateEntry;
use reqwest::Client;
use rust_decimal::Decimal;
use url::Url;

use crate::currency::{RateTable, LOCAL_CURRENCY, USD};
use crate::error::RateError;

const REQUEST_TIMEOUT_SECS: u64 = 15;

impl RateTable {
    /// Build a per-USD table from feed entries; malformed quotes are skipped
    pub fn from_cbu_entries(entries: &[CbuRateEntry]) -> Result<Self, RateError> {
        let usd = entries
            .iter()
            .find(|e| e.ccy.eq_ignore_ascii_case(USD))
            .ok_or(RateError::MissingUsd)?;
        let local_per_usd = local_per_unit(usd)?;

        let mut table = RateTable::new()
            .with_rate(USD, Decimal::ONE)
            .with_rate(LOCAL_CURRENCY, local_per_usd);
        table.as_of = NaiveDate::parse_from_str(usd.date.trim(), "%d.%m.%Y").ok();

        for entry in entries {
            match local_per_unit(entry) {
                Ok(per_unit) => {
                    if let Some(units) = local_per_usd.checked_div(per_unit) {
                        table.insert(&entry.ccy, units);
                    }
                }
                Err(e) => tracing::debug!(error = %e, "Skipping rate quote"),
            }
        }
        // Re-pin: the loop re-derives USD as local/local
        table.insert(USD, Decimal::ONE);
        Ok(table)
    }
}

/// UZS for one unit of the entry's currency
fn local_per_unit(entry: &CbuRateEntry) -> Result<Decimal, RateError> {
    let invalid = || RateError::InvalidQuote {
        ccy: entry.ccy.clone(),
        rate: entry.rate.clone(),
        nominal: entry.nominal.clone(),
    };
    let rate = Decimal::from_str(entry.rate.trim()).map_err(|_| invalid())?;
    let nominal = Decimal::from_str(entry.nominal.trim()).map_err(|_| invalid())?;
    if rate <= Decimal::ZERO || nominal <= Decimal::ZERO {
        return Err(invalid());
    }
    rate.checked_div(nominal).ok_or_else(invalid)
}

/// Fetches quotes through the rate proxy
pub struct CbuRateClient {
    client: Client,
    endpoint: Url,
}

impl CbuRateClient {
    pub fn new(endpoint: Url) -> Result<Self, RateError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, endpoint })
    }

    /// Quotes for `date`, or the latest when `None`
    pub async fn fetch(&self, date: Option<NaiveDate>) -> Result<Vec<CbuRateEntry>, RateError> {
        let mut request = self.client.get(self.endpoint.clone());
        if let Some(d) = date {
            request = request.query(&[("date", d.format("%Y-%m-%d").to_string())]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RateError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let entries: Vec<CbuRateEntry> = response.json().await?;
        tracing::info!(count = entries.len(), ?date, "Fetched central-bank rates");
        Ok(entries)
    }

    pub async fn fetch_table(&self, date: Option<NaiveDate>) -> Result<RateTable, RateError> {
        let entries = self.fetch(date).await?;
        RateTable::from_cbu_entries(&entries)
    }
}
