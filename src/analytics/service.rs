//! Fetch-then-aggregate orchestration
//!
//! [`summarize`] is pure: canonical rows in, [`AnalyticsSummary`] out.
//! [`AnalyticsService`] adds the fetch in front of it, issuing every
//! collection query at once and replacing a failed one with an empty set.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use mosaic_types::AnalyticsSummary;
use serde_json::Value;

use super::agreements::aggregate_agreements;
use super::channel::{aggregate_direct, aggregate_inward, aggregate_outward};
use super::claims::aggregate_claims;
use super::totals::totalize;
use crate::currency::{CurrencyConverter, RateSource, RateTable};
use crate::ingest::{IngestStats, RawPortfolio};
use crate::model::{Origin, PortfolioRows};
use crate::store::{Collection, RowSource};

/// Date and rates a run is computed against
#[derive(Clone)]
pub struct AnalyticsContext {
    /// "Today" for earned-premium proration and the trend window
    pub as_of: NaiveDate,
    pub rates: Arc<dyn RateSource>,
    /// Claim amounts use their own, smaller table
    pub claims_rates: Arc<dyn RateSource>,
}

impl AnalyticsContext {
    pub fn new(as_of: NaiveDate, rates: Arc<dyn RateSource>) -> Self {
        Self {
            as_of,
            rates,
            claims_rates: Arc::new(RateTable::claims_fallback()),
        }
    }

    /// Today with the built-in approximate rates
    pub fn approximate_today() -> Self {
        Self::new(Utc::now().date_naive(), Arc::new(RateTable::approximate()))
    }

    pub fn with_claims_rates(mut self, rates: Arc<dyn RateSource>) -> Self {
        self.claims_rates = rates;
        self
    }
}

/// Aggregate canonical rows into a summary
pub fn summarize(rows: &PortfolioRows, ctx: &AnalyticsContext) -> AnalyticsSummary {
    let conv = CurrencyConverter::new(ctx.rates.as_ref());
    let claims_conv = CurrencyConverter::new(ctx.claims_rates.as_ref());

    let direct = aggregate_direct(&rows.direct, &conv, ctx.as_of);
    let foreign = aggregate_inward(&rows.inward, Origin::Foreign, &conv, ctx.as_of);
    let domestic = aggregate_inward(&rows.inward, Origin::Domestic, &conv, ctx.as_of);
    let outward = aggregate_outward(&rows.outward, &conv, ctx.as_of);
    let total = totalize(&[&direct, &foreign, &domestic], Some(&outward));

    let claims = aggregate_claims(&rows.claims, &claims_conv, &total.metrics);
    let agreements = aggregate_agreements(&rows.agreements, &rows.bordereaux, &conv);

    AnalyticsSummary {
        as_of: ctx.as_of,
        generated_at: Utc::now(),
        ceded_premium: outward.metrics.gross_written_premium,
        direct: direct.metrics,
        inward_foreign: foreign.metrics,
        inward_domestic: domestic.metrics,
        outward: outward.metrics,
        total: total.metrics,
        claims,
        agreements,
    }
}

/// Runs analytics against a row source
pub struct AnalyticsService<S> {
    source: S,
    context: AnalyticsContext,
}

impl<S: RowSource> AnalyticsService<S> {
    pub fn new(source: S, context: AnalyticsContext) -> Self {
        Self { source, context }
    }

    pub fn context(&self) -> &AnalyticsContext {
        &self.context
    }

    /// Every collection, fetched concurrently; failures become empty sets
    pub async fn fetch(&self) -> RawPortfolio {
        let (policies, inward, claims, agreements, bordereaux) = tokio::join!(
            self.fetch_or_empty(Collection::Policies),
            self.fetch_or_empty(Collection::InwardReinsurance),
            self.fetch_or_empty(Collection::Claims),
            self.fetch_or_empty(Collection::BindingAgreements),
            self.fetch_or_empty(Collection::Bordereaux),
        );
        RawPortfolio {
            policies,
            inward,
            claims,
            agreements,
            bordereaux,
        }
    }

    async fn fetch_or_empty(&self, collection: Collection) -> Vec<Value> {
        match self.source.fetch_rows(collection).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(
                    table = collection.table(),
                    error = %e,
                    "Fetch failed, continuing with no rows"
                );
                Vec::new()
            }
        }
    }

    /// Fetch, normalize and aggregate
    pub async fn run(&self) -> (AnalyticsSummary, IngestStats) {
        let raw = self.fetch().await;
        let (rows, stats) = raw.normalize();
        let summary = summarize(&rows, &self.context);

        tracing::info!(
            as_of = %summary.as_of,
            contracts = summary.total.record_count,
            ceded = summary.outward.record_count,
            claims = summary.claims.total_claims,
            gwp = %summary.total.gross_written_premium.round_dp(2),
            "Analytics run complete"
        );
        (summary, stats)
    }
}
