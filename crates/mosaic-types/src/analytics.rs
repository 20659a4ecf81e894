//! Analytics DTOs
//!
//! `ChannelMetrics` is the per-channel aggregate, `AnalyticsSummary` bundles
//! every channel with the portfolio total, claims and agreement utilization.
//!
//! ```text
//! AnalyticsSummary
//! ├── direct / inward_foreign / inward_domestic   (revenue channels)
//! ├── outward                                     (cost channel)
//! ├── total                                       (revenue - ceded)
//! ├── claims                                      (loss ratio vs total)
//! └── agreements                                  (binder utilization)
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of counterparties kept in a ranking.
pub const TOP_COUNTERPARTIES: usize = 10;

/// Number of points in a monthly trend.
pub const TREND_MONTHS: usize = 12;

// ============================================================================
// CHANNEL
// ============================================================================

/// Business channel an aggregate was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    Direct,
    InwardForeign,
    InwardDomestic,
    Outward,
    Total,
}

impl Channel {
    /// Channels whose premium is revenue (summed into the total)
    pub const REVENUE: [Channel; 3] = [
        Channel::Direct,
        Channel::InwardForeign,
        Channel::InwardDomestic,
    ];

    pub fn is_revenue(&self) -> bool {
        Self::REVENUE.contains(self)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Channel::Direct => "direct",
            Channel::InwardForeign => "inward-foreign",
            Channel::InwardDomestic => "inward-domestic",
            Channel::Outward => "outward",
            Channel::Total => "total",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// BREAKDOWNS
// ============================================================================

/// Count plus USD premium for one breakdown key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub count: u64,
    pub premium: Decimal,
}

impl Bucket {
    pub fn add(&mut self, count: u64, premium: Decimal) {
        self.count += count;
        self.premium = self.premium.checked_add(premium).unwrap_or(self.premium);
    }

    pub fn merge(&mut self, other: &Bucket) {
        self.add(other.count, other.premium);
    }
}

/// One point of the monthly inception trend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPoint {
    /// Calendar month as `YYYY-MM`
    pub month: String,
    pub count: u64,
    pub premium: Decimal,
}

/// Counterparty ranked by cumulative USD premium
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterpartyRank {
    pub name: String,
    pub count: u64,
    pub premium: Decimal,
}

// ============================================================================
// CHANNEL METRICS
// ============================================================================

/// Aggregate for one channel (or the portfolio total)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMetrics {
    pub channel: Channel,

    /// Grouped contracts (installments and participations collapse to one)
    pub record_count: u64,
    pub active_count: u64,
    pub pending_count: u64,
    pub cancelled_count: u64,

    pub gross_written_premium: Decimal,
    pub net_written_premium: Decimal,
    pub gross_earned_premium: Decimal,
    pub net_earned_premium: Decimal,
    pub unearned_premium_reserve: Decimal,
    pub total_commission: Decimal,
    pub total_limit: Decimal,

    pub avg_premium: Decimal,
    /// Our share for revenue channels, ceded share for outward (0-100)
    pub avg_share: Decimal,
    /// Commission as a percentage of gross written premium
    pub commission_ratio: Decimal,

    pub by_currency: BTreeMap<String, Bucket>,
    pub by_class: BTreeMap<String, Bucket>,
    /// Inward only: PROPORTIONAL / NON_PROPORTIONAL
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub by_structure: BTreeMap<String, Bucket>,
    pub monthly_trend: Vec<MonthlyPoint>,
    pub top_counterparties: Vec<CounterpartyRank>,

    /// Outward only: premium of the underlying policies, counted once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underlying_premium: Option<Decimal>,
    /// Outward only: share kept after all cessions (100 - avg ceded share)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mosaic_retention: Option<Decimal>,
}

impl ChannelMetrics {
    /// An aggregate with no contracts
    pub fn empty(channel: Channel) -> Self {
        Self {
            channel,
            record_count: 0,
            active_count: 0,
            pending_count: 0,
            cancelled_count: 0,
            gross_written_premium: Decimal::ZERO,
            net_written_premium: Decimal::ZERO,
            gross_earned_premium: Decimal::ZERO,
            net_earned_premium: Decimal::ZERO,
            unearned_premium_reserve: Decimal::ZERO,
            total_commission: Decimal::ZERO,
            total_limit: Decimal::ZERO,
            avg_premium: Decimal::ZERO,
            avg_share: Decimal::ZERO,
            commission_ratio: Decimal::ZERO,
            by_currency: BTreeMap::new(),
            by_class: BTreeMap::new(),
            by_structure: BTreeMap::new(),
            monthly_trend: Vec::new(),
            top_counterparties: Vec::new(),
            underlying_premium: None,
            mosaic_retention: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// First `n` counterparties of the ranking
    pub fn top(&self, n: usize) -> &[CounterpartyRank] {
        &self.top_counterparties[..n.min(self.top_counterparties.len())]
    }

    /// Copy with every money and percentage field rounded to cents
    pub fn rounded(&self) -> Self {
        let round_buckets = |m: &BTreeMap<String, Bucket>| {
            m.iter()
                .map(|(k, b)| {
                    (
                        k.clone(),
                        Bucket {
                            count: b.count,
                            premium: round_money(b.premium),
                        },
                    )
                })
                .collect()
        };

        Self {
            gross_written_premium: round_money(self.gross_written_premium),
            net_written_premium: round_money(self.net_written_premium),
            gross_earned_premium: round_money(self.gross_earned_premium),
            net_earned_premium: round_money(self.net_earned_premium),
            unearned_premium_reserve: round_money(self.unearned_premium_reserve),
            total_commission: round_money(self.total_commission),
            total_limit: round_money(self.total_limit),
            avg_premium: round_money(self.avg_premium),
            avg_share: round_money(self.avg_share),
            commission_ratio: round_money(self.commission_ratio),
            by_currency: round_buckets(&self.by_currency),
            by_class: round_buckets(&self.by_class),
            by_structure: round_buckets(&self.by_structure),
            monthly_trend: self
                .monthly_trend
                .iter()
                .map(|p| MonthlyPoint {
                    premium: round_money(p.premium),
                    ..p.clone()
                })
                .collect(),
            top_counterparties: self
                .top_counterparties
                .iter()
                .map(|c| CounterpartyRank {
                    premium: round_money(c.premium),
                    ..c.clone()
                })
                .collect(),
            underlying_premium: self.underlying_premium.map(round_money),
            mosaic_retention: self.mosaic_retention.map(round_money),
            ..self.clone()
        }
    }
}

// ============================================================================
// CLAIMS
// ============================================================================

/// Claims totals and the portfolio loss ratio
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimsMetrics {
    pub total_claims: u64,
    pub open_claims: u64,
    pub closed_claims: u64,
    pub total_incurred: Decimal,
    pub total_paid: Decimal,
    pub total_reserve: Decimal,
    pub avg_claim_size: Decimal,
    /// Percentage of the premium denominator (0 when the denominator is 0)
    pub loss_ratio: Decimal,
    pub loss_ratio_basis: LossRatioBasis,
}

/// Which premium figure the loss ratio was measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LossRatioBasis {
    GrossEarned,
    #[default]
    NetWritten,
}

// ============================================================================
// BINDING AGREEMENTS
// ============================================================================

/// Bordereau premium reported against one agreement's EPI ceiling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementUtilization {
    pub agreement_id: String,
    pub agreement_number: Option<String>,
    pub name: Option<String>,
    pub active: bool,
    pub epi: Decimal,
    pub actual_premium: Decimal,
    pub bordereau_count: u64,
    /// actual / EPI as a percentage, 0 when the agreement has no ceiling
    pub utilization_pct: Decimal,
}

/// Utilization across all binding agreements
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementMetrics {
    pub total_agreements: u64,
    pub active_agreements: u64,
    pub total_epi: Decimal,
    pub total_actual_premium: Decimal,
    pub utilization_pct: Decimal,
    /// Sorted by utilization, highest first
    pub agreements: Vec<AgreementUtilization>,
}

// ============================================================================
// SUMMARY
// ============================================================================

/// Everything one analytics run produces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub as_of: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub direct: ChannelMetrics,
    pub inward_foreign: ChannelMetrics,
    pub inward_domestic: ChannelMetrics,
    pub outward: ChannelMetrics,
    pub total: ChannelMetrics,
    /// Premium ceded to reinsurers (outward gross written premium)
    pub ceded_premium: Decimal,
    pub claims: ClaimsMetrics,
    pub agreements: AgreementMetrics,
}

impl AnalyticsSummary {
    pub fn channel(&self, channel: Channel) -> &ChannelMetrics {
        match channel {
            Channel::Direct => &self.direct,
            Channel::InwardForeign => &self.inward_foreign,
            Channel::InwardDomestic => &self.inward_domestic,
            Channel::Outward => &self.outward,
            Channel::Total => &self.total,
        }
    }

    /// Copy with every amount rounded to cents, for display
    pub fn rounded(&self) -> Self {
        let mut claims = self.claims.clone();
        for v in [
            &mut claims.total_incurred,
            &mut claims.total_paid,
            &mut claims.total_reserve,
            &mut claims.avg_claim_size,
            &mut claims.loss_ratio,
        ] {
            *v = round_money(*v);
        }

        let mut agreements = self.agreements.clone();
        agreements.total_epi = round_money(agreements.total_epi);
        agreements.total_actual_premium = round_money(agreements.total_actual_premium);
        agreements.utilization_pct = round_money(agreements.utilization_pct);
        for a in &mut agreements.agreements {
            a.epi = round_money(a.epi);
            a.actual_premium = round_money(a.actual_premium);
            a.utilization_pct = round_money(a.utilization_pct);
        }

        Self {
            as_of: self.as_of,
            generated_at: self.generated_at,
            direct: self.direct.rounded(),
            inward_foreign: self.inward_foreign.rounded(),
            inward_domestic: self.inward_domestic.rounded(),
            outward: self.outward.rounded(),
            total: self.total.rounded(),
            ceded_premium: round_money(self.ceded_premium),
            claims,
            agreements,
        }
    }
}

/// Round half away from zero to two decimal places
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
