//! Per-channel aggregation
//!
//! Rows are grouped into contracts first: installments of a direct policy or
//! inward contract share a number, as do the reinsurer participations of one
//! ceded policy. Each group is sorted by `(created_at, id)` and groups are
//! visited in key order, so the same rows in any order give the same result.
//!
//! ```text
//! rows ──group──> contracts ──figures──> Accumulator ──finish──> ChannelAggregate
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use mosaic_types::{
    Bucket, Channel, ChannelMetrics, CounterpartyRank, MonthlyPoint, TOP_COUNTERPARTIES,
    TREND_MONTHS,
};
use rust_decimal::Decimal;

use super::measures::{
    apply_percent, checked_sum, earned_fraction, normalize_percent, percent_of, safe_div,
};
use super::status::StatusBucket;
use crate::currency::CurrencyConverter;
use crate::model::{InwardRow, Origin, OutwardRow, PolicyRow, Structure};

const UNSPECIFIED: &str = "UNSPECIFIED";

// =============================================================================
// AGGREGATE
// =============================================================================

/// Finished metrics plus the raw sums the totalizer needs to merge channels
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelAggregate {
    pub metrics: ChannelMetrics,
    /// Every counterparty, not just the top ranking
    pub counterparties: BTreeMap<String, Bucket>,
    /// Sum of per-contract shares (0-100 each)
    pub share_sum: Decimal,
}

impl ChannelAggregate {
    pub fn empty(channel: Channel, as_of: NaiveDate) -> Self {
        Accumulator::new(channel, as_of).finish()
    }
}

// =============================================================================
// GROUPING
// =============================================================================

/// Rows that collapse into contracts
pub trait ContractRow {
    /// Contract number shared by installments or participations
    fn contract_key(&self) -> Option<&str>;
    fn row_id(&self) -> &str;
    fn created_at(&self) -> Option<DateTime<Utc>>;
}

impl ContractRow for PolicyRow {
    fn contract_key(&self) -> Option<&str> {
        self.policy_number.as_deref()
    }
    fn row_id(&self) -> &str {
        &self.id
    }
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

impl ContractRow for OutwardRow {
    fn contract_key(&self) -> Option<&str> {
        self.policy_number.as_deref()
    }
    fn row_id(&self) -> &str {
        &self.id
    }
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

impl ContractRow for InwardRow {
    fn contract_key(&self) -> Option<&str> {
        self.contract_number.as_deref()
    }
    fn row_id(&self) -> &str {
        &self.id
    }
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

/// Group rows by contract key in canonical order.
///
/// Rows without a key stand alone under `#<id>`; rows with neither key nor
/// id fall back to their position, the only order-dependent case.
pub fn group_contracts<'r, R: ContractRow>(
    rows: impl IntoIterator<Item = &'r R>,
) -> BTreeMap<String, Vec<&'r R>>
where
    R: 'r,
{
    let mut groups: BTreeMap<String, Vec<&R>> = BTreeMap::new();
    for (index, row) in rows.into_iter().enumerate() {
        let key = match row.contract_key().map(str::trim).filter(|k| !k.is_empty()) {
            Some(k) => k.to_string(),
            None if !row.row_id().is_empty() => format!("#{}", row.row_id()),
            None => format!("#row-{}", index),
        };
        groups.entry(key).or_default().push(row);
    }
    for rows in groups.values_mut() {
        rows.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.row_id().cmp(b.row_id()))
        });
    }
    groups
}

// =============================================================================
// CONTRACT FIGURES
// =============================================================================

/// One grouped contract, converted to USD
#[derive(Debug, Clone, Default)]
struct ContractFigures {
    status: String,
    currency: String,
    class: Option<String>,
    structure: Option<Structure>,
    inception: Option<NaiveDate>,
    expiry: Option<NaiveDate>,
    /// Bucket month for the trend
    month: Option<NaiveDate>,
    gross: Decimal,
    net: Decimal,
    commission: Decimal,
    share: Decimal,
    limit: Decimal,
    /// Ranked counterparties this contract contributes to
    counterparties: Vec<(String, Decimal)>,
    underlying: Decimal,
}

fn trend_date(inception: Option<NaiveDate>, created_at: Option<DateTime<Utc>>) -> Option<NaiveDate> {
    inception.or_else(|| created_at.map(|ts| ts.date_naive()))
}

/// One row's net: its stored net when present and non-zero, else its gross
/// less commission
fn net_premium(gross: Decimal, stored_net: Decimal, commission_pct: Decimal) -> Decimal {
    if stored_net.is_zero() {
        gross - apply_percent(gross, commission_pct)
    } else {
        stored_net
    }
}

fn direct_figures(group: &[&PolicyRow], conv: &CurrencyConverter<'_>) -> ContractFigures {
    let Some(&first) = group.first() else {
        return ContractFigures::default();
    };
    let to_usd = |row: &PolicyRow, amount| {
        conv.to_usd(amount, &row.currency, row.exchange_rate, row.inception_date)
    };

    let commission_pct = normalize_percent(first.commission_percent);
    let gross = checked_sum(group.iter().map(|&r| to_usd(r, r.gross_premium)));
    let net = checked_sum(group.iter().map(|&r| {
        net_premium(to_usd(r, r.gross_premium), to_usd(r, r.net_premium), commission_pct)
    }));

    ContractFigures {
        status: first.status.clone(),
        currency: first.currency.clone(),
        class: first.class_code.clone(),
        structure: None,
        inception: first.inception_date,
        expiry: first.expiry_date,
        month: trend_date(first.inception_date, first.created_at),
        gross,
        net,
        commission: apply_percent(gross, commission_pct),
        share: normalize_percent(first.our_share),
        limit: to_usd(first, first.sum_insured),
        counterparties: first
            .insured_name
            .iter()
            .map(|n| (n.clone(), gross))
            .collect(),
        underlying: Decimal::ZERO,
    }
}

fn inward_figures(group: &[&InwardRow], conv: &CurrencyConverter<'_>) -> ContractFigures {
    let Some(&first) = group.first() else {
        return ContractFigures::default();
    };
    let to_usd = |row: &InwardRow, amount| {
        conv.to_usd(amount, &row.currency, row.exchange_rate, row.inception_date)
    };

    let commission_pct = normalize_percent(first.commission_percent);
    let gross = checked_sum(group.iter().map(|&r| to_usd(r, r.gross_premium)));
    let net = checked_sum(group.iter().map(|&r| {
        net_premium(to_usd(r, r.gross_premium), to_usd(r, r.net_premium), commission_pct)
    }));

    ContractFigures {
        status: first.status.clone(),
        currency: first.currency.clone(),
        class: first.class_code.clone(),
        structure: Some(first.structure),
        inception: first.inception_date,
        expiry: first.expiry_date,
        month: trend_date(first.inception_date, first.created_at),
        gross,
        net,
        commission: apply_percent(gross, commission_pct),
        share: normalize_percent(first.our_share),
        limit: to_usd(first, first.limit_of_liability),
        counterparties: first
            .cedant_name
            .iter()
            .map(|n| (n.clone(), gross))
            .collect(),
        underlying: Decimal::ZERO,
    }
}

/// Participations are distinct cessions: premiums and shares add up, each
/// reinsurer is ranked on its own premium
fn outward_figures(group: &[&OutwardRow], conv: &CurrencyConverter<'_>) -> ContractFigures {
    let Some(&first) = group.first() else {
        return ContractFigures::default();
    };
    let to_usd = |row: &OutwardRow, amount| {
        conv.to_usd(amount, &row.currency, row.exchange_rate, row.inception_date)
    };

    let mut gross = Decimal::ZERO;
    let mut commission = Decimal::ZERO;
    let mut share = Decimal::ZERO;
    let mut counterparties = Vec::with_capacity(group.len());

    for &row in group {
        let ceded = to_usd(row, row.ceded_premium);
        gross = checked_sum([gross, ceded]);
        commission = checked_sum([
            commission,
            apply_percent(ceded, normalize_percent(row.reinsurance_commission)),
        ]);
        share = checked_sum([share, normalize_percent(row.ceded_share)]);
        if let Some(name) = &row.reinsurer_name {
            counterparties.push((name.clone(), ceded));
        }
    }

    ContractFigures {
        status: first.status.clone(),
        currency: first.currency.clone(),
        class: first.class_code.clone(),
        structure: None,
        inception: first.inception_date,
        expiry: first.expiry_date,
        month: trend_date(first.inception_date, first.created_at),
        gross,
        net: checked_sum([gross, -commission]),
        commission,
        share,
        limit: to_usd(first, first.sum_insured),
        counterparties,
        underlying: to_usd(first, first.original_gross_premium),
    }
}

// =============================================================================
// ACCUMULATOR
// =============================================================================

fn accrue(total: &mut Decimal, value: Decimal) {
    *total = checked_sum([*total, value]);
}

struct Accumulator {
    channel: Channel,
    as_of: NaiveDate,
    metrics: ChannelMetrics,
    months: BTreeMap<String, Bucket>,
    counterparties: BTreeMap<String, Bucket>,
    share_sum: Decimal,
    underlying: Decimal,
}

impl Accumulator {
    fn new(channel: Channel, as_of: NaiveDate) -> Self {
        Self {
            channel,
            as_of,
            metrics: ChannelMetrics::empty(channel),
            months: BTreeMap::new(),
            counterparties: BTreeMap::new(),
            share_sum: Decimal::ZERO,
            underlying: Decimal::ZERO,
        }
    }

    fn add(&mut self, c: ContractFigures) {
        let m = &mut self.metrics;
        m.record_count += 1;
        match StatusBucket::classify(&c.status) {
            StatusBucket::Active => m.active_count += 1,
            StatusBucket::Pending => m.pending_count += 1,
            StatusBucket::Cancelled => m.cancelled_count += 1,
        }

        let fraction = earned_fraction(c.inception, c.expiry, self.as_of);
        let gross_earned = c.gross * fraction;

        accrue(&mut m.gross_written_premium, c.gross);
        accrue(&mut m.net_written_premium, c.net);
        accrue(&mut m.gross_earned_premium, gross_earned);
        accrue(&mut m.net_earned_premium, c.net * fraction);
        accrue(&mut m.unearned_premium_reserve, c.gross - gross_earned);
        accrue(&mut m.total_commission, c.commission);
        accrue(&mut m.total_limit, c.limit);
        accrue(&mut self.share_sum, c.share);
        accrue(&mut self.underlying, c.underlying);

        m.by_currency
            .entry(c.currency)
            .or_default()
            .add(1, c.gross);
        m.by_class
            .entry(c.class.unwrap_or_else(|| UNSPECIFIED.to_string()))
            .or_default()
            .add(1, c.gross);
        if let Some(structure) = c.structure {
            m.by_structure
                .entry(structure.code().to_string())
                .or_default()
                .add(1, c.gross);
        }
        if let Some(month) = c.month {
            self.months
                .entry(month_key(month))
                .or_default()
                .add(1, c.gross);
        }
        for (name, premium) in c.counterparties {
            self.counterparties.entry(name).or_default().add(1, premium);
        }
    }

    fn finish(self) -> ChannelAggregate {
        let mut m = self.metrics;
        let records = Decimal::from(m.record_count);

        m.avg_premium = safe_div(m.gross_written_premium, records);
        m.avg_share = safe_div(self.share_sum, records);
        m.commission_ratio = percent_of(m.total_commission, m.gross_written_premium);
        m.monthly_trend = trend_window(self.as_of, &self.months);
        m.top_counterparties = rank_counterparties(&self.counterparties);

        if self.channel == Channel::Outward {
            m.underlying_premium = Some(self.underlying);
            m.mosaic_retention = Some(retention(m.avg_share));
        }

        ChannelAggregate {
            metrics: m,
            counterparties: self.counterparties,
            share_sum: self.share_sum,
        }
    }
}

/// Share kept after cessions, floored at zero
pub(crate) fn retention(avg_ceded_share: Decimal) -> Decimal {
    (Decimal::ONE_HUNDRED - avg_ceded_share).max(Decimal::ZERO)
}

pub(crate) fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// The calendar months ending at `as_of`, oldest first, zero-filled
pub(crate) fn trend_window(as_of: NaiveDate, months: &BTreeMap<String, Bucket>) -> Vec<MonthlyPoint> {
    let Some(anchor) = as_of.with_day(1) else {
        return Vec::new();
    };
    (0..TREND_MONTHS as u32)
        .rev()
        .filter_map(|back| anchor.checked_sub_months(Months::new(back)))
        .map(|month| {
            let key = month_key(month);
            let bucket = months.get(&key).copied().unwrap_or_default();
            MonthlyPoint {
                month: key,
                count: bucket.count,
                premium: bucket.premium,
            }
        })
        .collect()
}

/// Highest premium first, ties by name, at most [`TOP_COUNTERPARTIES`]
pub(crate) fn rank_counterparties(all: &BTreeMap<String, Bucket>) -> Vec<CounterpartyRank> {
    let mut ranked: Vec<CounterpartyRank> = all
        .iter()
        .map(|(name, b)| CounterpartyRank {
            name: name.clone(),
            count: b.count,
            premium: b.premium,
        })
        .collect();
    ranked.sort_by(|a, b| b.premium.cmp(&a.premium).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(TOP_COUNTERPARTIES);
    ranked
}

// =============================================================================
// CHANNEL ENTRY POINTS
// =============================================================================

/// Direct insurance: installments collapse to one policy
pub fn aggregate_direct(
    rows: &[PolicyRow],
    conv: &CurrencyConverter<'_>,
    as_of: NaiveDate,
) -> ChannelAggregate {
    let mut acc = Accumulator::new(Channel::Direct, as_of);
    for group in group_contracts(rows).values() {
        acc.add(direct_figures(group, conv));
    }
    acc.finish()
}

/// Inward reinsurance of one origin
pub fn aggregate_inward(
    rows: &[InwardRow],
    origin: Origin,
    conv: &CurrencyConverter<'_>,
    as_of: NaiveDate,
) -> ChannelAggregate {
    let channel = match origin {
        Origin::Foreign => Channel::InwardForeign,
        Origin::Domestic => Channel::InwardDomestic,
    };
    let mut acc = Accumulator::new(channel, as_of);
    let matching = rows.iter().filter(|r| r.resolved_origin() == origin);
    for group in group_contracts(matching).values() {
        acc.add(inward_figures(group, conv));
    }
    acc.finish()
}

/// Outward cessions: participations collapse to one ceded policy
pub fn aggregate_outward(
    rows: &[OutwardRow],
    conv: &CurrencyConverter<'_>,
    as_of: NaiveDate,
) -> ChannelAggregate {
    let mut acc = Accumulator::new(Channel::Outward, as_of);
    for group in group_contracts(rows).values() {
        acc.add(outward_figures(group, conv));
    }
    acc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::RateTable;
    use rust_decimal_macros::dec;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    fn policy(id: &str, number: Option<&str>, gross: Decimal) -> PolicyRow {
        PolicyRow {
            id: id.into(),
            policy_number: number.map(String::from),
            status: "Active".into(),
            currency: "USD".into(),
            gross_premium: gross,
            ..Default::default()
        }
    }

    #[test]
    fn test_group_keys_and_fallbacks() {
        let rows = vec![
            policy("b", Some("P-1"), dec!(1)),
            policy("a", Some("P-1"), dec!(1)),
            policy("c", None, dec!(1)),
            policy("", Some("  "), dec!(1)),
        ];
        let groups = group_contracts(&rows);
        let keys: Vec<_> = groups.keys().cloned().collect();
        assert_eq!(keys, vec!["#c", "#row-3", "P-1"]);
        // Sorted by id when created_at ties
        assert_eq!(groups["P-1"][0].id, "a");
    }

    #[test]
    fn test_first_row_supplies_non_additive_fields() {
        let mut early = policy("z", Some("P-1"), dec!(100));
        early.created_at = "2024-01-01T00:00:00Z".parse().ok();
        early.class_code = Some("FIRE".into());
        let mut late = policy("a", Some("P-1"), dec!(100));
        late.created_at = "2024-02-01T00:00:00Z".parse().ok();
        late.class_code = Some("MARINE".into());

        let table = RateTable::approximate();
        let conv = CurrencyConverter::new(&table);
        let agg = aggregate_direct(&[late, early], &conv, as_of());

        assert_eq!(agg.metrics.record_count, 1);
        assert_eq!(agg.metrics.by_class["FIRE"].premium, dec!(200));
        assert!(!agg.metrics.by_class.contains_key("MARINE"));
    }

    #[test]
    fn test_stored_net_wins_when_present() {
        let mut row = policy("a", Some("P-1"), dec!(1000));
        row.net_premium = dec!(700);
        row.commission_percent = dec!(10);

        let table = RateTable::new();
        let conv = CurrencyConverter::new(&table);
        let agg = aggregate_direct(&[row], &conv, as_of());
        assert_eq!(agg.metrics.net_written_premium, dec!(700));
        assert_eq!(agg.metrics.total_commission, dec!(100));
        assert_eq!(agg.metrics.commission_ratio, dec!(10));
    }

    #[test]
    fn test_net_is_decided_per_installment() {
        let mut first = policy("a", Some("P-1"), dec!(1000));
        first.net_premium = dec!(900);
        first.commission_percent = dec!(20);
        let second = policy("b", Some("P-1"), dec!(1000));

        let table = RateTable::new();
        let conv = CurrencyConverter::new(&table);
        let agg = aggregate_direct(&[second, first], &conv, as_of());
        // 900 stored plus 1000 less the first row's 20%
        assert_eq!(agg.metrics.net_written_premium, dec!(1700));
        assert_eq!(agg.metrics.total_commission, dec!(400));
    }

    #[test]
    fn test_overflowing_installment_is_dropped_not_fatal() {
        let huge = dec!(60000000000000000000000000000);
        let mut first = policy("a", Some("P-1"), huge);
        first.commission_percent = dec!(10);
        let second = policy("b", Some("P-1"), huge);

        let table = RateTable::new();
        let conv = CurrencyConverter::new(&table);
        let agg = aggregate_direct(&[first, second], &conv, as_of());
        assert_eq!(agg.metrics.record_count, 1);
        assert_eq!(agg.metrics.gross_written_premium, huge);
        assert_eq!(agg.metrics.total_commission, dec!(0));
    }

    #[test]
    fn test_earned_and_unearned_split() {
        let mut row = policy("a", Some("P-1"), dec!(1000));
        row.inception_date = NaiveDate::from_ymd_opt(2024, 6, 20);
        row.expiry_date = NaiveDate::from_ymd_opt(2024, 7, 10);

        let table = RateTable::new();
        let conv = CurrencyConverter::new(&table);
        let agg = aggregate_direct(&[row], &conv, as_of());
        // 10 of 20 days elapsed
        assert_eq!(agg.metrics.gross_earned_premium, dec!(500));
        assert_eq!(agg.metrics.unearned_premium_reserve, dec!(500));
    }

    #[test]
    fn test_inward_split_by_origin_with_structure() {
        let rows = vec![
            InwardRow {
                id: "1".into(),
                contract_number: Some("C-1".into()),
                origin: Some(Origin::Foreign),
                structure: Structure::NonProportional,
                currency: "USD".into(),
                gross_premium: dec!(300),
                our_share: dec!(0.25),
                status: "BOUND".into(),
                ..Default::default()
            },
            InwardRow {
                id: "2".into(),
                contract_number: Some("C-2".into()),
                currency: "UZS".into(),
                exchange_rate: dec!(12500),
                gross_premium: dec!(1250000),
                status: "Draft".into(),
                ..Default::default()
            },
        ];
        let table = RateTable::approximate();
        let conv = CurrencyConverter::new(&table);

        let foreign = aggregate_inward(&rows, Origin::Foreign, &conv, as_of());
        assert_eq!(foreign.metrics.channel, Channel::InwardForeign);
        assert_eq!(foreign.metrics.active_count, 1);
        assert_eq!(foreign.metrics.avg_share, dec!(25));
        assert_eq!(foreign.metrics.by_structure["NON_PROPORTIONAL"].count, 1);

        let domestic = aggregate_inward(&rows, Origin::Domestic, &conv, as_of());
        assert_eq!(domestic.metrics.pending_count, 1);
        assert_eq!(domestic.metrics.gross_written_premium, dec!(100));
        assert_eq!(domestic.metrics.by_currency["UZS"].premium, dec!(100));
    }

    #[test]
    fn test_trend_window_is_zero_filled() {
        let mut row = policy("a", Some("P-1"), dec!(50));
        row.inception_date = NaiveDate::from_ymd_opt(2024, 3, 15);
        let mut old = policy("b", Some("P-2"), dec!(50));
        old.inception_date = NaiveDate::from_ymd_opt(2022, 3, 15);

        let table = RateTable::new();
        let conv = CurrencyConverter::new(&table);
        let trend = aggregate_direct(&[row, old], &conv, as_of()).metrics.monthly_trend;

        assert_eq!(trend.len(), 12);
        assert_eq!(trend[0].month, "2023-07");
        assert_eq!(trend[11].month, "2024-06");
        let march = trend.iter().find(|p| p.month == "2024-03").unwrap();
        assert_eq!(march.count, 1);
        assert_eq!(trend.iter().map(|p| p.count).sum::<u64>(), 1);
    }

    #[test]
    fn test_ranking_ties_by_name() {
        let mut all = BTreeMap::new();
        all.insert("Beta".to_string(), Bucket { count: 1, premium: dec!(10) });
        all.insert("Alpha".to_string(), Bucket { count: 1, premium: dec!(10) });
        all.insert("Gamma".to_string(), Bucket { count: 2, premium: dec!(30) });
        let ranked = rank_counterparties(&all);
        let names: Vec<_> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Gamma", "Alpha", "Beta"]);
    }

    #[test]
    fn test_retention_floor() {
        assert_eq!(retention(dec!(30)), dec!(70));
        assert_eq!(retention(dec!(130)), dec!(0));
    }

    #[test]
    fn test_empty_channel() {
        let agg = ChannelAggregate::empty(Channel::Outward, as_of());
        assert!(agg.metrics.is_empty());
        assert_eq!(agg.metrics.avg_premium, Decimal::ZERO);
        assert_eq!(agg.metrics.mosaic_retention, Some(dec!(100)));
        assert_eq!(agg.metrics.monthly_trend.len(), 12);
    }
}
