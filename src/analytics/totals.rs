//! Cross-channel totalizer
//!
//! Revenue channels add up; outward premium is a cost and only enters the
//! total as the difference between gross and net.

use std::collections::BTreeMap;

use mosaic_types::{Bucket, Channel, ChannelMetrics, MonthlyPoint};
use rust_decimal::Decimal;

use super::channel::{rank_counterparties, ChannelAggregate};
use super::measures::{percent_of, safe_div};

/// Merge revenue channels into the portfolio total.
///
/// `net_written = Σ gross_written − outward.gross_written`, and likewise for
/// earned premium. Average share is weighted by record count.
pub fn totalize(revenue: &[&ChannelAggregate], outward: Option<&ChannelAggregate>) -> ChannelAggregate {
    let mut m = ChannelMetrics::empty(Channel::Total);
    let mut counterparties: BTreeMap<String, Bucket> = BTreeMap::new();
    let mut months: Vec<MonthlyPoint> = Vec::new();
    let mut share_sum = Decimal::ZERO;

    for agg in revenue {
        let c = &agg.metrics;
        m.record_count += c.record_count;
        m.active_count += c.active_count;
        m.pending_count += c.pending_count;
        m.cancelled_count += c.cancelled_count;
        m.gross_written_premium += c.gross_written_premium;
        m.gross_earned_premium += c.gross_earned_premium;
        m.unearned_premium_reserve += c.unearned_premium_reserve;
        m.total_commission += c.total_commission;
        m.total_limit += c.total_limit;
        share_sum += agg.share_sum;

        merge_buckets(&mut m.by_currency, &c.by_currency);
        merge_buckets(&mut m.by_class, &c.by_class);
        merge_buckets(&mut m.by_structure, &c.by_structure);
        merge_buckets(&mut counterparties, &agg.counterparties);
        merge_trend(&mut months, &c.monthly_trend);
    }

    let (ceded_written, ceded_earned) = outward
        .map(|o| (o.metrics.gross_written_premium, o.metrics.gross_earned_premium))
        .unwrap_or_default();
    m.net_written_premium = m.gross_written_premium - ceded_written;
    m.net_earned_premium = m.gross_earned_premium - ceded_earned;

    let records = Decimal::from(m.record_count);
    m.avg_premium = safe_div(m.gross_written_premium, records);
    m.avg_share = safe_div(share_sum, records);
    m.commission_ratio = percent_of(m.total_commission, m.gross_written_premium);
    m.monthly_trend = months;
    m.top_counterparties = rank_counterparties(&counterparties);

    ChannelAggregate {
        metrics: m,
        counterparties,
        share_sum,
    }
}

fn merge_buckets(into: &mut BTreeMap<String, Bucket>, from: &BTreeMap<String, Bucket>) {
    for (key, bucket) in from {
        into.entry(key.clone()).or_default().merge(bucket);
    }
}

/// Channels share one trend window, so points line up by month
fn merge_trend(into: &mut Vec<MonthlyPoint>, from: &[MonthlyPoint]) {
    for point in from {
        match into.iter_mut().find(|p| p.month == point.month) {
            Some(existing) => {
                existing.count += point.count;
                existing.premium += point.premium;
            }
            None => into.push(point.clone()),
        }
    }
    into.sort_by(|a, b| a.month.cmp(&b.month));
}
