//! Claims aggregation and the portfolio loss ratio

use mosaic_types::{ChannelMetrics, ClaimsMetrics, LossRatioBasis};
use rust_decimal::Decimal;

use super::measures::{percent_of, safe_div};
use super::status::ClaimState;
use crate::currency::CurrencyConverter;
use crate::model::ClaimRow;

/// Sum claims in USD and measure them against the portfolio premium.
///
/// The loss ratio uses gross earned premium when there is any, otherwise net
/// written premium; with neither it is 0.
pub fn aggregate_claims(
    rows: &[ClaimRow],
    conv: &CurrencyConverter<'_>,
    premium: &ChannelMetrics,
) -> ClaimsMetrics {
    let mut m = ClaimsMetrics::default();

    for row in rows {
        m.total_claims += 1;
        match ClaimState::classify(row.status.as_deref()) {
            ClaimState::Open => m.open_claims += 1,
            ClaimState::Closed => m.closed_claims += 1,
            ClaimState::Other => {}
        }
        m.total_incurred += conv.to_usd(row.incurred, &row.currency, row.exchange_rate, row.loss_date);
        m.total_paid += conv.to_usd(row.paid, &row.currency, row.exchange_rate, row.loss_date);
    }

    m.total_reserve = m.total_incurred - m.total_paid;
    m.avg_claim_size = safe_div(m.total_incurred, Decimal::from(m.total_claims));

    let (basis, denominator) = loss_ratio_denominator(premium);
    m.loss_ratio_basis = basis;
    m.loss_ratio = percent_of(m.total_incurred, denominator);
    m
}

fn loss_ratio_denominator(premium: &ChannelMetrics) -> (LossRatioBasis, Decimal) {
    if premium.gross_earned_premium > Decimal::ZERO {
        (LossRatioBasis::GrossEarned, premium.gross_earned_premium)
    } else {
        (LossRatioBasis::NetWritten, premium.net_written_premium)
    }
}
