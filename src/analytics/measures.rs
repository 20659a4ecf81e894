//! Share normalization, earned-premium proration and safe ratios

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Normalize a share or commission to a 0-100 percentage.
///
/// Values strictly between 0 and 1 are read as fractions and scaled; anything
/// else is taken as already being a percentage. A stored `0.5` is therefore
/// 50%, never 0.5%. The input cannot tell the two apart.
pub fn normalize_percent(raw: Decimal) -> Decimal {
    if raw > Decimal::ZERO && raw < Decimal::ONE {
        raw * Decimal::ONE_HUNDRED
    } else {
        raw
    }
}

/// Fraction of the cover period elapsed at `today`, in `[0, 1]`.
///
/// Missing dates count as fully earned, as does a period with no positive
/// length.
pub fn earned_fraction(
    inception: Option<NaiveDate>,
    expiry: Option<NaiveDate>,
    today: NaiveDate,
) -> Decimal {
    let (Some(start), Some(end)) = (inception, expiry) else {
        return Decimal::ONE;
    };

    if today >= end {
        return Decimal::ONE;
    }
    if today <= start {
        return Decimal::ZERO;
    }

    let total = (end - start).num_days();
    if total <= 0 {
        return Decimal::ONE;
    }
    let elapsed = (today - start).num_days();

    safe_div(Decimal::from(elapsed), Decimal::from(total)).clamp(Decimal::ZERO, Decimal::ONE)
}

/// `numerator / denominator`, or 0 when the denominator is 0
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    numerator.checked_div(denominator).unwrap_or(Decimal::ZERO)
}

/// `part` as a percentage of `whole`, or 0 when `whole` is 0
pub fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    match part.checked_mul(Decimal::ONE_HUNDRED) {
        Some(scaled) => safe_div(scaled, whole),
        None => overflowed("percent_of"),
    }
}

/// `pct` percent of `amount`; an out-of-range product contributes 0
pub fn apply_percent(amount: Decimal, pct: Decimal) -> Decimal {
    amount
        .checked_mul(pct)
        .and_then(|p| p.checked_div(Decimal::ONE_HUNDRED))
        .unwrap_or_else(|| overflowed("apply_percent"))
}

/// Sum that drops any addend which would overflow the running total
pub fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> Decimal {
    values.into_iter().fold(Decimal::ZERO, |total, v| {
        total.checked_add(v).unwrap_or_else(|| {
            tracing::debug!(%total, addend = %v, "Overflowing addend dropped");
            total
        })
    })
}

fn overflowed(op: &str) -> Decimal {
    tracing::debug!(op, "Decimal overflow, contributing zero");
    Decimal::ZERO
}
