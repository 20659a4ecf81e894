//! Property tests for proration, share normalization, conversion and
//! ordering independence

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use mosaic_analytics::analytics::{earned_fraction, normalize_percent, summarize, AnalyticsContext};
use mosaic_analytics::currency::{CurrencyConverter, RateTable};
use mosaic_analytics::ingest::RawPortfolio;
use mosaic_types::AnalyticsSummary;
use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::{json, Value};

// -- Strategy helpers --

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
}

fn day(offset: u64) -> NaiveDate {
    base_date().checked_add_days(Days::new(offset)).unwrap()
}

/// (contract, premium, commission or ceded share, outward?, inception day)
fn arb_row() -> impl Strategy<Value = (u8, u32, u8, bool, u64)> {
    (0u8..5, 0u32..100_000, 0u8..40, any::<bool>(), 0u64..540)
}

fn to_json(i: usize, (contract, gross, commission, outward, start): (u8, u32, u8, bool, u64)) -> Value {
    let inception = day(start);
    let expiry = day(start + 365);
    let status = if contract % 2 == 0 { "Active" } else { "Pending" };
    if outward {
        json!({
            "id": format!("r{:03}", i),
            "recordType": "OUTWARD",
            "policyNumber": format!("OUT-{}", contract),
            "cededPremium": gross,
            "cededShare": commission,
            "reinsurerName": format!("Reinsurer {}", i % 3),
            "inceptionDate": inception.to_string(),
            "expiryDate": expiry.to_string(),
        })
    } else {
        json!({
            "id": format!("r{:03}", i),
            "policyNumber": format!("POL-{}", contract),
            "grossPremium": gross,
            "commissionPercent": commission,
            "status": status,
            "insuredName": format!("Insured {}", contract),
            "inceptionDate": inception.to_string(),
            "expiryDate": expiry.to_string(),
        })
    }
}

fn arb_rows() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(arb_row(), 0..24).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, r)| to_json(i, r))
            .collect()
    })
}

fn run(policies: Vec<Value>) -> AnalyticsSummary {
    let raw = RawPortfolio {
        policies,
        ..Default::default()
    };
    let (rows, _) = raw.normalize();
    let ctx = AnalyticsContext::new(day(400), Arc::new(RateTable::approximate()));
    let mut summary = summarize(&rows, &ctx);
    summary.generated_at = DateTime::<Utc>::UNIX_EPOCH;
    summary
}

proptest! {
    #[test]
    fn earned_fraction_is_bounded_and_monotone(
        length in 1u64..2_000,
        t1 in 0u64..2_500,
        t2 in 0u64..2_500,
    ) {
        let start = day(100);
        let end = day(100 + length);
        let (early, late) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };

        let f_early = earned_fraction(Some(start), Some(end), day(early));
        let f_late = earned_fraction(Some(start), Some(end), day(late));

        prop_assert!(f_early >= Decimal::ZERO && f_early <= Decimal::ONE);
        prop_assert!(f_late >= Decimal::ZERO && f_late <= Decimal::ONE);
        prop_assert!(f_early <= f_late);
    }

    #[test]
    fn fractional_shares_scale_and_percentages_pass_through(
        fraction in 1i64..10_000,
        percent in 1i64..=100,
    ) {
        let f = Decimal::new(fraction, 4);
        prop_assert_eq!(normalize_percent(f), f * Decimal::ONE_HUNDRED);

        let p = Decimal::from(percent);
        prop_assert_eq!(normalize_percent(p), p);
    }

    #[test]
    fn usd_amounts_are_never_converted(units in -1_000_000_000i64..1_000_000_000, rate in 0i64..20_000) {
        let table = RateTable::approximate();
        let conv = CurrencyConverter::new(&table);
        let amount = Decimal::new(units, 2);
        prop_assert_eq!(conv.to_usd(amount, "USD", Decimal::from(rate), None), amount);
    }

    #[test]
    fn summary_ignores_row_order(
        (rows, shuffled) in arb_rows().prop_flat_map(|rows| {
            let shuffled = Just(rows.clone()).prop_shuffle();
            (Just(rows), shuffled)
        })
    ) {
        prop_assert_eq!(run(rows), run(shuffled));
    }
}
