//! Binding agreement utilization: bordereau premium against EPI

use std::collections::HashMap;

use mosaic_types::{AgreementMetrics, AgreementUtilization};
use rust_decimal::Decimal;

use super::measures::percent_of;
use super::status::StatusBucket;
use crate::currency::CurrencyConverter;
use crate::model::{AgreementRow, BordereauRow};

pub fn aggregate_agreements(
    agreements: &[AgreementRow],
    bordereaux: &[BordereauRow],
    conv: &CurrencyConverter<'_>,
) -> AgreementMetrics {
    let mut reported: HashMap<&str, (Decimal, u64)> = HashMap::new();
    for b in bordereaux {
        let Some(agreement_id) = b.agreement_id.as_deref() else {
            continue;
        };
        let premium = conv.to_usd(b.gross_premium, &b.currency, b.exchange_rate, b.period);
        let entry = reported.entry(agreement_id).or_default();
        entry.0 += premium;
        entry.1 += 1;
    }

    let mut m = AgreementMetrics::default();
    for a in agreements {
        let epi = conv.to_usd(a.epi, &a.currency, a.exchange_rate, a.inception_date);
        let (actual, count) = reported.get(a.id.as_str()).copied().unwrap_or_default();
        let active = StatusBucket::classify(&a.status) == StatusBucket::Active;

        m.total_agreements += 1;
        if active {
            m.active_agreements += 1;
        }
        m.total_epi += epi;
        m.total_actual_premium += actual;
        m.agreements.push(AgreementUtilization {
            agreement_id: a.id.clone(),
            agreement_number: a.agreement_number.clone(),
            name: a.name.clone(),
            active,
            epi,
            actual_premium: actual,
            bordereau_count: count,
            utilization_pct: percent_of(actual, epi),
        });
    }

    m.utilization_pct = percent_of(m.total_actual_premium, m.total_epi);
    m.agreements.sort_by(|a, b| {
        b.utilization_pct
            .cmp(&a.utilization_pct)
            .then_with(|| a.agreement_id.cmp(&b.agreement_id))
    });
    m
}
