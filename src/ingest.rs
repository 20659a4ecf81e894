//! Row adapter
//!
//! The store and the spreadsheet imports that fed it disagree on key casing
//! (`grossPremium` vs `gross_premium`) and on which column holds a value.
//! Every raw row is read here exactly once, with a fixed precedence list per
//! field; everything downstream works on the typed rows of [`crate::model`].
//!
//! Nothing is rejected. A missing or unreadable number becomes zero and the
//! fallback is counted in [`IngestStats`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analytics::measures::{apply_percent, normalize_percent};
use crate::coerce::{self, Coerced};
use crate::model::{
    AgreementRow, BordereauRow, ClaimRow, InwardRow, Origin, OutwardRow, PolicyRow,
    PortfolioRows, Structure,
};

// =============================================================================
// FIELD PRECEDENCE
// =============================================================================

// Shared
const ID: &[&str] = &["id"];
const CREATED_AT: &[&str] = &["createdAt", "created_at"];
const STATUS: &[&str] = &["status"];
const CURRENCY: &[&str] = &["currency", "currencyCode", "currency_code"];
const EXCHANGE_RATE: &[&str] = &[
    "exchangeRateUSD",
    "exchange_rate_usd",
    "exchangeRate",
    "exchange_rate",
];
const GROSS_PREMIUM: &[&str] = &[
    "grossPremium",
    "gross_premium",
    "grossPremiumOriginal",
    "gross_premium_original",
];
const NET_PREMIUM: &[&str] = &["netPremium", "net_premium"];
const COMMISSION: &[&str] = &["commissionPercent", "commission_percent", "commission"];
const OUR_SHARE: &[&str] = &["ourShare", "our_share"];
const BROKER: &[&str] = &[
    "brokerName",
    "broker_name",
    "intermediaryName",
    "intermediary_name",
];
const TERRITORY: &[&str] = &["territory", "country"];
const INCEPTION: &[&str] = &["inceptionDate", "inception_date", "startDate", "start_date"];
const EXPIRY: &[&str] = &["expiryDate", "expiry_date", "endDate", "end_date"];

// Policies (direct and outward)
const RECORD_TYPE: &[&str] = &["recordType", "record_type", "channel"];
const POLICY_NUMBER: &[&str] = &["policyNumber", "policy_number"];
const SUM_INSURED: &[&str] = &[
    "sumInsured",
    "sum_insured",
    "limitForeignCurrency",
    "limit_foreign_currency",
];
const POLICY_CLASS: &[&str] = &[
    "classOfInsurance",
    "class_of_insurance",
    "classCode",
    "class_code",
    "class_of_business",
];
const INSURED: &[&str] = &["insuredName", "insured_name"];
const SLIP: &[&str] = &["slipNumber", "slip_number", "referenceNumber", "reference_number"];
const REINSURER: &[&str] = &["reinsurerName", "reinsurer_name", "reinsurer"];
const CEDED_SHARE: &[&str] = &["cededShare", "ceded_share", "reinsurerShare", "reinsurer_share"];
const CEDED_PREMIUM: &[&str] = &[
    "cededPremiumForeign",
    "ceded_premium_foreign",
    "cededPremium",
    "ceded_premium",
];
const REINS_COMMISSION: &[&str] = &[
    "reinsuranceCommission",
    "reinsurance_commission",
    "reinsCommission",
];
const REINS_INCEPTION: &[&str] = &["reinsuranceInceptionDate", "reinsurance_inception_date"];
const REINS_EXPIRY: &[&str] = &["reinsuranceExpiryDate", "reinsurance_expiry_date"];
const REINSURERS: &[&str] = &["reinsurers"];

// Embedded reinsurer entries
const ENTRY_NAME: &[&str] = &["name", "reinsurerName", "reinsurer_name"];
const ENTRY_SHARE: &[&str] = &["share", "cededShare", "ceded_share"];
const ENTRY_PREMIUM: &[&str] = &["premium", "cededPremium", "ceded_premium"];
const ENTRY_COMMISSION: &[&str] = &["commission", "reinsuranceCommission"];

// Inward reinsurance
const CONTRACT_NUMBER: &[&str] = &["contractNumber", "contract_number"];
const ORIGIN: &[&str] = &["origin"];
const STRUCTURE: &[&str] = &["structure", "structureType", "structure_type"];
const LIMIT: &[&str] = &["limitOfLiability", "limit_of_liability", "limit"];
const COVER_CLASS: &[&str] = &[
    "classOfCover",
    "class_of_cover",
    "classOfBusiness",
    "class_of_business",
];
const CEDANT: &[&str] = &["cedantName", "cedant_name", "cedant"];

// Claims: own-share columns of the pre-joined view win over raw totals
const POLICY_ID: &[&str] = &["policyId", "policy_id"];
const INWARD_ID: &[&str] = &["inwardReinsuranceId", "inward_reinsurance_id"];
const CLAIM_NUMBER: &[&str] = &["claimNumber", "claim_number"];
const INCURRED: &[&str] = &[
    "own_share_incurred",
    "total_incurred_our_share",
    "totalIncurredOurShare",
    "total_incurred",
    "totalIncurred",
    "imported_total_incurred",
    "incurred",
];
const PAID: &[&str] = &[
    "own_share_paid",
    "total_paid_our_share",
    "totalPaidOurShare",
    "total_paid",
    "totalPaid",
    "imported_total_paid",
    "paid",
];
const OUTSTANDING: &[&str] = &[
    "own_share_outstanding",
    "outstanding_our_share",
    "total_outstanding",
    "totalOutstanding",
    "outstanding",
];
const LOSS_DATE: &[&str] = &["lossDate", "loss_date", "dateOfLoss", "date_of_loss"];

// Agreements and bordereaux
const AGREEMENT_NUMBER: &[&str] = &["agreementNumber", "agreement_number"];
const AGREEMENT_NAME: &[&str] = &["name", "mgaName", "mga_name", "holderName", "holder_name"];
const EPI: &[&str] = &["epi", "estimatedPremiumIncome", "estimated_premium_income"];
const AGREEMENT_ID: &[&str] = &[
    "agreementId",
    "agreement_id",
    "bindingAgreementId",
    "binding_agreement_id",
];
const PERIOD: &[&str] = &["period", "periodStart", "period_start", "reportingPeriod"];
const BORDEREAU_PREMIUM: &[&str] = &["grossPremium", "gross_premium", "premium"];

// Search-only: columns a search box may name that no typed row carries
const ORIGINAL_INSURED: &[&str] = &["originalInsuredName", "original_insured_name"];
const ANY_CLASS: &[&str] = &[
    "classOfInsurance",
    "class_of_insurance",
    "classCode",
    "class_code",
    "classOfBusiness",
    "class_of_business",
    "classOfCover",
    "class_of_cover",
];

const DEFAULT_CURRENCY: &str = "USD";

/// Row keys read for a search column, in the same precedence ingestion uses.
/// `None` for columns only ever stored under their own name.
pub(crate) fn search_keys(column: &str) -> Option<&'static [&'static str]> {
    let keys = match column {
        "broker_name" => BROKER,
        "cedant_name" => CEDANT,
        "insured_name" => INSURED,
        "original_insured_name" => ORIGINAL_INSURED,
        "reinsurer_name" => REINSURER,
        "policy_number" => POLICY_NUMBER,
        "contract_number" => CONTRACT_NUMBER,
        "claim_number" => CLAIM_NUMBER,
        "reference_number" | "slip_number" => SLIP,
        "agreement_number" => AGREEMENT_NUMBER,
        "class_of_business" => ANY_CLASS,
        "class_of_insurance" => POLICY_CLASS,
        "class_of_cover" => COVER_CLASS,
        "territory" => TERRITORY,
        "currency" => CURRENCY,
        "status" => STATUS,
        _ => return None,
    };
    Some(keys)
}

// =============================================================================
// RAW INPUT
// =============================================================================

/// Untyped rows exactly as the store (or a JSON dump) returned them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPortfolio {
    #[serde(default)]
    pub policies: Vec<Value>,
    #[serde(default, alias = "inward_reinsurance")]
    pub inward: Vec<Value>,
    #[serde(default)]
    pub claims: Vec<Value>,
    #[serde(default, alias = "binding_agreements")]
    pub agreements: Vec<Value>,
    #[serde(default)]
    pub bordereaux: Vec<Value>,
}

/// What ingestion produced and how often it had to fall back
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub direct: usize,
    pub outward: usize,
    pub inward: usize,
    pub claims: usize,
    pub agreements: usize,
    pub bordereaux: usize,
    /// Participations created from embedded `reinsurers` arrays
    pub expanded_participations: usize,
    /// Present but unreadable values replaced by a default
    pub invalid_values: usize,
}

impl RawPortfolio {
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
            && self.inward.is_empty()
            && self.claims.is_empty()
            && self.agreements.is_empty()
            && self.bordereaux.is_empty()
    }

    /// Adapt every raw row to its canonical shape
    pub fn normalize(&self) -> (PortfolioRows, IngestStats) {
        let mut invalid = 0;
        let mut rows = PortfolioRows::default();
        let mut expanded = 0;

        for raw in &self.policies {
            let mut r = RowReader::new(raw);
            match policy_kind(&r) {
                PolicyKind::Direct => rows.direct.push(read_policy(&mut r)),
                PolicyKind::Outward => {
                    let (participations, from_array) = read_outward(&mut r);
                    if from_array {
                        expanded += participations.len();
                    }
                    rows.outward.extend(participations);
                }
            }
            invalid += r.invalid;
        }

        macro_rules! adapt {
            ($source:expr, $target:expr, $read:ident) => {
                for raw in &$source {
                    let mut r = RowReader::new(raw);
                    $target.push($read(&mut r));
                    invalid += r.invalid;
                }
            };
        }
        adapt!(self.inward, rows.inward, read_inward);
        adapt!(self.claims, rows.claims, read_claim);
        adapt!(self.agreements, rows.agreements, read_agreement);
        adapt!(self.bordereaux, rows.bordereaux, read_bordereau);

        let stats = IngestStats {
            direct: rows.direct.len(),
            outward: rows.outward.len(),
            inward: rows.inward.len(),
            claims: rows.claims.len(),
            agreements: rows.agreements.len(),
            bordereaux: rows.bordereaux.len(),
            expanded_participations: expanded,
            invalid_values: invalid,
        };
        tracing::debug!(?stats, "Normalized portfolio rows");
        (rows, stats)
    }
}

// =============================================================================
// ROW READER
// =============================================================================

/// Field access over one raw row, counting fallbacks
struct RowReader<'a> {
    row: &'a Value,
    invalid: usize,
}

impl<'a> RowReader<'a> {
    fn new(row: &'a Value) -> Self {
        Self { row, invalid: 0 }
    }

    /// First key holding something other than null or blank text
    fn pick(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter().find_map(|k| match self.row.get(*k) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(v) => Some(v),
        })
    }

    fn coerced<T: Default>(&mut self, keys: &[&str], parsed: Coerced<T>) -> T {
        if let Coerced::Invalid(raw) = &parsed {
            tracing::debug!(field = keys[0], raw = %raw, "Unreadable value, using default");
            self.invalid += 1;
        }
        parsed.or_default()
    }

    fn number(&mut self, keys: &[&str]) -> Decimal {
        let parsed = coerce::number(self.pick(keys));
        self.coerced(keys, parsed)
    }

    fn number_opt(&mut self, keys: &[&str]) -> Option<Decimal> {
        self.pick(keys)?;
        Some(self.number(keys))
    }

    fn date(&mut self, keys: &[&str]) -> Option<chrono::NaiveDate> {
        let parsed = coerce::date(self.pick(keys)).map(Some);
        self.coerced(keys, parsed)
    }

    fn text(&self, keys: &[&str]) -> Option<String> {
        coerce::text(self.pick(keys))
    }

    fn id(&self) -> String {
        self.text(ID).unwrap_or_default()
    }

    fn currency(&self) -> String {
        self.text(CURRENCY)
            .map(|c| c.to_uppercase())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
    }

    fn status(&self) -> String {
        self.text(STATUS).unwrap_or_default()
    }

    fn created_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        coerce::timestamp(self.pick(CREATED_AT))
    }
}

// =============================================================================
// POLICIES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PolicyKind {
    Direct,
    Outward,
}

/// Explicit record type wins; otherwise any reinsurer data makes it outward
fn policy_kind(r: &RowReader<'_>) -> PolicyKind {
    if let Some(kind) = r.text(RECORD_TYPE) {
        match kind.to_uppercase().as_str() {
            "OUTWARD" => return PolicyKind::Outward,
            "DIRECT" => return PolicyKind::Direct,
            _ => {}
        }
    }

    let has_reinsurer = r.text(REINSURER).is_some();
    let has_ceded = !coerce::number(r.pick(CEDED_PREMIUM)).or_default().is_zero();
    let has_entries = !reinsurer_entries(r.pick(REINSURERS)).is_empty();
    if has_reinsurer || has_ceded || has_entries {
        PolicyKind::Outward
    } else {
        PolicyKind::Direct
    }
}

fn read_policy(r: &mut RowReader<'_>) -> PolicyRow {
    PolicyRow {
        id: r.id(),
        created_at: r.created_at(),
        policy_number: r.text(POLICY_NUMBER),
        status: r.status(),
        currency: r.currency(),
        exchange_rate: r.number(EXCHANGE_RATE),
        gross_premium: r.number(GROSS_PREMIUM),
        net_premium: r.number(NET_PREMIUM),
        commission_percent: r.number(COMMISSION),
        sum_insured: r.number(SUM_INSURED),
        our_share: r.number(OUR_SHARE),
        class_code: r.text(POLICY_CLASS),
        insured_name: r.text(INSURED),
        broker_name: r.text(BROKER),
        territory: r.text(TERRITORY),
        inception_date: r.date(INCEPTION),
        expiry_date: r.date(EXPIRY),
    }
}

/// One participation per embedded reinsurer, or the row itself; the flag
/// says whether an embedded array was expanded
fn read_outward(r: &mut RowReader<'_>) -> (Vec<OutwardRow>, bool) {
    let base = OutwardRow {
        id: r.id(),
        created_at: r.created_at(),
        policy_number: r.text(POLICY_NUMBER),
        slip_number: r.text(SLIP),
        status: r.status(),
        currency: r.currency(),
        exchange_rate: r.number(EXCHANGE_RATE),
        original_gross_premium: r.number(GROSS_PREMIUM),
        sum_insured: r.number(SUM_INSURED),
        ceded_share: r.number(CEDED_SHARE),
        ceded_premium: r.number(CEDED_PREMIUM),
        reinsurance_commission: r.number(REINS_COMMISSION),
        reinsurer_name: r.text(REINSURER),
        broker_name: r.text(BROKER),
        class_code: r.text(POLICY_CLASS),
        insured_name: r.text(INSURED),
        inception_date: r.date(REINS_INCEPTION).or_else(|| r.date(INCEPTION)),
        expiry_date: r.date(REINS_EXPIRY).or_else(|| r.date(EXPIRY)),
    };

    let entries = reinsurer_entries(r.pick(REINSURERS));
    if entries.is_empty() {
        return (vec![base], false);
    }

    let participations = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let mut e = RowReader::new(entry);
            let share = e.number(ENTRY_SHARE);
            // Entries without a premium take their share of the original
            let premium = e.number_opt(ENTRY_PREMIUM).unwrap_or_else(|| {
                apply_percent(base.original_gross_premium, normalize_percent(share))
            });
            let row = OutwardRow {
                id: format!("{}:{}", base.id, i),
                reinsurer_name: e.text(ENTRY_NAME).or_else(|| base.reinsurer_name.clone()),
                ceded_share: share,
                ceded_premium: premium,
                reinsurance_commission: e
                    .number_opt(ENTRY_COMMISSION)
                    .unwrap_or(base.reinsurance_commission),
                ..base.clone()
            };
            r.invalid += e.invalid;
            row
        })
        .collect();
    (participations, true)
}

/// `reinsurers` may be a JSON array or a string holding one
fn reinsurer_entries(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.iter().filter(|v| v.is_object()).cloned().collect(),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ Value::Array(_)) => reinsurer_entries(Some(&parsed)),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

// =============================================================================
// INWARD, CLAIMS, AGREEMENTS
// =============================================================================

fn read_inward(r: &mut RowReader<'_>) -> InwardRow {
    InwardRow {
        id: r.id(),
        created_at: r.created_at(),
        contract_number: r.text(CONTRACT_NUMBER),
        origin: r.text(ORIGIN).and_then(|o| Origin::parse(&o)),
        structure: Structure::parse(r.text(STRUCTURE).as_deref()),
        status: r.status(),
        currency: r.currency(),
        exchange_rate: r.number(EXCHANGE_RATE),
        gross_premium: r.number(GROSS_PREMIUM),
        net_premium: r.number(NET_PREMIUM),
        our_share: r.number(OUR_SHARE),
        commission_percent: r.number(COMMISSION),
        limit_of_liability: r.number(LIMIT),
        class_code: r.text(COVER_CLASS),
        cedant_name: r.text(CEDANT),
        broker_name: r.text(BROKER),
        territory: r.text(TERRITORY),
        inception_date: r.date(INCEPTION),
        expiry_date: r.date(EXPIRY),
    }
}

fn read_claim(r: &mut RowReader<'_>) -> ClaimRow {
    let paid = r.number(PAID);
    let outstanding = r.number(OUTSTANDING);
    let incurred = r.number_opt(INCURRED).unwrap_or(paid + outstanding);
    let status = r
        .text(STATUS)
        .unwrap_or_else(|| infer_claim_status(paid, outstanding).to_string());

    ClaimRow {
        id: r.id(),
        policy_id: r.text(POLICY_ID),
        inward_reinsurance_id: r.text(INWARD_ID),
        claim_number: r.text(CLAIM_NUMBER),
        status: Some(status),
        currency: r.currency(),
        exchange_rate: r.number(EXCHANGE_RATE),
        incurred,
        paid,
        outstanding,
        loss_date: r.date(LOSS_DATE),
    }
}

/// Status for claims imported without one
fn infer_claim_status(paid: Decimal, outstanding: Decimal) -> &'static str {
    if outstanding > Decimal::ZERO {
        "open"
    } else if paid > Decimal::ZERO {
        "closed"
    } else {
        "open"
    }
}

fn read_agreement(r: &mut RowReader<'_>) -> AgreementRow {
    AgreementRow {
        id: r.id(),
        agreement_number: r.text(AGREEMENT_NUMBER),
        name: r.text(AGREEMENT_NAME),
        status: r.status(),
        currency: r.currency(),
        exchange_rate: r.number(EXCHANGE_RATE),
        epi: r.number(EPI),
        inception_date: r.date(INCEPTION),
        expiry_date: r.date(EXPIRY),
    }
}

fn read_bordereau(r: &mut RowReader<'_>) -> BordereauRow {
    BordereauRow {
        id: r.id(),
        agreement_id: r.text(AGREEMENT_ID),
        period: r.date(PERIOD),
        currency: r.currency(),
        exchange_rate: r.number(EXCHANGE_RATE),
        gross_premium: r.number(BORDEREAU_PREMIUM),
    }
}
