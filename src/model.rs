//! Canonical row types
//!
//! One typed shape per source entity, produced once by [`crate::ingest`].
//! Amounts are in the row's own currency; missing numbers are already zero.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// ENUMS
// =============================================================================

/// Where inward business was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Origin {
    Foreign,
    Domestic,
}

impl Origin {
    /// Read an explicit origin column
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "FOREIGN" => Some(Origin::Foreign),
            "DOMESTIC" => Some(Origin::Domestic),
            _ => None,
        }
    }

    /// Derive origin from territory and currency when the column is blank:
    /// Uzbek territory or UZS business is domestic
    pub fn derive(territory: Option<&str>, currency: &str) -> Self {
        if let Some(t) = territory {
            let t = t.trim().to_lowercase();
            if t.contains("uzbek") || t == "uz" {
                return Origin::Domestic;
            }
        }
        if currency.trim().eq_ignore_ascii_case("UZS") {
            return Origin::Domestic;
        }
        Origin::Foreign
    }
}

/// Treaty structure of an inward contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Structure {
    #[default]
    Proportional,
    NonProportional,
}

impl Structure {
    /// `XL`, `EXCESS` or anything with `NON` is non-proportional
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) => {
                let v = v.trim().to_uppercase();
                if v.contains("XL") || v.contains("EXCESS") || v.contains("NON") {
                    Structure::NonProportional
                } else {
                    Structure::Proportional
                }
            }
            None => Structure::Proportional,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Structure::Proportional => "PROPORTIONAL",
            Structure::NonProportional => "NON_PROPORTIONAL",
        }
    }
}

// =============================================================================
// ROWS
// =============================================================================

/// Direct insurance policy row; rows sharing a policy number are installments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyRow {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub policy_number: Option<String>,
    pub status: String,
    pub currency: String,
    pub exchange_rate: Decimal,
    pub gross_premium: Decimal,
    pub net_premium: Decimal,
    pub commission_percent: Decimal,
    pub sum_insured: Decimal,
    pub our_share: Decimal,
    pub class_code: Option<String>,
    pub insured_name: Option<String>,
    pub broker_name: Option<String>,
    pub territory: Option<String>,
    pub inception_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

/// One reinsurer participation on a ceded policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutwardRow {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub policy_number: Option<String>,
    pub slip_number: Option<String>,
    pub status: String,
    pub currency: String,
    pub exchange_rate: Decimal,
    /// Premium of the underlying policy, repeated on every participation
    pub original_gross_premium: Decimal,
    pub sum_insured: Decimal,
    pub ceded_share: Decimal,
    pub ceded_premium: Decimal,
    pub reinsurance_commission: Decimal,
    pub reinsurer_name: Option<String>,
    pub broker_name: Option<String>,
    pub class_code: Option<String>,
    pub insured_name: Option<String>,
    pub inception_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

/// Inward reinsurance contract row; rows sharing a contract number are
/// installments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InwardRow {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub contract_number: Option<String>,
    pub origin: Option<Origin>,
    pub structure: Structure,
    pub status: String,
    pub currency: String,
    pub exchange_rate: Decimal,
    pub gross_premium: Decimal,
    pub net_premium: Decimal,
    /// Raw value; may be a fraction or a percentage
    pub our_share: Decimal,
    /// Raw value; may be a fraction or a percentage
    pub commission_percent: Decimal,
    pub limit_of_liability: Decimal,
    pub class_code: Option<String>,
    pub cedant_name: Option<String>,
    pub broker_name: Option<String>,
    pub territory: Option<String>,
    pub inception_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

impl InwardRow {
    /// Explicit origin, else derived from territory and currency
    pub fn resolved_origin(&self) -> Origin {
        self.origin
            .unwrap_or_else(|| Origin::derive(self.territory.as_deref(), &self.currency))
    }
}

/// Claim row with amounts already in our share
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimRow {
    pub id: String,
    pub policy_id: Option<String>,
    pub inward_reinsurance_id: Option<String>,
    pub claim_number: Option<String>,
    pub status: Option<String>,
    pub currency: String,
    pub exchange_rate: Decimal,
    pub incurred: Decimal,
    pub paid: Decimal,
    pub outstanding: Decimal,
    pub loss_date: Option<NaiveDate>,
}

/// Binding / MGA agreement with its estimated premium income ceiling
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgreementRow {
    pub id: String,
    pub agreement_number: Option<String>,
    pub name: Option<String>,
    pub status: String,
    pub currency: String,
    pub exchange_rate: Decimal,
    pub epi: Decimal,
    pub inception_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

/// Premium reported under an agreement for one period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BordereauRow {
    pub id: String,
    pub agreement_id: Option<String>,
    pub period: Option<NaiveDate>,
    pub currency: String,
    pub exchange_rate: Decimal,
    pub gross_premium: Decimal,
}

/// All canonical rows of one fetch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortfolioRows {
    pub direct: Vec<PolicyRow>,
    pub outward: Vec<OutwardRow>,
    pub inward: Vec<InwardRow>,
    pub claims: Vec<ClaimRow>,
    pub agreements: Vec<AgreementRow>,
    pub bordereaux: Vec<BordereauRow>,
}
