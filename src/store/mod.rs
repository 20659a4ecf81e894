//! Row fetching
//!
//! Analytics reads five logical collections. Where they come from is behind
//! [`RowSource`]: PostgREST over HTTP ([`PostgrestClient`]), Postgres directly
//! ([`PgRowSource`], `database` feature), or an in-memory [`RawPortfolio`]
//! loaded from a JSON dump.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::ingest::RawPortfolio;

mod postgrest;
#[cfg(feature = "database")]
mod postgres;

pub use postgrest::PostgrestClient;
#[cfg(feature = "database")]
pub use postgres::PgRowSource;

/// Logical collections in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Direct and outward policy rows
    Policies,
    InwardReinsurance,
    Claims,
    BindingAgreements,
    Bordereaux,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Policies,
        Collection::InwardReinsurance,
        Collection::Claims,
        Collection::BindingAgreements,
        Collection::Bordereaux,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            Collection::Policies => "policies",
            Collection::InwardReinsurance => "inward_reinsurance",
            Collection::Claims => "claims",
            Collection::BindingAgreements => "binding_agreements",
            Collection::Bordereaux => "bordereaux",
        }
    }

    pub fn from_table(table: &str) -> Option<Collection> {
        Collection::ALL.into_iter().find(|c| c.table() == table)
    }

    /// Text columns of this table a broad search term is tried against.
    /// Every name exists on the table, so a remote `or=(...)` never names a
    /// foreign column.
    pub fn broad_columns(&self) -> &'static [&'static str] {
        match self {
            Collection::Policies => &[
                "policy_number",
                "insured_name",
                "broker_name",
                "reinsurer_name",
                "class_of_insurance",
                "territory",
            ],
            Collection::InwardReinsurance => &[
                "contract_number",
                "cedant_name",
                "broker_name",
                "original_insured_name",
                "class_of_cover",
                "territory",
            ],
            Collection::Claims => &["claim_number", "slip_number", "contract_number"],
            Collection::BindingAgreements => &["agreement_number"],
            Collection::Bordereaux => &[],
        }
    }
}

/// Anything that can hand back the raw rows of a collection
#[async_trait]
pub trait RowSource: Send + Sync {
    async fn fetch_rows(&self, collection: Collection) -> StoreResult<Vec<Value>>;
}

#[async_trait]
impl RowSource for RawPortfolio {
    async fn fetch_rows(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        let rows = match collection {
            Collection::Policies => &self.policies,
            Collection::InwardReinsurance => &self.inward,
            Collection::Claims => &self.claims,
            Collection::BindingAgreements => &self.agreements,
            Collection::Bordereaux => &self.bordereaux,
        };
        Ok(rows.clone())
    }
}

/// Table, column and function names are interpolated into URLs and SQL, so
/// only plain lowercase identifiers pass
pub(crate) fn validate_identifier(name: &str) -> StoreResult<&str> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}
