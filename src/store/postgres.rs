//! Direct Postgres row source
//!
//! Same collections as the PostgREST path, read with `to_jsonb` so the row
//! adapter sees the column names it already knows.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use super::{validate_identifier, Collection, RowSource};
use crate::error::StoreResult;

pub struct PgRowSource {
    pool: PgPool,
    claims_function: Option<String>,
}

impl PgRowSource {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            claims_function: None,
        }
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Read claims from a set-returning function instead of the table
    pub fn with_claims_function(mut self, function: &str) -> StoreResult<Self> {
        self.claims_function = Some(validate_identifier(function)?.to_string());
        Ok(self)
    }

    async fn query_json(&self, sql: &str) -> StoreResult<Vec<Value>> {
        let rows: Vec<(Value,)> = sqlx::query_as(sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(row,)| row).collect())
    }
}

/// Query returning each row of `collection` as one JSON object
fn collection_sql(collection: Collection, claims_function: Option<&str>) -> StoreResult<String> {
    match (collection, claims_function) {
        (Collection::Claims, Some(function)) => Ok(format!(
            "SELECT to_jsonb(c) FROM {}() c",
            validate_identifier(function)?
        )),
        _ => Ok(format!(
            "SELECT to_jsonb(t) FROM {} t ORDER BY t.id",
            validate_identifier(collection.table())?
        )),
    }
}

#[async_trait]
impl RowSource for PgRowSource {
    async fn fetch_rows(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        let sql = collection_sql(collection, self.claims_function.as_deref())?;
        let rows = self.query_json(&sql).await?;
        tracing::debug!(table = collection.table(), rows = rows.len(), "Fetched rows");
        Ok(rows)
    }
}
