//! PostgREST client
//!
//! Reads page through `limit`/`offset` until a short page comes back. Writes
//! ask for the affected rows back and return the store's error unchanged;
//! unlike analytics reads, they never fall back.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

use super::{validate_identifier, Collection, RowSource};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::search::{to_postgrest_params, SearchFilter};

const REST_PATH: &str = "rest/v1";
const REQUEST_TIMEOUT_SECS: u64 = 30;

pub struct PostgrestClient {
    client: Client,
    base: String,
    api_key: String,
    page_size: usize,
    claims_rpc: Option<String>,
}

impl PostgrestClient {
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|source| StoreError::Http {
                table: String::new(),
                source,
            })?;

        if let Some(rpc) = &config.claims_rpc {
            validate_identifier(rpc)?;
        }

        Ok(Self {
            client,
            base: config.url.as_str().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            page_size: config.page_size.max(1),
            claims_rpc: config.claims_rpc.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base, REST_PATH, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// All rows of `table` matching `params`, fetched page by page
    pub async fn select(&self, table: &str, params: &[(String, String)]) -> StoreResult<Vec<Value>> {
        let table = validate_identifier(table)?;
        let url = self.endpoint(table);
        let mut rows = Vec::new();
        let mut offset = 0usize;

        loop {
            let request = self
                .client
                .get(&url)
                .query(params)
                .query(&[
                    ("limit", self.page_size.to_string()),
                    ("offset", offset.to_string()),
                ]);
            let page = self.send_rows(table, self.authorized(request)).await?;
            let fetched = page.len();
            rows.extend(page);

            if fetched < self.page_size {
                break;
            }
            offset += fetched;
        }

        tracing::debug!(table, rows = rows.len(), "Fetched rows");
        Ok(rows)
    }

    /// Call a stored procedure returning a set of rows
    pub async fn rpc(&self, function: &str, args: &Value) -> StoreResult<Vec<Value>> {
        let function = validate_identifier(function)?;
        let url = self.endpoint(&format!("rpc/{}", function));
        let request = self.client.post(url).json(args);
        self.send_rows(function, self.authorized(request)).await
    }

    pub async fn insert(&self, table: &str, row: &Value) -> StoreResult<Vec<Value>> {
        let table = validate_identifier(table)?;
        let request = self
            .client
            .post(self.endpoint(table))
            .header("Prefer", "return=representation")
            .json(row);
        self.send_rows(table, self.authorized(request)).await
    }

    pub async fn update(&self, table: &str, id: &str, patch: &Value) -> StoreResult<Vec<Value>> {
        let table = validate_identifier(table)?;
        let request = self
            .client
            .patch(self.endpoint(table))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(patch);
        self.send_rows(table, self.authorized(request)).await
    }

    pub async fn delete(&self, table: &str, id: &str) -> StoreResult<()> {
        let table = validate_identifier(table)?;
        let request = self
            .client
            .delete(self.endpoint(table))
            .query(&[("id", format!("eq.{}", id))]);
        self.send(table, self.authorized(request)).await?;
        Ok(())
    }

    /// Rows of `collection` matching every filter; `_any` terms are tried
    /// against the collection's own [`Collection::broad_columns`]. A table
    /// with no text columns cannot match a broad term.
    pub async fn search(
        &self,
        collection: Collection,
        filters: &[SearchFilter],
    ) -> StoreResult<Vec<Value>> {
        let broad_columns = collection.broad_columns();
        if broad_columns.is_empty() && filters.iter().any(SearchFilter::is_any) {
            return Ok(Vec::new());
        }
        for filter in filters.iter().filter(|f| !f.is_any()) {
            validate_identifier(&filter.field)?;
        }
        let params = to_postgrest_params(filters, broad_columns);
        self.select(collection.table(), &params).await
    }

    async fn send(&self, table: &str, request: RequestBuilder) -> StoreResult<Response> {
        let response = request.send().await.map_err(|source| StoreError::Http {
            table: table.to_string(),
            source,
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(table, status = status.as_u16(), "Store request rejected");
        Err(StoreError::Status {
            table: table.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    async fn send_rows(&self, table: &str, request: RequestBuilder) -> StoreResult<Vec<Value>> {
        let response = self.send(table, request).await?;
        let text = response.text().await.map_err(|source| StoreError::Http {
            table: table.to_string(),
            source,
        })?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Array(rows)) => Ok(rows),
            Ok(Value::Null) => Ok(Vec::new()),
            Ok(single @ Value::Object(_)) => Ok(vec![single]),
            Ok(other) => Err(StoreError::Decode {
                table: table.to_string(),
                message: format!("expected rows, got {}", other),
            }),
            Err(e) => Err(StoreError::Decode {
                table: table.to_string(),
                message: format!(
                    "{} (first 200 chars: {})",
                    e,
                    text.chars().take(200).collect::<String>()
                ),
            }),
        }
    }
}

#[async_trait]
impl RowSource for PostgrestClient {
    async fn fetch_rows(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        match (collection, &self.claims_rpc) {
            (Collection::Claims, Some(rpc)) => self.rpc(rpc, &Value::Object(Default::default())).await,
            _ => {
                let params = [
                    ("select".to_string(), "*".to_string()),
                    ("order".to_string(), "id.asc".to_string()),
                ];
                self.select(collection.table(), &params).await
            }
        }
    }
}
