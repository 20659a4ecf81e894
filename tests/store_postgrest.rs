//! PostgREST client against an in-process mock store

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use mosaic_analytics::analytics::{AnalyticsContext, AnalyticsService};
use mosaic_analytics::config::StoreConfig;
use mosaic_analytics::currency::RateTable;
use mosaic_analytics::search::{parse_search, to_postgrest_params, BROAD_COLUMNS};
use mosaic_analytics::store::{Collection, PostgrestClient, RowSource};
use mosaic_analytics::StoreError;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use url::Url;

const KEY: &str = "test-anon-key";

fn policy_rows() -> Vec<Value> {
    (1..=5)
        .map(|i| {
            json!({"id": format!("p{}", i), "policy_number": format!("P-{}", i),
                   "gross_premium": 100 * i, "status": "Active"})
        })
        .collect()
}

fn authorized(headers: &HeaderMap) -> bool {
    let bearer = format!("Bearer {}", KEY);
    headers.get("apikey").is_some_and(|v| v == KEY)
        && headers.get("authorization").is_some_and(|v| v == bearer.as_str())
}

async fn table(
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Invalid API key"})))
            .into_response();
    }
    // Search requests carry a filter; echo it back for inspection
    if let Some(filter) = params.get("or") {
        let known = table_columns(&table);
        if let Some(unknown) = or_columns(filter).find(|c| !known.contains(c)) {
            let message = format!("column {}.{} does not exist", table, unknown);
            return (StatusCode::BAD_REQUEST, Json(json!({"code": "42703", "message": message})))
                .into_response();
        }
        return Json(json!([{"id": "echo", "or": filter}])).into_response();
    }
    if let Some(filter) = params.get("broker_name") {
        return Json(json!([{"id": "echo", "broker_name": filter}])).into_response();
    }

    let rows = match table.as_str() {
        "policies" => policy_rows(),
        // Plain reads of this table fail
        "inward_reinsurance" => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "relation error").into_response()
        }
        _ => Vec::new(),
    };

    let offset: usize = params.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
    let limit: usize = params.get("limit").and_then(|v| v.parse().ok()).unwrap_or(usize::MAX);
    let page: Vec<Value> = rows.into_iter().skip(offset).take(limit).collect();
    Json(page).into_response()
}

fn table_columns(table: &str) -> &'static [&'static str] {
    match table {
        "policies" => &[
            "id", "policy_number", "insured_name", "broker_name", "reinsurer_name",
            "class_of_insurance", "territory", "gross_premium", "status",
        ],
        "inward_reinsurance" => &[
            "id", "contract_number", "cedant_name", "broker_name", "original_insured_name",
            "class_of_cover", "territory", "gross_premium", "status",
        ],
        _ => &["id"],
    }
}

/// Column names of `(a.ilike.*x*,b.ilike.*x*)`
fn or_columns(filter: &str) -> impl Iterator<Item = &str> {
    filter
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .filter_map(|condition| condition.split('.').next())
}

async fn claims_rpc(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!([{"id": "c1", "own_share_incurred": 80, "own_share_paid": 30}])).into_response()
}

async fn reject_update() -> Response {
    (
        StatusCode::CONFLICT,
        Json(json!({"code": "23505", "message": "duplicate key"})),
    )
        .into_response()
}

async fn spawn_store() -> Url {
    let app = Router::new()
        .route("/rest/v1/rpc/claims_own_share", post(claims_rpc))
        .route("/rest/v1/:table", get(table).patch(reject_update));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{}", addr)).unwrap()
}

fn client(url: Url, key: &str, page_size: usize) -> PostgrestClient {
    let mut config = StoreConfig::new(url, key).with_claims_rpc("claims_own_share");
    config.page_size = page_size;
    PostgrestClient::new(&config).unwrap()
}

#[tokio::test]
async fn test_select_pages_until_short_page() {
    let store = client(spawn_store().await, KEY, 2);
    let rows = store.fetch_rows(Collection::Policies).await.unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["p1", "p2", "p3", "p4", "p5"]);
}

#[tokio::test]
async fn test_bad_key_is_a_status_error() {
    let store = client(spawn_store().await, "wrong", 100);
    let err = store.fetch_rows(Collection::Policies).await.unwrap_err();
    match err {
        StoreError::Status { table, status, body } => {
            assert_eq!(table, "policies");
            assert_eq!(status, 401);
            assert!(body.contains("Invalid API key"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_writes_return_the_store_error() {
    let store = client(spawn_store().await, KEY, 100);
    let err = store
        .update("policies", "p1", &json!({"status": "Cancelled"}))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Status { status: 409, .. }));
}

#[tokio::test]
async fn test_search_sends_field_filters() {
    let store = client(spawn_store().await, KEY, 100);
    let rows = store
        .search(Collection::Policies, &parse_search("broker:Howden"))
        .await
        .unwrap();
    assert_eq!(rows[0]["broker_name"], "ilike.*Howden*");
}

#[tokio::test]
async fn test_broad_terms_only_name_the_table_columns() {
    let store = client(spawn_store().await, KEY, 100);

    let rows = store
        .search(Collection::Policies, &parse_search("Indonesia"))
        .await
        .unwrap();
    let sent = rows[0]["or"].as_str().unwrap();
    assert!(sent.contains("insured_name.ilike.*Indonesia*"));
    assert!(!sent.contains("cedant_name"));

    let rows = store
        .search(Collection::InwardReinsurance, &parse_search("Indonesia"))
        .await
        .unwrap();
    assert!(rows[0]["or"].as_str().unwrap().contains("cedant_name.ilike"));

    // The union of every table's columns is refused by the store
    let err = store
        .select("policies", &to_postgrest_params(&parse_search("Indonesia"), BROAD_COLUMNS))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Status { status: 400, .. }));
}

#[tokio::test]
async fn test_broad_term_on_a_table_without_text_columns_matches_nothing() {
    let store = client(spawn_store().await, KEY, 100);
    let rows = store
        .search(Collection::Bordereaux, &parse_search("Indonesia"))
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_service_survives_a_failing_table() {
    let store = client(spawn_store().await, KEY, 2);
    let context = AnalyticsContext::new(
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        Arc::new(RateTable::approximate()),
    );
    let (summary, stats) = AnalyticsService::new(store, context).run().await;

    assert_eq!(stats.direct, 5);
    assert_eq!(stats.inward, 0);
    assert_eq!(stats.claims, 1);
    assert_eq!(summary.direct.gross_written_premium, dec!(1500));
    assert_eq!(summary.claims.total_reserve, dec!(50));
}
