//! Router tests against an in-process mock of the central-bank feed

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    routing::get,
    Json, Router,
};
use http_body_util::BodyExt;
use mosaic_rate_proxy::{build_router, ProxyConfig};
use mosaic_types::{CbuRateEntry, ProxyErrorEnvelope};
use serde_json::{json, Value};
use tower::ServiceExt;

fn feed(date: &str) -> Value {
    json!([
        {"id": 69, "Code": "840", "Ccy": "USD", "CcyNm_EN": "US Dollar",
         "Nominal": "1", "Rate": "12500.00", "Diff": "-3.1", "Date": date},
        {"id": 21, "Code": "978", "Ccy": "EUR", "CcyNm_EN": "Euro",
         "Nominal": "1", "Rate": "13750.00", "Diff": "4.2", "Date": date}
    ])
}

/// Serve `app` on an ephemeral port and return its base URL
async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn mock_upstream() -> String {
    let app = Router::new()
        .route("/json/", get(|| async { Json(feed("15.01.2024")) }))
        .route(
            "/json/all/2023-12-29/",
            get(|| async { Json(feed("29.12.2023")) }),
        )
        .route(
            "/json/all/2020-01-01/",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
        );
    spawn(app).await
}

fn proxy(upstream: String) -> Router {
    build_router(ProxyConfig {
        upstream,
        ..Default::default()
    })
    .unwrap()
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .uri(uri)
                .header(header::ORIGIN, "http://localhost:5173")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_latest_rates_are_forwarded_with_cache_and_cors() {
    let app = proxy(mock_upstream().await);
    let (status, headers, body) = get_json(app, "/api/rates").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=3600");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let entries: Vec<CbuRateEntry> = serde_json::from_value(body).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].ccy, "USD");
    assert_eq!(entries[0].date, "15.01.2024");
}

#[tokio::test]
async fn test_dated_request_uses_archive_path() {
    let app = proxy(mock_upstream().await);
    let (status, _, body) = get_json(app, "/api/rates?date=2023-12-29").await;

    assert_eq!(status, StatusCode::OK);
    let entries: Vec<CbuRateEntry> = serde_json::from_value(body).unwrap();
    assert_eq!(entries[1].ccy, "EUR");
    assert_eq!(entries[1].date, "29.12.2023");
}

#[tokio::test]
async fn test_upstream_error_status_passes_through() {
    let app = proxy(mock_upstream().await);
    let (status, headers, body) = get_json(app, "/api/rates?date=2020-01-01").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(headers.get(header::CACHE_CONTROL).is_none());
    let envelope: ProxyErrorEnvelope = serde_json::from_value(body).unwrap();
    assert_eq!(envelope.status, 503);
}

#[tokio::test]
async fn test_unknown_archive_date_is_upstream_404() {
    let app = proxy(mock_upstream().await);
    let (status, _, body) = get_json(app, "/api/rates?date=2019-05-05").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let app = proxy(format!("http://{}", addr));
    let (status, _, body) = get_json(app, "/api/rates").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let envelope: ProxyErrorEnvelope = serde_json::from_value(body).unwrap();
    assert_eq!(envelope.status, 502);
    assert!(envelope.error.starts_with("Upstream request failed"));
}

#[tokio::test]
async fn test_malformed_date_is_rejected_locally() {
    let app = proxy("http://127.0.0.1:9".to_string());
    let (status, _, body) = get_json(app, "/api/rates?date=15.01.2024").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}
