//! Currency rate proxy
//!
//! The browser cannot call the central-bank feed directly (no CORS headers),
//! so this service forwards the request and re-serves the quotes:
//!
//! ```text
//! GET /api/rates                  -> {upstream}/json/
//! GET /api/rates?date=2024-01-15  -> {upstream}/json/all/2024-01-15/
//! ```
//!
//! Success responses carry `Cache-Control: public, max-age=3600`. Upstream
//! error statuses are passed through inside a [`ProxyErrorEnvelope`];
//! transport failures become `502 Bad Gateway` with the same envelope.

use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use mosaic_types::{CbuRateEntry, ProxyErrorEnvelope};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Public central-bank JSON archive
pub const DEFAULT_UPSTREAM: &str = "https://cbu.uz/uz/arkhiv-kursov-valyut";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8787";

const CACHE_CONTROL: &str = "public, max-age=3600";

/// Proxy settings
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub bind_addr: String,
    /// Base URL the `/json/...` paths are appended to
    pub upstream: String,
    pub timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            upstream: DEFAULT_UPSTREAM.to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

impl ProxyConfig {
    /// `RATE_PROXY_BIND_ADDR` and `RATE_PROXY_UPSTREAM`, with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(addr) = std::env::var("RATE_PROXY_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(upstream) = std::env::var("RATE_PROXY_UPSTREAM") {
            config.upstream = upstream;
        }
        config
    }

    /// Upstream URL for the latest quotes or a given day
    pub fn upstream_url(&self, date: Option<NaiveDate>) -> String {
        let base = self.upstream.trim_end_matches('/');
        match date {
            Some(d) => format!("{}/json/all/{}/", base, d.format("%Y-%m-%d")),
            None => format!("{}/json/", base),
        }
    }
}

#[derive(Clone)]
struct ProxyState {
    client: reqwest::Client,
    config: ProxyConfig,
}

#[derive(Debug, Deserialize)]
struct RatesQuery {
    date: Option<String>,
}

/// Router with the rate endpoint and a health check
pub fn build_router(config: ProxyConfig) -> anyhow::Result<Router> {
    let client = reqwest::Client::builder().timeout(config.timeout).build()?;

    Ok(Router::new()
        .route("/api/rates", get(rates))
        .route("/api/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(ProxyState { client, config }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "mosaic-rate-proxy",
    }))
}

fn envelope(status: StatusCode, error: impl Into<String>) -> Response {
    let body = ProxyErrorEnvelope {
        error: error.into(),
        status: status.as_u16(),
    };
    (status, Json(body)).into_response()
}

async fn rates(State(state): State<ProxyState>, Query(query): Query<RatesQuery>) -> Response {
    let date = match query.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(d) => Some(d),
            Err(_) => {
                return envelope(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid date '{}', expected YYYY-MM-DD", raw),
                )
            }
        },
        None => None,
    };

    let url = state.config.upstream_url(date);
    tracing::debug!(%url, "Forwarding rate request");

    let response = match state.client.get(&url).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "Rate upstream unreachable");
            return envelope(StatusCode::BAD_GATEWAY, format!("Upstream request failed: {}", e));
        }
    };

    let upstream_status = response.status().as_u16();
    if !response.status().is_success() {
        tracing::warn!(status = upstream_status, "Rate upstream returned an error");
        let status = StatusCode::from_u16(upstream_status).unwrap_or(StatusCode::BAD_GATEWAY);
        return envelope(status, format!("Upstream returned {}", upstream_status));
    }

    let entries: Vec<CbuRateEntry> = match response.json().await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "Rate upstream sent an unreadable payload");
            return envelope(StatusCode::BAD_GATEWAY, format!("Invalid upstream payload: {}", e));
        }
    };

    tracing::info!(count = entries.len(), ?date, "Served rates");
    (
        [(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL))],
        Json(entries),
    )
        .into_response()
}
