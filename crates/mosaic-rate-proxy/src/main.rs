//! Rate proxy server
//!
//! ```bash
//! RATE_PROXY_BIND_ADDR=127.0.0.1:8787 cargo run -p mosaic-rate-proxy
//! curl 'http://127.0.0.1:8787/api/rates?date=2024-01-15'
//! ```

use anyhow::Context;
use mosaic_rate_proxy::{build_router, ProxyConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mosaic_rate_proxy=debug,tower_http=info".into()),
        )
        .init();

    let config = ProxyConfig::from_env();
    let addr = config.bind_addr.clone();
    tracing::info!(%addr, upstream = %config.upstream, "Starting rate proxy");

    let app = build_router(config)?;
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
