//! Mosaic analytics CLI
//!
//! Usage:
//!   mosaic summary                         # live store, approximate rates
//!   mosaic summary --dump portfolio.json   # offline, from a JSON dump
//!   mosaic summary --live-rates --as-of 2024-06-30
//!   mosaic summary --database-url postgres://...   # `database` feature
//!   mosaic search 'broker:"Marsh Ltd" class:8.9 Indonesia' --dump portfolio.json
//!   mosaic rates --date 2024-01-15
//!   mosaic env show
//!   mosaic env use staging
//!
//! Store credentials come from the environment (or `.env`); see
//! `mosaic_analytics::config`.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde_json::Value;

use mosaic_analytics::analytics::{summarize, AnalyticsContext, AnalyticsService};
use mosaic_analytics::config::{load_selection, save_selection, AppConfig, Environment};
use mosaic_analytics::currency::RateTable;
use mosaic_analytics::ingest::{IngestStats, RawPortfolio};
use mosaic_analytics::rates::CbuRateClient;
use mosaic_analytics::search::{matches_all, parse_search};
#[cfg(feature = "database")]
use mosaic_analytics::store::PgRowSource;
use mosaic_analytics::store::{Collection, PostgrestClient, RowSource};
use mosaic_types::AnalyticsSummary;

/// Reinsurance portfolio analytics
#[derive(Parser, Debug)]
#[command(name = "mosaic")]
#[command(about = "Portfolio analytics, search and rates for the Mosaic back office")]
struct Args {
    /// Where the selected environment is remembered
    #[arg(long, global = true, env = "MOSAIC_STATE", default_value = ".mosaic/environment.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute the analytics summary
    Summary {
        /// Read rows from a JSON dump instead of the store
        #[arg(long)]
        dump: Option<PathBuf>,

        /// Proration date (default: today)
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Overlay today's central-bank rates on the built-in table
        #[arg(long)]
        live_rates: bool,

        /// Print unrounded amounts
        #[arg(long)]
        exact: bool,

        /// Read rows straight from Postgres (needs the `database` feature)
        #[arg(long, env = "DATABASE_URL", conflicts_with = "dump")]
        database_url: Option<String>,
    },

    /// Parse a search string and optionally run it
    Search {
        query: String,

        /// Filter rows of a JSON dump in memory
        #[arg(long, conflicts_with = "remote")]
        dump: Option<PathBuf>,

        /// Run the search against the store
        #[arg(long)]
        remote: bool,

        /// Table to search
        #[arg(long, default_value = "policies")]
        table: String,
    },

    /// Fetch central-bank rates through the rate proxy
    Rates {
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show or switch the store environment
    Env {
        #[command(subcommand)]
        action: EnvAction,
    },
}

#[derive(Subcommand, Debug)]
enum EnvAction {
    /// Print the selected environment and its store URL
    Show,
    /// Select an environment (production or staging)
    Use { environment: Environment },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the JSON output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mosaic_analytics=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Summary {
            dump,
            as_of,
            live_rates,
            exact,
            database_url,
        } => {
            let source = match (dump, database_url) {
                (Some(path), _) => Rows::Dump(path),
                (None, Some(url)) => Rows::Database(url),
                (None, None) => Rows::Store,
            };
            summary(&args.state, source, as_of, live_rates, exact).await
        }
        Command::Search {
            query,
            dump,
            remote,
            table,
        } => search(&args.state, &query, dump, remote, &table).await,
        Command::Rates { date } => rates(date).await,
        Command::Env { action } => env(&args.state, action),
    }
}

/// Config with the persisted environment choice applied
fn load_config(state: &Path) -> Result<AppConfig> {
    let mut config = AppConfig::from_env().context("Failed to read configuration")?;
    if let Some(env) = load_selection(state).context("Failed to read environment selection")? {
        config.environment = env;
    }
    Ok(config)
}

fn load_dump(path: &Path) -> Result<RawPortfolio> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Where `summary` reads its rows from
enum Rows {
    Dump(PathBuf),
    Database(String),
    Store,
}

async fn summary(
    state: &Path,
    source: Rows,
    as_of: Option<NaiveDate>,
    live_rates: bool,
    exact: bool,
) -> Result<()> {
    let config = load_config(state)?;

    let mut table = RateTable::approximate();
    if let Some(path) = &config.rate_table {
        table = table.overlay(&RateTable::load(path)?);
    }
    if live_rates {
        let live = CbuRateClient::new(config.rates_url.clone())?
            .fetch_table(None)
            .await
            .context("Failed to fetch live rates")?;
        table = table.overlay(&live);
    }

    let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
    let context = AnalyticsContext::new(as_of, Arc::new(table));

    let (summary, stats) = match source {
        Rows::Dump(path) => {
            let (rows, stats) = load_dump(&path)?.normalize();
            (summarize(&rows, &context), stats)
        }
        Rows::Database(url) => summarize_database(&url, &config, context).await?,
        Rows::Store => {
            let client = PostgrestClient::new(config.store()?)?;
            AnalyticsService::new(client, context).run().await
        }
    };

    tracing::info!(?stats, "Ingested rows");
    if exact {
        print_json(&summary)
    } else {
        print_json(&summary.rounded())
    }
}

#[cfg(feature = "database")]
async fn summarize_database(
    url: &str,
    config: &AppConfig,
    context: AnalyticsContext,
) -> Result<(AnalyticsSummary, IngestStats)> {
    let mut source = PgRowSource::connect(url)
        .await
        .context("Failed to connect to Postgres")?;
    // The claims procedure behind the store's RPC is callable directly
    if let Some(function) = config.store().ok().and_then(|s| s.claims_rpc.as_deref()) {
        source = source.with_claims_function(function)?;
    }
    Ok(AnalyticsService::new(source, context).run().await)
}

#[cfg(not(feature = "database"))]
async fn summarize_database(
    _url: &str,
    _config: &AppConfig,
    _context: AnalyticsContext,
) -> Result<(AnalyticsSummary, IngestStats)> {
    anyhow::bail!("--database-url needs a build with the `database` feature")
}

async fn search(
    state: &Path,
    query: &str,
    dump: Option<PathBuf>,
    remote: bool,
    table: &str,
) -> Result<()> {
    let filters = parse_search(query);
    let collection =
        Collection::from_table(table).with_context(|| format!("Unknown table '{}'", table))?;

    if let Some(path) = dump {
        let raw = load_dump(&path)?;
        let rows: Vec<Value> = raw
            .fetch_rows(collection)
            .await?
            .into_iter()
            .filter(|row| matches_all(&filters, row, collection.broad_columns()))
            .collect();
        return print_json(&rows);
    }

    if remote {
        let config = load_config(state)?;
        let client = PostgrestClient::new(config.store()?)?;
        let rows = client.search(collection, &filters).await?;
        return print_json(&rows);
    }

    print_json(&filters)
}

async fn rates(date: Option<NaiveDate>) -> Result<()> {
    let config = AppConfig::from_env().context("Failed to read configuration")?;
    let client = CbuRateClient::new(config.rates_url)?;
    let table = client.fetch_table(date).await?;
    print_json(&table)
}

fn env(state: &Path, action: EnvAction) -> Result<()> {
    let mut config = load_config(state)?;
    match action {
        EnvAction::Show => {
            let url = config
                .store()
                .map(|s| s.url.to_string())
                .unwrap_or_else(|_| "(not configured)".to_string());
            println!("{} {}", config.environment, url);
        }
        EnvAction::Use { environment } => {
            config.switch(environment)?;
            save_selection(state, environment)?;
            println!("Switched to {}", environment);
        }
    }
    Ok(())
}
