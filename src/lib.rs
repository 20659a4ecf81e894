//! Mosaic Analytics - reinsurance portfolio computations
//!
//! Gross/net written and earned premium, loss ratios and multi-currency
//! conversion for a reinsurance back office, computed once over rows fetched
//! from the hosted store.
//!
//! ## Pipeline
//!
//! Store -> RowSource -> RawPortfolio -> normalize -> PortfolioRows -> summarize
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mosaic_analytics::analytics::{summarize, AnalyticsContext};
//! use mosaic_analytics::ingest::RawPortfolio;
//!
//! let raw: RawPortfolio = serde_json::from_str(r#"{"policies": []}"#).unwrap();
//! let (rows, _stats) = raw.normalize();
//! let summary = summarize(&rows, &AnalyticsContext::approximate_today());
//! println!("{}", summary.total.gross_written_premium);
//! ```

// Core error handling
pub mod error;

// Configuration and environment switch
pub mod config;

// Lenient parsing and canonical rows
pub mod coerce;
pub mod ingest;
pub mod model;

// Currency conversion and the central-bank feed
pub mod currency;
pub mod rates;

// Aggregation
pub mod analytics;

// Search box syntax
pub mod search;

// Row fetching (PostgREST, or Postgres with the `database` feature)
pub mod store;

// Public re-exports
pub use analytics::{summarize, AnalyticsContext, AnalyticsService};
pub use config::{AppConfig, Environment, StoreConfig};
pub use currency::{CurrencyConverter, RateSource, RateTable};
pub use error::{ConfigError, RateError, StoreError, StoreResult};
pub use ingest::{IngestStats, RawPortfolio};
pub use model::PortfolioRows;
pub use search::{parse_search, SearchFilter};
pub use store::{Collection, PostgrestClient, RowSource};

#[cfg(feature = "database")]
pub use store::PgRowSource;

pub use mosaic_types;
