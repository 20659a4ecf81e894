//! Error types for Mosaic analytics
//!
//! Analytics itself never fails (bad values coerce to defaults), so the
//! errors here belong to the edges: the hosted store, configuration, and the
//! rate feed.

use thiserror::Error;

/// Errors from the hosted store (PostgREST or direct Postgres)
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Request to '{table}' failed: {source}")]
    Http {
        table: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Store returned {status} for '{table}': {body}")]
    Status {
        table: String,
        status: u16,
        body: String,
    },

    #[error("Unexpected response from '{table}': {message}")]
    Decode { table: String, message: String },

    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Configuration and environment selection errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable {name} is not set")]
    MissingVar { name: String },

    #[error("Unknown environment '{0}'. Valid values: production, prod, staging, stage")]
    UnknownEnvironment(String),

    #[error("Invalid URL in {name}: {source}")]
    InvalidUrl {
        name: String,
        #[source]
        source: url::ParseError,
    },

    #[error("No store credentials configured for the {0} environment")]
    Unconfigured(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rate table error: {0}")]
    RateTable(#[from] serde_yaml::Error),

    #[error("Selection file error: {0}")]
    Selection(#[from] serde_json::Error),
}

/// Errors from the currency-rate feed
#[derive(Error, Debug)]
pub enum RateError {
    #[error("Rate request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate feed returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid quote for {ccy}: rate '{rate}', nominal '{nominal}'")]
    InvalidQuote {
        ccy: String,
        rate: String,
        nominal: String,
    },

    #[error("Rate feed has no USD quote")]
    MissingUsd,
}

pub type StoreResult<T> = Result<T, StoreError>;
