//! Configuration and environment selection
//!
//! Two independently configured stores exist, production and staging. The
//! selected one is an explicit value handed to the store client; switching
//! environments means building a new client from [`AppConfig::store`], not
//! restarting anything.
//!
//! Variables (all optional except the credentials of the selected store):
//!
//! - `MOSAIC_ENV`: `production` (default) or `staging`
//! - `MOSAIC_PRODUCTION_URL` / `MOSAIC_PRODUCTION_KEY`
//! - `MOSAIC_STAGING_URL` / `MOSAIC_STAGING_KEY`
//! - `MOSAIC_CLAIMS_RPC`: stored procedure returning claims in our share
//! - `MOSAIC_RATES_URL`: rate proxy endpoint
//! - `MOSAIC_RATE_TABLE`: YAML file overriding the built-in rate table

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Default rate proxy endpoint
pub const DEFAULT_RATES_URL: &str = "http://localhost:8787/api/rates";

/// PostgREST caps responses at 1000 rows unless told otherwise
pub const DEFAULT_PAGE_SIZE: usize = 1000;

// =============================================================================
// ENVIRONMENT
// =============================================================================

/// Which hosted store the application talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Staging,
}

impl Environment {
    pub fn name(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
        }
    }

    fn var_prefix(&self) -> &'static str {
        match self {
            Environment::Production => "MOSAIC_PRODUCTION",
            Environment::Staging => "MOSAIC_STAGING",
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "staging" | "stage" => Ok(Environment::Staging),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// STORE CONFIG
// =============================================================================

/// Credentials and options for one hosted store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Project URL, e.g. `https://abc.supabase.co`
    pub url: Url,
    /// Anon or service key, sent as `apikey` and bearer token
    pub api_key: String,
    pub claims_rpc: Option<String>,
    pub page_size: usize,
}

impl StoreConfig {
    pub fn new(url: Url, api_key: impl Into<String>) -> Self {
        Self {
            url,
            api_key: api_key.into(),
            claims_rpc: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_claims_rpc(mut self, rpc: impl Into<String>) -> Self {
        self.claims_rpc = Some(rpc.into());
        self
    }
}

// =============================================================================
// APP CONFIG
// =============================================================================

/// Everything the analytics tooling reads from the environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub production: Option<StoreConfig>,
    pub staging: Option<StoreConfig>,
    pub rates_url: Url,
    pub rate_table: Option<PathBuf>,
}

impl AppConfig {
    /// Build from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup (tests pass a map)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let environment = match lookup("MOSAIC_ENV") {
            Some(v) => v.parse()?,
            None => Environment::default(),
        };
        let claims_rpc = lookup("MOSAIC_CLAIMS_RPC").filter(|v| !v.trim().is_empty());

        let store = |env: Environment| -> Result<Option<StoreConfig>, ConfigError> {
            let url_var = format!("{}_URL", env.var_prefix());
            let key_var = format!("{}_KEY", env.var_prefix());
            match (lookup(&url_var), lookup(&key_var)) {
                (Some(url), Some(key)) => {
                    let url = parse_url(&url_var, &url)?;
                    let mut cfg = StoreConfig::new(url, key);
                    cfg.claims_rpc = claims_rpc.clone();
                    Ok(Some(cfg))
                }
                (Some(_), None) => Err(ConfigError::MissingVar { name: key_var }),
                (None, Some(_)) => Err(ConfigError::MissingVar { name: url_var }),
                (None, None) => Ok(None),
            }
        };

        let rates_url = match lookup("MOSAIC_RATES_URL") {
            Some(v) => parse_url("MOSAIC_RATES_URL", &v)?,
            None => parse_url("MOSAIC_RATES_URL", DEFAULT_RATES_URL)?,
        };

        Ok(Self {
            environment,
            production: store(Environment::Production)?,
            staging: store(Environment::Staging)?,
            rates_url,
            rate_table: lookup("MOSAIC_RATE_TABLE").map(PathBuf::from),
        })
    }

    /// Store credentials for the selected environment
    pub fn store(&self) -> Result<&StoreConfig, ConfigError> {
        self.store_for(self.environment)
    }

    pub fn store_for(&self, env: Environment) -> Result<&StoreConfig, ConfigError> {
        let cfg = match env {
            Environment::Production => self.production.as_ref(),
            Environment::Staging => self.staging.as_ref(),
        };
        cfg.ok_or_else(|| ConfigError::Unconfigured(env.to_string()))
    }

    /// Select another environment; fails if it has no credentials
    pub fn switch(&mut self, env: Environment) -> Result<&StoreConfig, ConfigError> {
        self.store_for(env)?;
        self.environment = env;
        tracing::info!(environment = %env, "Switched store environment");
        self.store()
    }
}

fn parse_url(name: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|source| ConfigError::InvalidUrl {
        name: name.to_string(),
        source,
    })
}

// =============================================================================
// PERSISTED SELECTION
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct Selection {
    environment: Environment,
}

/// Read the persisted environment choice; `None` when nothing was saved
pub fn load_selection(path: &Path) -> Result<Option<Environment>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let selection: Selection = serde_json::from_str(&content)?;
            Ok(Some(selection.environment))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Persist the environment choice
pub fn save_selection(path: &Path, environment: Environment) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(&Selection { environment })?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_environment_from_str() {
        assert_eq!(
            "production".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!(" staging ".parse::<Environment>().unwrap(), Environment::Staging);
        assert!(matches!(
            "dev".parse::<Environment>(),
            Err(ConfigError::UnknownEnvironment(_))
        ));
    }

    #[test]
    fn test_from_lookup_reads_both_stores() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("MOSAIC_ENV", "staging"),
            ("MOSAIC_PRODUCTION_URL", "https://prod.example.co"),
            ("MOSAIC_PRODUCTION_KEY", "pk"),
            ("MOSAIC_STAGING_URL", "https://stage.example.co"),
            ("MOSAIC_STAGING_KEY", "sk"),
            ("MOSAIC_CLAIMS_RPC", "get_claims_own_share"),
        ]))
        .unwrap();

        assert_eq!(cfg.environment, Environment::Staging);
        let store = cfg.store().unwrap();
        assert_eq!(store.url.host_str(), Some("stage.example.co"));
        assert_eq!(store.api_key, "sk");
        assert_eq!(store.claims_rpc.as_deref(), Some("get_claims_own_share"));
        assert_eq!(cfg.rates_url.as_str(), DEFAULT_RATES_URL);
    }

    #[test]
    fn test_mistyped_environment_fails_the_whole_config() {
        let err = AppConfig::from_lookup(lookup(&[
            ("MOSAIC_ENV", "prodution"),
            ("MOSAIC_RATE_TABLE", "rates.yaml"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEnvironment(ref v) if v == "prodution"));
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[(
            "MOSAIC_PRODUCTION_URL",
            "https://prod.example.co",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar { name } if name == "MOSAIC_PRODUCTION_KEY"));
    }

    #[test]
    fn test_switch_requires_credentials() {
        let mut cfg = AppConfig::from_lookup(lookup(&[
            ("MOSAIC_PRODUCTION_URL", "https://prod.example.co"),
            ("MOSAIC_PRODUCTION_KEY", "pk"),
        ]))
        .unwrap();

        assert!(matches!(
            cfg.switch(Environment::Staging),
            Err(ConfigError::Unconfigured(_))
        ));
        assert_eq!(cfg.environment, Environment::Production);
        assert!(cfg.switch(Environment::Production).is_ok());
    }

    #[test]
    fn test_selection_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("environment.json");

        assert_eq!(load_selection(&path).unwrap(), None);
        save_selection(&path, Environment::Staging).unwrap();
        assert_eq!(load_selection(&path).unwrap(), Some(Environment::Staging));
    }
}
