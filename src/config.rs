//! Configuration loader and validator for the sync jobs.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::limiter::PoolSettings;
use crate::model::Venue;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub store: Store,
    pub untappd: Untappd,
    pub inventory: Inventory,
    #[serde(default)]
    pub pools: Pools,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub request_timeout_secs: u64,
    pub venues_file: String,
}

/// Remote store (WordPress + WooCommerce) credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Store {
    pub url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
}

/// Checkin feed settings. `tokens` is the credential pool rotated per call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Untappd {
    pub url: String,
    pub tokens: Vec<String>,
}

/// Liquor-inventory collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Inventory {
    pub url: String,
}

/// Caps for every bounded pool the jobs run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pools {
    #[serde(default = "PoolSettings::checkin_writes")]
    pub checkin_writes: PoolSettings,
    #[serde(default = "PoolSettings::venues")]
    pub venues: PoolSettings,
    #[serde(default = "PoolSettings::inventory")]
    pub inventory: PoolSettings,
    #[serde(default = "PoolSettings::stores")]
    pub stores: PoolSettings,
}

impl Default for Pools {
    fn default() -> Self {
        Self {
            checkin_writes: PoolSettings::checkin_writes(),
            venues: PoolSettings::venues(),
            inventory: PoolSettings::inventory(),
            stores: PoolSettings::stores(),
        }
    }
}

impl App {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Load the venue fixture referenced by `app.venues_file`.
    pub fn load_venues(&self) -> Result<Vec<Venue>, ConfigError> {
        load_venues(Path::new(&self.app.venues_file))
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Read a YAML list of `{id, label}` venues.
pub fn load_venues(path: &Path) -> Result<Vec<Venue>, ConfigError> {
    let content = fs::read_to_string(path)?;
    let venues: Vec<Venue> = serde_yaml::from_str(&content)?;
    if venues.iter().any(|v| v.label.trim().is_empty()) {
        return Err(ConfigError::Invalid("every venue needs a non-empty label"));
    }
    Ok(venues)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.request_timeout_secs == 0 {
        return Err(ConfigError::Invalid("app.request_timeout_secs must be > 0"));
    }
    if cfg.app.venues_file.trim().is_empty() {
        return Err(ConfigError::Invalid("app.venues_file must be non-empty"));
    }

    if cfg.store.url.trim().is_empty() {
        return Err(ConfigError::Invalid("store.url must be non-empty"));
    }
    if cfg.store.consumer_key.trim().is_empty() {
        return Err(ConfigError::Invalid("store.consumer_key must be non-empty"));
    }
    if cfg.store.consumer_secret.trim().is_empty() {
        return Err(ConfigError::Invalid("store.consumer_secret must be non-empty"));
    }

    if cfg.untappd.url.trim().is_empty() {
        return Err(ConfigError::Invalid("untappd.url must be non-empty"));
    }
    if cfg.untappd.tokens.is_empty() {
        return Err(ConfigError::Invalid("untappd.tokens must contain at least one token"));
    }
    if cfg.untappd.tokens.iter().any(|t| t.trim().is_empty()) {
        return Err(ConfigError::Invalid("untappd.tokens must not contain blank tokens"));
    }

    if cfg.inventory.url.trim().is_empty() {
        return Err(ConfigError::Invalid("inventory.url must be non-empty"));
    }

    for pool in [
        &cfg.pools.checkin_writes,
        &cfg.pools.venues,
        &cfg.pools.inventory,
        &cfg.pools.stores,
    ] {
        if pool.concurrency == 0 || pool.frequency_limit == 0 || pool.window_ms == 0 {
            return Err(ConfigError::Invalid("pool caps must all be > 0"));
        }
    }

    Ok(())
}

/// Returns a complete example YAML configuration.
pub fn example() -> &'static str {
    r#"app:
  request_timeout_secs: 30
  venues_file: "venues.yaml"

store:
  url: "https://shop.example.com/"
  consumer_key: "ck_YOUR_CONSUMER_KEY"
  consumer_secret: "cs_YOUR_CONSUMER_SECRET"

untappd:
  url: "https://api.untappd.com/v4/"
  tokens:
    - "UNTAPPD_TOKEN_ONE"
    - "UNTAPPD_TOKEN_TWO"

inventory:
  url: "https://inventory.example.com/api/"

pools:
  checkin_writes:
    concurrency: 10
    frequency_limit: 10
    window_ms: 5000
  venues:
    concurrency: 10
    frequency_limit: 1
    window_ms: 2000
"#
}
