//! Configuration module for Bastion.
//!
//! Loads configuration from environment variables.

mod error;

use std::env;

pub use error::ConfigError;

use crate::cache::{CacheConfig, RearmPolicy};

/// Default sweep interval when `CACHE_SWEEP_INTERVAL_SECS` is unset (1 hour).
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // MongoDB
    pub mongodb_uri: String,
    pub mongodb_database: String,

    /// Capacity, sweep interval and timer policies shared by every cache.
    pub cache: CacheConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns an error if a required variable is missing or a value
    /// cannot be parsed. A missing `CACHE_MAX_SIZE` is fatal.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mongodb_uri = lookup("MONGODB_URI")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("MONGODB_URI"))?;

        let mongodb_database = lookup("MONGODB_DATABASE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "bastion".to_string());

        let max_size = lookup("CACHE_MAX_SIZE").ok_or(ConfigError::Missing("CACHE_MAX_SIZE"))?;
        let max_size = parse_number("CACHE_MAX_SIZE", &max_size)?;

        let sweep_interval = match lookup("CACHE_SWEEP_INTERVAL_SECS") {
            Some(raw) => parse_number("CACHE_SWEEP_INTERVAL_SECS", &raw)?,
            None => DEFAULT_SWEEP_INTERVAL_SECS,
        };

        let rearm_policy = match lookup("CACHE_REARM_POLICY") {
            Some(raw) => raw.parse::<RearmPolicy>()?,
            None => RearmPolicy::default(),
        };

        let cancel_on_delete = match lookup("CACHE_CANCEL_ON_DELETE") {
            Some(raw) => parse_bool("CACHE_CANCEL_ON_DELETE", &raw)?,
            None => true,
        };

        let cache = CacheConfig::new(max_size as usize, sweep_interval)?
            .rearm_policy(rearm_policy)
            .cancel_on_delete(cancel_on_delete);

        Ok(Self {
            mongodb_uri,
            mongodb_database,
            cache,
        })
    }
}

fn parse_number(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
        name,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}
