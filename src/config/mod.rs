//! Typed configuration from environment variables.
//!
//! Loads once at startup and fails fast on values that don't parse.
//! Everything has a default; CLI flags override what is loaded here.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::pool::PoolConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub capacity: usize,
    pub log_dir: Option<PathBuf>,
    pub poll_interval: Duration,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let capacity: usize = parsed_var("SHOWERPOOL_CAPACITY", 50)?;
        if capacity == 0 {
            return Err(Error::Config(
                "SHOWERPOOL_CAPACITY must be at least 1".to_string(),
            ));
        }
        let poll_secs: u64 = parsed_var("SHOWERPOOL_POLL_SECS", 10)?;
        if poll_secs == 0 {
            return Err(Error::Config(
                "SHOWERPOOL_POLL_SECS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            capacity,
            log_dir: std::env::var("SHOWERPOOL_LOG_DIR").ok().map(PathBuf::from),
            poll_interval: Duration::from_secs(poll_secs),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Pool settings derived from this configuration.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            capacity: self.capacity,
            log_dir: self.log_dir.clone(),
            poll_interval: self.poll_interval,
        }
    }
}

fn parsed_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid {name}={raw:?}: {e}"))),
        Err(_) => Ok(default),
    }
}
