//! Server configuration, parsed from the command line.

use crate::error::ConfigError;
use crate::storage::{ExpiryConfig, DEFAULT_SHARDS};
use clap::Parser;
use std::time::Duration;

/// shardkv - sharded in-memory key-value server with TTL support
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Number of shards in the store
    #[arg(long, alias = "buckets", default_value_t = DEFAULT_SHARDS)]
    pub shards: usize,

    /// Static token required in X-API-Key or Authorization (disabled if unset)
    #[arg(long)]
    pub auth_token: Option<String>,

    /// Max requests per client per window (0 = disabled)
    #[arg(long, default_value_t = 0)]
    pub rate_limit: u32,

    /// Rate limit window, e.g. "1m" or "30s"
    #[arg(long, value_parser = humantime::parse_duration, default_value = "1m")]
    pub rate_window: Duration,

    /// Interval between background expiry sweeps, e.g. "5s"
    #[arg(long, value_parser = humantime::parse_duration, default_value = "5s")]
    pub ttl_scan_interval: Duration,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shards: DEFAULT_SHARDS,
            auth_token: None,
            rate_limit: 0,
            rate_window: Duration::from_secs(60),
            ttl_scan_interval: Duration::from_secs(5),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Rejects settings the server cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shards == 0 {
            return Err(ConfigError::InvalidShardCount(self.shards));
        }
        if self.ttl_scan_interval.is_zero() {
            return Err(ConfigError::InvalidScanInterval(self.ttl_scan_interval));
        }
        if self.rate_limit > 0 && self.rate_window.is_zero() {
            return Err(ConfigError::InvalidRateWindow);
        }
        Ok(())
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn expiry(&self) -> Result<ExpiryConfig, ConfigError> {
        ExpiryConfig::new(self.ttl_scan_interval)
    }

    /// The auth token, treating an empty string as "no auth".
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref().filter(|token| !token.is_empty())
    }
}
