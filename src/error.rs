//! Error types.
//!
//! Map operations never fail once a map exists: absence is an `Option` or a
//! `bool`, never an error. The only failures are configuration errors, which
//! are raised at construction time and stop the server before it serves.

use std::time::Duration;

/// Invalid construction parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A map needs at least one shard.
    #[error("shard count must be greater than zero (got {0})")]
    InvalidShardCount(usize),

    /// The expiry sweeper cannot tick on a zero interval.
    #[error("ttl scan interval must be greater than zero (got {0:?})")]
    InvalidScanInterval(Duration),

    /// A rate limit was requested with an empty window.
    #[error("rate limit window must be greater than zero when rate limiting is enabled")]
    InvalidRateWindow,
}
