//! Background Expiry Sweeper
//!
//! This module implements a background task that periodically scans an
//! [`ExpiringStore`] for expired keys and removes them. This is called
//! "active expiry" as opposed to "lazy expiry" (which happens on access).
//!
//! ## Why Do We Need This?
//!
//! Lazy expiry (checking on access) is efficient but has a problem:
//! If a key expires and is never accessed again, it will stay in memory forever!
//!
//! The background sweeper solves this by periodically cleaning up expired keys.
//!
//! ## Design
//!
//! The sweeper runs as a Tokio task and:
//! 1. Waits for the next tick of a fixed interval (default: 5s)
//! 2. Runs one two-phase sweep over every shard on the blocking pool
//! 3. Logs how many keys were removed
//!
//! The sweep takes the same shard locks as foreground traffic. A shorter
//! interval frees expired memory sooner at the cost of more lock contention.

use crate::error::ConfigError;
use crate::storage::ExpiringStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace};

/// Configuration for the expiry sweeper.
///
/// Only built through [`ExpiryConfig::new`] or `Default`, so the interval is
/// never zero:
///
/// ```compile_fail
/// use shardkv::storage::ExpiryConfig;
/// use std::time::Duration;
///
/// let config = ExpiryConfig { interval: Duration::ZERO };
/// ```
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Interval between sweeps (default: 5s)
    interval: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

impl ExpiryConfig {
    pub fn new(interval: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::InvalidScanInterval(interval));
        }
        Ok(Self { interval })
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Starts the expiry sweeper as a background task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use shardkv::storage::{ExpiringStore, ExpirySweeper, ExpiryConfig};
    /// use std::sync::Arc;
    ///
    /// let store = Arc::new(ExpiringStore::new(64)?);
    /// let sweeper = ExpirySweeper::start(store, ExpiryConfig::default());
    ///
    /// // Sweeper runs in the background...
    ///
    /// // Dropping the sweeper will stop it
    /// drop(sweeper);
    /// ```
    pub fn start(store: Arc<ExpiringStore>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            interval_ms = config.interval().as_millis() as u64,
            "Background expiry sweeper started"
        );

        tokio::spawn(sweeper_loop(store, config, shutdown_rx));

        Self { shutdown_tx }
    }

    /// Stops the expiry sweeper.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if self.shutdown_tx.send_replace(true) {
            return;
        }
        info!("Background expiry sweeper stopped");
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
async fn sweeper_loop(
    store: Arc<ExpiringStore>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(config.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick completes immediately; sweeping starts one interval in.
    ticker.tick().await;

    loop {
        // Wait for the interval or shutdown signal
        tokio::select! {
            _ = ticker.tick() => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        // The scan takes every shard lock in turn; keep it off the async workers.
        let sweep_store = Arc::clone(&store);
        let sweep = tokio::task::spawn_blocking(move || sweep_store.sweep_expired());
        let expired = match sweep.await {
            Ok(expired) => expired,
            Err(e) => {
                error!(error = %e, "Expiry sweep failed");
                continue;
            }
        };

        if expired > 0 {
            debug!(
                expired = expired,
                keys_remaining = store.len(),
                "Expired keys cleaned up"
            );
        } else {
            trace!("Expiry sweep found nothing to remove");
        }
    }
}

/// Starts the expiry sweeper with default configuration.
///
/// This is a convenience function for simple use cases.
pub fn start_expiry_sweeper(store: Arc<ExpiringStore>) -> ExpirySweeper {
    ExpirySweeper::start(store, ExpiryConfig::default())
}
