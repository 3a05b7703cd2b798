//! shardkv - sharded in-memory key-value server
//!
//! This is the main entry point for the shardkv server.
//! It parses configuration, builds the store and sweeper, and serves HTTP.

use anyhow::Context;
use clap::Parser;
use shardkv::server::{self, rate_limit, AppState};
use shardkv::storage::{ExpiringStore, ExpirySweeper};
use shardkv::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config) {
    println!(
        r#"
shardkv v{} - Sharded In-Memory Key-Value Store
──────────────────────────────────────────────────────────────
Server starting on {}
Shards: {}    TTL scan interval: {}

Use Ctrl+C to shutdown gracefully.
"#,
        shardkv::VERSION,
        config.bind_address(),
        config.shards,
        humantime::format_duration(config.ttl_scan_interval),
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::parse();

    // Set up logging; RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    config.validate().context("invalid configuration")?;

    print_banner(&config);

    // Create the store (shared across all requests)
    let store = Arc::new(ExpiringStore::new(config.shards)?);
    info!(shards = config.shards, "Storage initialized");

    // Start the background expiry sweeper; stopped when dropped
    let sweeper = ExpirySweeper::start(Arc::clone(&store), config.expiry()?);

    let state = AppState::from_config(&config, store)?;
    info!(
        auth = state.auth_token.is_some(),
        rate_limit = config.rate_limit,
        rate_window = %humantime::format_duration(config.rate_window),
        "Request policy configured"
    );

    // Idle client windows are dropped once per rate window
    let evictor = state.limiter.clone().map(rate_limit::spawn_eviction);

    // Bind the TCP listener
    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;

    // Set up graceful shutdown
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    server::serve(listener, state, shutdown)
        .await
        .context("HTTP server failed")?;

    if let Some(evictor) = evictor {
        evictor.abort();
    }
    sweeper.stop();
    info!("Server shutdown complete");
    Ok(())
}
