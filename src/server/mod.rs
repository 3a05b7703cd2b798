//! HTTP Front End
//!
//! Exposes an [`ExpiringStore`] over a small JSON/HTTP API.
//!
//! ## Routes
//!
//! ```text
//! PUT    /kv/{key}   store a value (JSON {"value","ttl_seconds"} or raw body)
//! GET    /kv/{key}   fetch a value, 404 if missing or expired
//! DELETE /kv/{key}   delete a value, always 204
//! GET    /healthz    liveness probe
//! GET    /metrics    request counters and stored key count
//! ```
//!
//! Keys may contain `/`. A request to `/kv/` with no key is a 400.
//!
//! ## Layers
//!
//! ```text
//! timeout (30s) ─> request log ─> auth ─> rate limit ─> handler
//! ```

pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod rate_limit;

pub use metrics::Metrics;
pub use rate_limit::RateLimiter;

use crate::config::Config;
use crate::error::ConfigError;
use crate::storage::ExpiringStore;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{any, get},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

/// Upper bound on the time spent serving a single request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// State shared by every handler and middleware.
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Arc<ExpiringStore>,
    pub metrics: Arc<Metrics>,
    /// None when rate limiting is disabled.
    pub limiter: Option<Arc<RateLimiter>>,
    /// None when auth is disabled.
    pub auth_token: Option<Arc<str>>,
}

impl AppState {
    pub fn from_config(config: &Config, store: Arc<ExpiringStore>) -> Result<Self, ConfigError> {
        let limiter = if config.rate_limit > 0 {
            Some(Arc::new(RateLimiter::new(
                config.rate_limit,
                config.rate_window,
                config.shards,
            )?))
        } else {
            None
        };

        Ok(Self {
            store,
            metrics: Arc::new(Metrics::new(config.shards)?),
            limiter,
            auth_token: config.auth_token().map(Arc::from),
        })
    }
}

/// Builds the application router with all middleware attached.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/kv/", any(handlers::missing_key))
        .route(
            "/kv/*key",
            get(handlers::get_kv)
                .put(handlers::put_kv)
                .delete(handlers::delete_kv),
        )
        .route("/healthz", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        // Later layers wrap earlier ones.
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit))
        .layer(from_fn_with_state(state.clone(), middleware::require_token))
        .layer(from_fn(middleware::log_requests))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}

/// Serves requests on `listener` until `shutdown` resolves.
///
/// In-flight requests are allowed to finish before this returns.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    info!("HTTP server stopped");
    Ok(())
}
