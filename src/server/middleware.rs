//! Request middleware: logging, auth and rate limiting.
//!
//! Applied outermost first in that order, so every request is logged even when
//! it is rejected. `/healthz` bypasses auth and rate limiting.

use super::metrics::{RATE_LIMITED, UNAUTHORIZED};
use super::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{debug, info};

const HEALTH_PATH: &str = "/healthz";

/// Logs one line per request with its status and latency.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let start = Instant::now();

    let response = next.run(request).await;

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "Request handled"
    );

    response
}

/// Rejects requests without the configured token.
pub async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.auth_token.as_deref() else {
        return next.run(request).await;
    };

    if request.uri().path() == HEALTH_PATH || token_matches(request.headers(), expected) {
        return next.run(request).await;
    }

    state.metrics.incr(UNAUTHORIZED);
    debug!(path = %request.uri().path(), "Rejected request without valid token");
    (StatusCode::UNAUTHORIZED, "unauthorized").into_response()
}

/// Accepts `X-API-Key: <token>`, `Authorization: <token>` or
/// `Authorization: Bearer <token>`.
fn token_matches(headers: &HeaderMap, expected: &str) -> bool {
    let presented = headers
        .get("x-api-key")
        .or_else(|| headers.get("authorization"))
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    presented == expected || presented.strip_prefix("Bearer ") == Some(expected)
}

/// Applies the per-client fixed-window limit.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(limiter) = state.limiter.as_ref() else {
        return next.run(request).await;
    };

    if request.uri().path() == HEALTH_PATH {
        return next.run(request).await;
    }

    let client = client_id(&request);
    if limiter.allow(&client) {
        return next.run(request).await;
    }

    state.metrics.incr(RATE_LIMITED);
    debug!(client = %client, "Rate limit exceeded");
    (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response()
}

/// The client's IP address, or "unknown" when the peer address is missing.
fn client_id(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
