//! Route handlers for the key-value API.

use super::metrics::{NOT_FOUND, TOTAL_DELETES, TOTAL_GETS, TOTAL_PUTS, TOTAL_REQUESTS};
use super::AppState;
use crate::storage::{ExpiringStore, Record};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Body of a `PUT /kv/{key}` request.
#[derive(Debug, Default, Deserialize)]
pub struct KvRequest {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub ttl_seconds: i64,
}

impl KvRequest {
    /// The requested TTL, if it is positive.
    pub fn ttl(&self) -> Option<Duration> {
        u64::try_from(self.ttl_seconds)
            .ok()
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }
}

/// Body returned for a stored or fetched key.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct KvResponse {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl KvResponse {
    fn render(store: &ExpiringStore, record: &Record) -> Self {
        let expires_at = record
            .ttl_remaining_at(store.now())
            .and_then(|left| chrono::Duration::from_std(left).ok())
            .map(|left| Utc::now() + left);

        Self {
            value: String::from_utf8_lossy(&record.payload).into_owned(),
            expires_at,
        }
    }
}

/// Splits a PUT body into payload and TTL.
///
/// A JSON body with a non-empty `value` is unpacked; anything else is stored
/// verbatim without a TTL.
fn parse_put_body(body: Bytes) -> (Bytes, Option<Duration>) {
    match serde_json::from_slice::<KvRequest>(&body) {
        Ok(request) if !request.value.is_empty() => {
            let ttl = request.ttl();
            (Bytes::from(request.value), ttl)
        }
        _ => (body, None),
    }
}

pub async fn put_kv(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Bytes,
) -> Response {
    state.metrics.incr(TOTAL_REQUESTS);
    state.metrics.incr(TOTAL_PUTS);

    let (payload, ttl) = parse_put_body(body);
    debug!(key = %key, bytes = payload.len(), ttl = ?ttl, "PUT");

    let record = state.store.put(key, payload, ttl);

    (
        StatusCode::CREATED,
        Json(KvResponse::render(&state.store, &record)),
    )
        .into_response()
}

pub async fn get_kv(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    state.metrics.incr(TOTAL_REQUESTS);
    state.metrics.incr(TOTAL_GETS);

    match state.store.get_record(&key) {
        Some(record) => Json(KvResponse::render(&state.store, &record)).into_response(),
        None => {
            state.metrics.incr(NOT_FOUND);
            (StatusCode::NOT_FOUND, "key not found").into_response()
        }
    }
}

pub async fn delete_kv(State(state): State<AppState>, Path(key): Path<String>) -> StatusCode {
    state.metrics.incr(TOTAL_REQUESTS);
    state.metrics.incr(TOTAL_DELETES);

    state.store.delete(&key);
    StatusCode::NO_CONTENT
}

/// `/kv/` with nothing after the slash.
pub async fn missing_key(State(state): State<AppState>) -> Response {
    state.metrics.incr(TOTAL_REQUESTS);
    (StatusCode::BAD_REQUEST, "missing key").into_response()
}

pub async fn health() -> Json<BTreeMap<&'static str, &'static str>> {
    Json(BTreeMap::from([("status", "ok")]))
}

pub async fn metrics(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut body = serde_json::Map::new();
    for (name, value) in state.metrics.snapshot() {
        body.insert(name.to_string(), value.into());
    }
    // Weakly consistent: shards are counted one at a time.
    body.insert("keys_stored".to_string(), state.store.len().into());

    Json(serde_json::Value::Object(body))
}
