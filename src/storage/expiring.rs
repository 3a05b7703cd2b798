//! TTL-Aware Key-Value Store
//!
//! [`ExpiringStore`] layers per-key deadlines over a [`ShardedMap`] of
//! [`Record`]s. Expired keys are removed two ways:
//!
//! 1. **Lazy**: a read that finds a past-deadline record deletes it and
//!    reports the key as missing.
//! 2. **Active**: [`ExpiringStore::sweep_expired`] scans every shard and
//!    deletes what it finds. The [`ExpirySweeper`](crate::storage::ExpirySweeper)
//!    runs it on a timer.
//!
//! Either path may win the race for a given key; both end with the key absent.
//!
//! ## Sweep Phases
//!
//! ```text
//!   phase 1: range()  ── shared lock, shard by shard ──> Vec<expired key>
//!   phase 2: for key   ── exclusive lock, one key ────> remove_if(expired)
//! ```
//!
//! Deleting during phase 1 would need an exclusive lock on a shard whose
//! shared lock the scan is still holding, so the two phases never overlap.
//! Both removal paths go through `remove_if` and re-check the deadline under
//! the exclusive lock: a key rewritten after it was found expired survives.

use crate::error::ConfigError;
use crate::storage::clock::{Clock, SystemClock};
use crate::storage::map::ShardedMap;
use bytes::Bytes;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// A stored payload with an optional deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The actual value stored
    pub payload: Bytes,
    /// When this record expires (None = never expires)
    pub expires_at: Option<Instant>,
}

impl Record {
    /// Creates a record that never expires.
    pub fn new(payload: Bytes) -> Self {
        Self {
            payload,
            expires_at: None,
        }
    }

    /// Creates a record that expires at `deadline`.
    pub fn with_deadline(payload: Bytes, deadline: Instant) -> Self {
        Self {
            payload,
            expires_at: Some(deadline),
        }
    }

    #[inline]
    pub fn has_deadline(&self) -> bool {
        self.expires_at.is_some()
    }

    /// Checks if this record is past its deadline at `now`.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now > deadline)
    }

    /// Time left until the deadline, or None if the record never expires.
    pub fn ttl_remaining_at(&self, now: Instant) -> Option<Duration> {
        self.expires_at
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

/// A string-keyed byte store with optional per-key TTL.
///
/// # Example
///
/// ```
/// use shardkv::storage::ExpiringStore;
/// use std::time::Duration;
///
/// let store = ExpiringStore::new(16).unwrap();
///
/// store.put("name", "shardkv", None);
/// store.put("session", "abc123", Some(Duration::from_secs(60)));
///
/// assert_eq!(store.get("name").as_deref(), Some(&b"shardkv"[..]));
/// assert!(store.get("session").is_some());
/// ```
#[derive(Debug)]
pub struct ExpiringStore {
    map: ShardedMap<String, Record>,
    clock: Arc<dyn Clock>,
}

impl ExpiringStore {
    /// Creates a store with `shard_count` shards on the system clock.
    pub fn new(shard_count: usize) -> Result<Self, ConfigError> {
        Self::with_clock(shard_count, Arc::new(SystemClock))
    }

    /// Creates a store that reads time from `clock`.
    pub fn with_clock(shard_count: usize, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        Ok(Self {
            map: ShardedMap::new(shard_count)?,
            clock,
        })
    }

    /// Current time as seen by this store.
    #[inline]
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Stores `payload` under `key`, replacing any previous value and deadline.
    ///
    /// A `Some` TTL sets the deadline to now + TTL. `None`, a zero TTL and a
    /// TTL too large to represent all store a value that never expires.
    pub fn put(
        &self,
        key: impl Into<String>,
        payload: impl Into<Bytes>,
        ttl: Option<Duration>,
    ) -> Record {
        let payload = payload.into();
        let deadline = ttl
            .filter(|ttl| !ttl.is_zero())
            .and_then(|ttl| self.now().checked_add(ttl));
        let record = match deadline {
            Some(deadline) => Record::with_deadline(payload, deadline),
            None => Record::new(payload),
        };

        self.map.set(key.into(), record.clone());
        record
    }

    /// Gets the payload for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.get_record(key).map(|record| record.payload)
    }

    /// Gets the full record for a key (including its deadline).
    ///
    /// An expired record is deleted here, before `None` is returned.
    pub fn get_record(&self, key: &str) -> Option<Record> {
        let record = self.map.get(key)?;
        let now = self.now();

        if record.is_expired_at(now) {
            if self.map.remove_if(key, |current| current.is_expired_at(now)) {
                trace!(key = key, "Lazily expired key");
            }
            return None;
        }

        Some(record)
    }

    /// Deletes a key whether or not it has expired.
    pub fn delete(&self, key: &str) -> bool {
        self.map.delete(key)
    }

    /// Number of stored records, expired-but-unswept ones included.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The underlying map. Reads through it skip lazy expiration.
    pub fn map(&self) -> &ShardedMap<String, Record> {
        &self.map
    }

    /// Runs one active expiry pass.
    ///
    /// Returns the number of keys removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.now();

        let mut expired = Vec::new();
        self.map.range(|key, record| {
            if record.is_expired_at(now) {
                expired.push(key.clone());
            }
            ControlFlow::Continue(())
        });

        expired
            .iter()
            .filter(|key| {
                self.map
                    .remove_if(key.as_str(), |current| current.is_expired_at(now))
            })
            .count()
    }
}
