//! # shardkv - A Sharded Concurrent Key-Value Map
//!
//! shardkv partitions a hash map across N independently locked shards so that
//! threads touching different keys rarely contend. On top of the map it builds
//! a counter map and a TTL-aware byte store, and serves the store over HTTP.
//!
//! ## Features
//!
//! - **Sharded storage**: one `RwLock<HashMap>` per shard, chosen by key hash
//! - **Pluggable hashing**: FNV-1a by default, any `Fn(&K) -> u64` otherwise
//! - **Atomic compute**: read-modify-write of one key under one exclusive lock
//! - **TTL support**: lazy expiry on read plus a background sweeper
//! - **HTTP API**: PUT/GET/DELETE on `/kv/{key}` with auth and rate limiting
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              shardkv                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────┐                 │
//! │  │ HTTP Server │───>│ Middleware  │───>│   Handlers   │                 │
//! │  │   (axum)    │    │ auth/limit  │    │ /kv /metrics │                 │
//! │  └─────────────┘    └─────────────┘    └──────┬───────┘                 │
//! │                                               │                         │
//! │                                               ▼                         │
//! │                    ┌──────────────────────────────────────────────┐     │
//! │                    │        ExpiringStore / ShardedMap            │     │
//! │                    │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │     │
//! │                    │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │ │     │
//! │                    │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │ │     │
//! │                    │  └────────┘ └────────┘ └────────┘ └────────┘ │     │
//! │                    └──────────────────────────┬───────────────────┘     │
//! │                                               ▲                         │
//! │                                               │                         │
//! │                    ┌──────────────────────────┴───────────────────┐     │
//! │                    │               ExpirySweeper                  │     │
//! │                    │          (Background Tokio Task)             │     │
//! │                    └──────────────────────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use shardkv::ShardedMap;
//! use std::ops::ControlFlow;
//!
//! let map: ShardedMap<String, u32> = ShardedMap::new(16).unwrap();
//!
//! map.set("apples".to_string(), 3);
//! map.compute("apples".to_string(), |v| v.map(|n| n + 1));
//! assert_eq!(map.get("apples"), Some(4));
//!
//! let mut total = 0;
//! map.range(|_, v| {
//!     total += v;
//!     ControlFlow::Continue(())
//! });
//! assert_eq!(total, 4);
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: the sharded map, counters, TTL store and expiry sweeper
//! - [`server`]: HTTP routes, middleware and request metrics
//! - [`config`]: command-line configuration
//! - [`error`]: construction errors
//!
//! ## Consistency
//!
//! Single-key operations are linearizable. `len`, `range` and `clear` visit
//! shards one at a time and are only weakly consistent under concurrent writes.

pub mod config;
pub mod error;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::Config;
pub use error::ConfigError;
pub use storage::{
    start_expiry_sweeper, CounterMap, ExpiringStore, ExpiryConfig, ExpirySweeper, Fnv1a,
    KeyHasher, Record, ShardedMap,
};

/// Version of shardkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
