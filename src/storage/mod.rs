//! Storage Module
//!
//! This module provides the core storage functionality for shardkv: a
//! sharded concurrent map, counters built on it, and a TTL-aware store with
//! a background expiry sweeper.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────┐          ┌──────────────┐
//!   │  CounterMap  │          │ ExpiringStore│◄──── ExpirySweeper
//!   │  inc()       │          │ put/get/del  │      (Background Tokio Task)
//!   └──────┬───────┘          └──────┬───────┘
//!          │ compute()               │ set/get/remove_if/range
//!          ▼                         ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ShardedMap                            │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Sharded Storage**: A fixed number of shards, routed by FNV-1a
//! - **RwLock**: Multiple concurrent readers, exclusive writers per shard
//! - **Atomic Compound Operations**: `compute` and `load_or_store`
//! - **Lazy Expiry**: Expired keys are cleaned on access
//! - **Active Expiry**: Background sweeper cleans orphaned expired keys
//!
//! ## Example
//!
//! ```
//! use shardkv::storage::{CounterMap, ExpiringStore, ShardedMap};
//! use std::time::Duration;
//!
//! let map: ShardedMap<String, u32> = ShardedMap::new(64).unwrap();
//! map.set("answer".to_string(), 42);
//! assert_eq!(map.get("answer"), Some(42));
//!
//! let counters: CounterMap<String> = CounterMap::new(64).unwrap();
//! counters.inc("hits".to_string(), 5);
//! assert_eq!(counters.inc("hits".to_string(), 3), 8);
//!
//! let store = ExpiringStore::new(64).unwrap();
//! store.put("session", "token123", Some(Duration::from_secs(3600)));
//! assert!(store.get("session").is_some());
//! ```

pub mod clock;
pub mod counter;
pub mod expiring;
pub mod expiry;
pub mod hasher;
pub mod map;
mod shard;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::CounterMap;
pub use expiring::{ExpiringStore, Record};
pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper};
pub use hasher::{fnv1a, Fnv1a, KeyHasher};
pub use map::ShardedMap;

/// Default number of shards.
/// More shards = less lock contention, but more memory overhead.
/// 64 is a good balance for most workloads.
pub const DEFAULT_SHARDS: usize = 64;
