//! Request counters for the `/metrics` endpoint.

use crate::error::ConfigError;
use crate::storage::CounterMap;
use std::collections::BTreeMap;

pub const TOTAL_REQUESTS: &str = "total_requests";
pub const TOTAL_GETS: &str = "total_gets";
pub const TOTAL_PUTS: &str = "total_puts";
pub const TOTAL_DELETES: &str = "total_deletes";
pub const RATE_LIMITED: &str = "rate_limited";
pub const UNAUTHORIZED: &str = "unauthorized";
pub const NOT_FOUND: &str = "not_found";

/// Every counter reported, even before it is first incremented.
const REPORTED: [&str; 7] = [
    TOTAL_REQUESTS,
    TOTAL_GETS,
    TOTAL_PUTS,
    TOTAL_DELETES,
    RATE_LIMITED,
    UNAUTHORIZED,
    NOT_FOUND,
];

/// Monotonically increasing request counters.
#[derive(Debug)]
pub struct Metrics {
    counters: CounterMap<&'static str>,
}

impl Metrics {
    pub fn new(shard_count: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            counters: CounterMap::new(shard_count)?,
        })
    }

    #[inline]
    pub fn incr(&self, name: &'static str) {
        self.counters.inc(name, 1);
    }

    pub fn get(&self, name: &'static str) -> i64 {
        self.counters.get(&name).unwrap_or(0)
    }

    pub fn snapshot(&self) -> BTreeMap<&'static str, i64> {
        let mut out: BTreeMap<_, _> = REPORTED.iter().map(|&name| (name, 0)).collect();
        out.extend(self.counters.snapshot());
        out
    }
}
