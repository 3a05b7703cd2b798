//! Atomic signed counters keyed by name.

use crate::error::ConfigError;
use crate::storage::hasher::{Fnv1a, KeyHasher};
use crate::storage::map::ShardedMap;
use std::borrow::Borrow;
use std::hash::Hash;
use std::ops::ControlFlow;

/// A [`ShardedMap`] of `i64` counters with atomic increment.
///
/// Increments are built on [`ShardedMap::compute`], so concurrent `inc`
/// calls on the same key never lose an update.
#[derive(Debug)]
pub struct CounterMap<K, H = Fnv1a> {
    map: ShardedMap<K, i64, H>,
}

impl<K> CounterMap<K, Fnv1a>
where
    K: Hash + Eq + AsRef<[u8]>,
{
    pub fn new(shard_count: usize) -> Result<Self, ConfigError> {
        Self::with_hasher(shard_count, Fnv1a)
    }
}

impl<K, H> CounterMap<K, H>
where
    K: Hash + Eq,
    H: KeyHasher<K>,
{
    pub fn with_hasher(shard_count: usize, hasher: H) -> Result<Self, ConfigError> {
        Ok(Self {
            map: ShardedMap::with_hasher(shard_count, hasher)?,
        })
    }

    /// Adds `delta` to the counter for `key` and returns the new value.
    ///
    /// A missing counter starts at `delta`. Overflow wraps.
    pub fn inc(&self, key: K, delta: i64) -> i64 {
        let mut result = delta;

        self.map.compute(key, |old| {
            if let Some(old) = old {
                result = old.wrapping_add(delta);
            }
            Some(result)
        });

        result
    }

    pub fn get<Q>(&self, key: &Q) -> Option<i64>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        H: KeyHasher<Q>,
    {
        self.map.get(key)
    }

    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        H: KeyHasher<Q>,
    {
        self.map.delete(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Copies every counter out, shard by shard (weakly consistent).
    pub fn snapshot(&self) -> Vec<(K, i64)>
    where
        K: Clone,
    {
        let mut out = Vec::with_capacity(self.map.len());
        self.map.range(|key, value| {
            out.push((key.clone(), *value));
            ControlFlow::Continue(())
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_inc() {
        let counters: CounterMap<String> = CounterMap::new(16).unwrap();

        assert_eq!(counters.inc("x".to_string(), 5), 5);
        assert_eq!(counters.inc("x".to_string(), 3), 8);
        assert_eq!(counters.get("x"), Some(8));
    }

    #[test]
    fn test_inc_negative_delta() {
        let counters: CounterMap<String> = CounterMap::new(4).unwrap();

        assert_eq!(counters.inc("balance".to_string(), -2), -2);
        assert_eq!(counters.inc("balance".to_string(), 10), 8);
    }

    #[test]
    fn test_get_missing() {
        let counters: CounterMap<String> = CounterMap::new(4).unwrap();
        assert_eq!(counters.get("nope"), None);
    }

    #[test]
    fn test_inc_wraps_on_overflow() {
        let counters: CounterMap<String> = CounterMap::new(4).unwrap();

        counters.inc("big".to_string(), i64::MAX);
        assert_eq!(counters.inc("big".to_string(), 1), i64::MIN);
    }

    #[test]
    fn test_zero_delta_creates_counter() {
        let counters: CounterMap<String> = CounterMap::new(4).unwrap();

        assert_eq!(counters.inc("zero".to_string(), 0), 0);
        assert_eq!(counters.get("zero"), Some(0));
        assert_eq!(counters.len(), 1);
    }

    #[test]
    fn test_delete_resets() {
        let counters: CounterMap<String> = CounterMap::new(4).unwrap();

        counters.inc("x".to_string(), 7);
        assert!(counters.delete("x"));
        assert_eq!(counters.inc("x".to_string(), 1), 1);
    }

    #[test]
    fn test_snapshot() {
        let counters: CounterMap<String> = CounterMap::new(8).unwrap();
        counters.inc("a".to_string(), 1);
        counters.inc("b".to_string(), 2);

        let mut snapshot = counters.snapshot();
        snapshot.sort();

        assert_eq!(
            snapshot,
            vec![("a".to_string(), 1), ("b".to_string(), 2)]
        );
    }

    #[test]
    fn test_concurrent_inc() {
        let counters: Arc<CounterMap<String>> = Arc::new(CounterMap::new(8).unwrap());
        let mut handles = vec![];

        for t in 0..10 {
            let counters = Arc::clone(&counters);
            handles.push(thread::spawn(move || {
                for i in 0..1000 {
                    counters.inc("shared".to_string(), 1);
                    counters.inc(format!("own-{}", t), 1);
                    counters.inc(format!("spread-{}", i % 50), 1);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counters.get("shared"), Some(10_000));
        for t in 0..10 {
            assert_eq!(counters.get(&format!("own-{}", t)), Some(1000));
        }
        assert_eq!(counters.len(), 1 + 10 + 50);
    }
}
