//! A single independently locked partition of the key space.

use parking_lot::RwLock;
use std::collections::HashMap;

/// One shard: a plain `HashMap` behind its own reader/writer lock.
///
/// The lock is only reachable through [`Shard::read`] and [`Shard::write`],
/// which scope the guard to a closure so it is released on every exit path,
/// unwinding included.
#[derive(Debug)]
pub(crate) struct Shard<K, V> {
    data: RwLock<HashMap<K, V>>,
}

impl<K, V> Shard<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Runs `f` with the shard held in shared mode.
    #[inline]
    pub(crate) fn read<R>(&self, f: impl FnOnce(&HashMap<K, V>) -> R) -> R {
        let data = self.data.read();
        f(&data)
    }

    /// Runs `f` with the shard held in exclusive mode.
    #[inline]
    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut HashMap<K, V>) -> R) -> R {
        let mut data = self.data.write();
        f(&mut data)
    }

    pub(crate) fn len(&self) -> usize {
        self.read(|data| data.len())
    }
}
