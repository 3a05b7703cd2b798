//! Key hashing for shard routing.
//!
//! The map only needs a hash that is deterministic for the lifetime of the
//! process. Uniformity affects how evenly keys spread over shards, never
//! correctness.

/// FNV-1a 64-bit offset basis.
const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1a 64-bit prime.
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Maps a key to a 64-bit digest.
///
/// Implementations must be pure: the same key always yields the same digest.
/// When a map is queried through a borrowed form `Q` of its key type `K`
/// (`String` / `str`), both impls must agree on the digest.
pub trait KeyHasher<K: ?Sized>: Send + Sync {
    fn hash_key(&self, key: &K) -> u64;
}

impl<K: ?Sized, F> KeyHasher<K> for F
where
    F: Fn(&K) -> u64 + Send + Sync,
{
    #[inline]
    fn hash_key(&self, key: &K) -> u64 {
        self(key)
    }
}

/// The default hasher for byte-like keys: 64-bit FNV-1a.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fnv1a;

impl<K: AsRef<[u8]> + ?Sized> KeyHasher<K> for Fnv1a {
    #[inline]
    fn hash_key(&self, key: &K) -> u64 {
        fnv1a(key.as_ref())
    }
}

/// Hashes raw bytes with 64-bit FNV-1a.
#[inline]
pub fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}
