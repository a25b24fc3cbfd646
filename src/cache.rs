//! Stateless factory surface producing the cache shapes.
//!
//! Two mirrored modules select the reference strength; each produces the
//! four map shapes plus the element collection, parameterized by initial
//! capacity and, for the concurrent shapes, a concurrency hint (the shard
//! count of the backing container). No behavior beyond construction and
//! strength selection.

/// Caches whose mild side is cleared as soon as no strong handle remains
/// elsewhere.
pub mod weak {
    use crate::concurrent::{ConcurrentMildKeyMap, ConcurrentMildValueMap};
    use crate::elements::MildSet;
    use crate::mild_keys::MildKeyMap;
    use crate::mild_values::MildValueMap;
    use crate::reference::Strength;
    use core::hash::Hash;
    use std::collections::hash_map::RandomState;

    pub fn key_map<K: Hash, V>() -> MildKeyMap<K, V> {
        MildKeyMap::with_hasher(Strength::Weak, RandomState::new())
    }

    pub fn key_map_with_capacity<K: Hash, V>(capacity: usize) -> MildKeyMap<K, V> {
        MildKeyMap::with_capacity_and_hasher(Strength::Weak, capacity, RandomState::new())
    }

    pub fn value_map<K, V>() -> MildValueMap<K, V>
    where
        K: Eq + Hash + Clone,
        V: Hash,
    {
        MildValueMap::with_hasher(Strength::Weak, RandomState::new())
    }

    pub fn value_map_with_capacity<K, V>(capacity: usize) -> MildValueMap<K, V>
    where
        K: Eq + Hash + Clone,
        V: Hash,
    {
        MildValueMap::with_capacity_and_hasher(Strength::Weak, capacity, RandomState::new())
    }

    pub fn concurrent_key_map<K, V>() -> ConcurrentMildKeyMap<K, V>
    where
        K: Hash + Send + Sync,
        V: Send + Sync,
    {
        ConcurrentMildKeyMap::with_hasher(Strength::Weak, RandomState::new())
    }

    pub fn concurrent_key_map_with<K, V>(
        capacity: usize,
        concurrency: usize,
    ) -> ConcurrentMildKeyMap<K, V>
    where
        K: Hash + Send + Sync,
        V: Send + Sync,
    {
        ConcurrentMildKeyMap::with_capacity_and_hasher(
            Strength::Weak,
            capacity,
            concurrency,
            RandomState::new(),
        )
    }

    pub fn concurrent_value_map<K, V>() -> ConcurrentMildValueMap<K, V>
    where
        K: Eq + Hash + Clone + Send + Sync,
        V: Hash + Send + Sync,
    {
        ConcurrentMildValueMap::with_hasher(Strength::Weak, RandomState::new())
    }

    pub fn concurrent_value_map_with<K, V>(
        capacity: usize,
        concurrency: usize,
    ) -> ConcurrentMildValueMap<K, V>
    where
        K: Eq + Hash + Clone + Send + Sync,
        V: Hash + Send + Sync,
    {
        ConcurrentMildValueMap::with_capacity_and_hasher(
            Strength::Weak,
            capacity,
            concurrency,
            RandomState::new(),
        )
    }

    pub fn elements<T: Hash>() -> MildSet<T> {
        MildSet::with_hasher(Strength::Weak, RandomState::new())
    }

    pub fn elements_with_capacity<T: Hash>(capacity: usize) -> MildSet<T> {
        MildSet::with_capacity_and_hasher(Strength::Weak, capacity, RandomState::new())
    }
}

/// Caches whose mild side survives until the owner signals memory pressure
/// via `shed`.
pub mod soft {
    use crate::concurrent::{ConcurrentMildKeyMap, ConcurrentMildValueMap};
    use crate::elements::MildSet;
    use crate::mild_keys::MildKeyMap;
    use crate::mild_values::MildValueMap;
    use crate::reference::Strength;
    use core::hash::Hash;
    use std::collections::hash_map::RandomState;

    pub fn key_map<K: Hash, V>() -> MildKeyMap<K, V> {
        MildKeyMap::with_hasher(Strength::Soft, RandomState::new())
    }

    pub fn key_map_with_capacity<K: Hash, V>(capacity: usize) -> MildKeyMap<K, V> {
        MildKeyMap::with_capacity_and_hasher(Strength::Soft, capacity, RandomState::new())
    }

    pub fn value_map<K, V>() -> MildValueMap<K, V>
    where
        K: Eq + Hash + Clone,
        V: Hash,
    {
        MildValueMap::with_hasher(Strength::Soft, RandomState::new())
    }

    pub fn value_map_with_capacity<K, V>(capacity: usize) -> MildValueMap<K, V>
    where
        K: Eq + Hash + Clone,
        V: Hash,
    {
        MildValueMap::with_capacity_and_hasher(Strength::Soft, capacity, RandomState::new())
    }

    pub fn concurrent_key_map<K, V>() -> ConcurrentMildKeyMap<K, V>
    where
        K: Hash + Send + Sync,
        V: Send + Sync,
    {
        ConcurrentMildKeyMap::with_hasher(Strength::Soft, RandomState::new())
    }

    pub fn concurrent_key_map_with<K, V>(
        capacity: usize,
        concurrency: usize,
    ) -> ConcurrentMildKeyMap<K, V>
    where
        K: Hash + Send + Sync,
        V: Send + Sync,
    {
        ConcurrentMildKeyMap::with_capacity_and_hasher(
            Strength::Soft,
            capacity,
            concurrency,
            RandomState::new(),
        )
    }

    pub fn concurrent_value_map<K, V>() -> ConcurrentMildValueMap<K, V>
    where
        K: Eq + Hash + Clone + Send + Sync,
        V: Hash + Send + Sync,
    {
        ConcurrentMildValueMap::with_hasher(Strength::Soft, RandomState::new())
    }

    pub fn concurrent_value_map_with<K, V>(
        capacity: usize,
        concurrency: usize,
    ) -> ConcurrentMildValueMap<K, V>
    where
        K: Eq + Hash + Clone + Send + Sync,
        V: Hash + Send + Sync,
    {
        ConcurrentMildValueMap::with_capacity_and_hasher(
            Strength::Soft,
            capacity,
            concurrency,
            RandomState::new(),
        )
    }

    pub fn elements<T: Hash>() -> MildSet<T> {
        MildSet::with_hasher(Strength::Soft, RandomState::new())
    }

    pub fn elements_with_capacity<T: Hash>(capacity: usize) -> MildSet<T> {
        MildSet::with_capacity_and_hasher(Strength::Soft, capacity, RandomState::new())
    }
}
