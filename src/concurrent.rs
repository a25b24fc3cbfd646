//! Thread-safe mild maps with atomic compare-and-swap operations.
//!
//! Both variants layer the reference/compaction mechanics over a sharded
//! concurrent container and delegate every atomic step to the container's
//! native shard-level atomicity. Compaction runs before, never interleaved
//! with, the atomic step; it needs no extra coordination because it only
//! removes entries whose reference has already cleared, which is monotonic
//! and idempotent.

use crate::queue::ReclaimQueue;
use crate::reference::{MildRef, Strength};
use core::hash::{BuildHasher, Hash};
use core::mem;
use core::ops::{Deref, DerefMut};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::hash_map::RandomState;
use std::sync::Arc;

fn shard_amount(concurrency: usize) -> usize {
    // the container requires a power of two, at least two
    concurrency.next_power_of_two().max(2)
}

/// Shared read guard for a value; holds the entry's shard for its lifetime.
pub struct ValueRef<'a, K, V> {
    inner: dashmap::mapref::one::Ref<'a, MildRef<K>, V>,
}

impl<K, V> Deref for ValueRef<'_, K, V> {
    type Target = V;
    fn deref(&self) -> &V {
        self.inner.value()
    }
}

/// Exclusive guard for a value; writes are visible to later lookups.
pub struct ValueRefMut<'a, K, V> {
    inner: dashmap::mapref::one::RefMut<'a, MildRef<K>, V>,
}

impl<K, V> Deref for ValueRefMut<'_, K, V> {
    type Target = V;
    fn deref(&self) -> &V {
        self.inner.value()
    }
}

impl<K, V> DerefMut for ValueRefMut<'_, K, V> {
    fn deref_mut(&mut self) -> &mut V {
        self.inner.value_mut()
    }
}

/// Entry yielded by [`ConcurrentMildKeyMap::iter`]: a strong key handle
/// plus a shared guard on the value.
pub struct KeyMapEntry<'a, K, V> {
    key: Arc<K>,
    guard: dashmap::mapref::multiple::RefMulti<'a, MildRef<K>, V>,
}

impl<K, V> KeyMapEntry<'_, K, V> {
    pub fn key(&self) -> &Arc<K> {
        &self.key
    }

    pub fn value(&self) -> &V {
        self.guard.value()
    }
}

impl<K, V> Deref for KeyMapEntry<'_, K, V> {
    type Target = V;
    fn deref(&self) -> &V {
        self.guard.value()
    }
}

/// Thread-safe map from `Arc<K>` keys to strong values where entries do
/// not keep their keys alive. Identity-based lookup, mutating operations
/// compact first, read paths never do; see `MildKeyMap` for the shared
/// contract.
pub struct ConcurrentMildKeyMap<K, V, S = RandomState> {
    map: DashMap<MildRef<K>, V>,
    queue: ReclaimQueue<(), K>,
    hasher: S,
    strength: Strength,
}

impl<K, V, S> ConcurrentMildKeyMap<K, V, S>
where
    K: Hash + Send + Sync,
    V: Send + Sync,
    S: BuildHasher,
{
    pub(crate) fn with_hasher(strength: Strength, hasher: S) -> Self {
        Self {
            map: DashMap::new(),
            queue: ReclaimQueue::new(),
            hasher,
            strength,
        }
    }

    pub(crate) fn with_capacity_and_hasher(
        strength: Strength,
        capacity: usize,
        concurrency: usize,
        hasher: S,
    ) -> Self {
        Self {
            map: DashMap::with_capacity_and_shard_amount(capacity, shard_amount(concurrency)),
            queue: ReclaimQueue::new(),
            hasher,
            strength,
        }
    }

    fn mild_key(&self, key: &Arc<K>) -> MildRef<K> {
        let reference = MildRef::new(key, self.hasher.hash_one(&**key), self.strength);
        self.queue.register((), &reference);
        reference
    }

    fn temp_key(&self, key: &Arc<K>) -> MildRef<K> {
        MildRef::probe(key, self.hasher.hash_one(&**key))
    }

    fn compact(&self) {
        self.queue.drain(|(), reference| {
            // a reclaimed reference equals only itself, so this removes
            // exactly the entry that still holds it
            self.map.remove(&reference);
        });
    }

    pub fn get(&self, key: &Arc<K>) -> Option<ValueRef<'_, K, V>> {
        // skip compact for performance reasons
        self.map
            .get(&self.temp_key(key))
            .map(|inner| ValueRef { inner })
    }

    pub fn get_mut(&self, key: &Arc<K>) -> Option<ValueRefMut<'_, K, V>> {
        self.map
            .get_mut(&self.temp_key(key))
            .map(|inner| ValueRefMut { inner })
    }

    pub fn contains_key(&self, key: &Arc<K>) -> bool {
        // skip compact for performance reasons
        self.map.contains_key(&self.temp_key(key))
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        // skip compact for performance reasons
        self.map.iter().any(|entry| *entry.value() == *value)
    }

    pub fn put(&self, key: &Arc<K>, value: V) -> Option<V> {
        self.compact();
        self.map.insert(self.mild_key(key), value)
    }

    /// Atomically inserts a freshly minted reference only when the key is
    /// absent; returns the previous value otherwise.
    pub fn put_if_absent(&self, key: &Arc<K>, value: V) -> Option<V>
    where
        V: Clone,
    {
        self.compact();
        match self.map.entry(self.mild_key(key)) {
            Entry::Occupied(occupied) => Some(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                vacant.insert(value);
                None
            }
        }
    }

    /// Atomically replaces the value when the key is present; absent keys
    /// are left absent.
    pub fn replace(&self, key: &Arc<K>, value: V) -> Option<V> {
        self.compact();
        self.map
            .get_mut(&self.temp_key(key))
            .map(|mut guard| mem::replace(guard.value_mut(), value))
    }

    /// Atomically replaces only when the current value equals `expected`;
    /// returns whether the swap happened.
    pub fn replace_if(&self, key: &Arc<K>, expected: &V, value: V) -> bool
    where
        V: PartialEq,
    {
        self.compact();
        match self.map.get_mut(&self.temp_key(key)) {
            Some(mut guard) if *guard.value() == *expected => {
                *guard.value_mut() = value;
                true
            }
            _ => false,
        }
    }

    pub fn remove(&self, key: &Arc<K>) -> Option<V> {
        self.compact();
        self.map.remove(&self.temp_key(key)).map(|(_k, v)| v)
    }

    /// Atomic conditional removal: the entry goes only when its current
    /// value equals `expected`.
    pub fn remove_if(&self, key: &Arc<K>, expected: &V) -> bool
    where
        V: PartialEq,
    {
        self.compact();
        self.map
            .remove_if(&self.temp_key(key), |_k, v| *v == *expected)
            .is_some()
    }

    pub fn extend<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (Arc<K>, V)>,
    {
        self.compact();
        for (key, value) in entries {
            self.map.insert(self.mild_key(&key), value);
        }
    }

    pub fn clear(&self) {
        self.map.clear();
        self.compact();
    }

    pub fn len(&self) -> usize {
        self.compact();
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compact();
        self.map.is_empty()
    }

    /// Live entries; reclaimed keys are skipped at yield time. Each entry
    /// holds its shard's read lock while it is alive.
    pub fn iter(&self) -> impl Iterator<Item = KeyMapEntry<'_, K, V>> {
        self.compact();
        self.map.iter().filter_map(|guard| {
            let key = guard.key().get()?;
            Some(KeyMapEntry { key, guard })
        })
    }

    /// Traversal with removal: entries whose key has been reclaimed, or for
    /// which `pred` returns false, are dropped.
    pub fn retain(&self, mut pred: impl FnMut(&Arc<K>, &mut V) -> bool) {
        self.compact();
        self.map.retain(|reference, value| match reference.get() {
            Some(key) => pred(&key, value),
            None => false,
        });
    }

    /// Memory-pressure signal: releases soft keepalives and compacts.
    pub fn shed(&self) {
        self.queue.shed();
        self.compact();
    }
}

/// Thread-safe map from strong keys to `Arc<V>` values where entries do
/// not keep their values alive. Values are matched by identity on every
/// compare side, consistent with the reference equality contract.
pub struct ConcurrentMildValueMap<K, V, S = RandomState> {
    map: DashMap<K, MildRef<V>>,
    queue: ReclaimQueue<K, V>,
    hasher: S,
    strength: Strength,
}

impl<K, V, S> ConcurrentMildValueMap<K, V, S>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Hash + Send + Sync,
    S: BuildHasher,
{
    pub(crate) fn with_hasher(strength: Strength, hasher: S) -> Self {
        Self {
            map: DashMap::new(),
            queue: ReclaimQueue::new(),
            hasher,
            strength,
        }
    }

    pub(crate) fn with_capacity_and_hasher(
        strength: Strength,
        capacity: usize,
        concurrency: usize,
        hasher: S,
    ) -> Self {
        Self {
            map: DashMap::with_capacity_and_shard_amount(capacity, shard_amount(concurrency)),
            queue: ReclaimQueue::new(),
            hasher,
            strength,
        }
    }

    fn mild_value(&self, key: &K, value: &Arc<V>) -> MildRef<V> {
        let reference = MildRef::new(value, self.hasher.hash_one(&**value), self.strength);
        self.queue.register(key.clone(), &reference);
        reference
    }

    fn compact(&self) {
        self.queue.drain(|key, reference| {
            // conditional: the entry may have been overwritten between the
            // sweep observing the reclaimed reference and this removal
            self.map
                .remove_if(&key, |_k, current| current.same(&reference));
        });
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        // skip compact for performance reasons
        self.map.get(key).and_then(|guard| guard.value().get())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        // skip compact for performance reasons
        self.map.contains_key(key)
    }

    pub fn contains_value(&self, value: &Arc<V>) -> bool {
        self.map
            .iter()
            .any(|entry| entry.value().get().map_or(false, |v| Arc::ptr_eq(&v, value)))
    }

    pub fn put(&self, key: K, value: &Arc<V>) -> Option<Arc<V>> {
        self.compact();
        let reference = self.mild_value(&key, value);
        self.map.insert(key, reference).and_then(|old| old.get())
    }

    /// Atomically inserts only when the key is absent. An existing entry
    /// blocks the insertion even when its referent has just been reclaimed;
    /// that transient race resolves at the next compaction.
    pub fn put_if_absent(&self, key: K, value: &Arc<V>) -> Option<Arc<V>> {
        self.compact();
        let reference = self.mild_value(&key, value);
        match self.map.entry(key) {
            Entry::Occupied(occupied) => occupied.get().get(),
            Entry::Vacant(vacant) => {
                vacant.insert(reference);
                None
            }
        }
    }

    /// Atomically replaces the value when the key is mapped, always minting
    /// and registering a fresh reference for the replacement.
    pub fn replace(&self, key: &K, value: &Arc<V>) -> Option<Arc<V>> {
        self.compact();
        let reference = self.mild_value(key, value);
        self.map
            .get_mut(key)
            .map(|mut guard| mem::replace(guard.value_mut(), reference).get())
            .flatten()
    }

    /// Atomically replaces only when the current value is `expected` itself
    /// (identity, not logical equality); returns whether the swap happened.
    pub fn replace_if(&self, key: &K, expected: &Arc<V>, value: &Arc<V>) -> bool {
        self.compact();
        let reference = self.mild_value(key, value);
        match self.map.get_mut(key) {
            Some(mut guard)
                if guard
                    .value()
                    .get()
                    .map_or(false, |v| Arc::ptr_eq(&v, expected)) =>
            {
                *guard.value_mut() = reference;
                true
            }
            _ => false,
        }
    }

    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.compact();
        self.map.remove(key).and_then(|(_k, r)| r.get())
    }

    /// Atomic conditional removal by value identity.
    pub fn remove_if(&self, key: &K, expected: &Arc<V>) -> bool {
        self.compact();
        self.map
            .remove_if(key, |_k, r| {
                r.get().map_or(false, |v| Arc::ptr_eq(&v, expected))
            })
            .is_some()
    }

    pub fn extend<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, Arc<V>)>,
    {
        self.compact();
        for (key, value) in entries {
            let reference = self.mild_value(&key, &value);
            self.map.insert(key, reference);
        }
    }

    pub fn clear(&self) {
        self.map.clear();
        self.compact();
    }

    pub fn len(&self) -> usize {
        self.compact();
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compact();
        self.map.is_empty()
    }

    /// Live entries as owned pairs; reclaimed values are skipped at yield
    /// time.
    pub fn iter(&self) -> impl Iterator<Item = (K, Arc<V>)> + '_ {
        self.compact();
        self.map.iter().filter_map(|entry| {
            let value = entry.value().get()?;
            Some((entry.key().clone(), value))
        })
    }

    /// Traversal with removal: entries whose value has been reclaimed, or
    /// for which `pred` returns false, are dropped.
    pub fn retain(&self, mut pred: impl FnMut(&K, &Arc<V>) -> bool) {
        self.compact();
        self.map.retain(|key, reference| match reference.get() {
            Some(value) => pred(key, &value),
            None => false,
        });
    }

    /// Memory-pressure signal: releases soft keepalives and compacts.
    pub fn shed(&self) {
        self.queue.shed();
        self.compact();
    }
}
