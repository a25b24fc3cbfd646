//! Map whose values are kept alive by soft/weak references.

use crate::queue::ReclaimQueue;
use crate::reference::{MildRef, Strength};
use crate::store::Store;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;
use std::sync::Arc;

/// Map from strong keys to `Arc<V>` values where entries do not keep their
/// values alive. Keys use ordinary logical equality; values are matched by
/// identity wherever a value appears on the compare side.
///
/// Mirrors `MildKeyMap` across the value side: mutating operations compact
/// first, read paths never do. An entry whose value has been reclaimed
/// still answers `contains_key` until the next mutating call; `get`
/// resolves it to `None` immediately.
pub struct MildValueMap<K, V, S = RandomState> {
    store: Store<K, MildRef<V>, S>,
    queue: ReclaimQueue<K, V>,
    strength: Strength,
}

impl<K, V, S> MildValueMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Hash,
    S: BuildHasher,
{
    pub(crate) fn with_hasher(strength: Strength, hasher: S) -> Self {
        Self {
            store: Store::with_hasher(hasher),
            queue: ReclaimQueue::new(),
            strength,
        }
    }

    pub(crate) fn with_capacity_and_hasher(strength: Strength, capacity: usize, hasher: S) -> Self {
        Self {
            store: Store::with_capacity_and_hasher(capacity, hasher),
            queue: ReclaimQueue::new(),
            strength,
        }
    }

    /// Soft or weak reference for the given value, registered under its
    /// owning key so compaction can find the entry from the strong side.
    fn mild_value(&self, key: &K, value: &Arc<V>) -> MildRef<V> {
        let hash = self.store.hasher().hash_one(&**value);
        let reference = MildRef::new(value, hash, self.strength);
        self.queue.register(key.clone(), &reference);
        reference
    }

    /// Compacts the map by removing entries whose value has been reclaimed.
    /// An entry that was overwritten since must not be clobbered by its
    /// predecessor's death, so removal is conditional on the entry still
    /// holding the delivered reference.
    fn compact(&mut self) {
        let store = &mut self.store;
        self.queue.drain(|key, reference| {
            store.remove_if(&key, |current| current.same(&reference));
        });
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        // skip compact for performance reasons
        self.store.get(key).and_then(MildRef::get)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        // skip compact for performance reasons; an entry whose value has
        // just been reclaimed still counts until the next mutating call
        self.store.contains_key(key)
    }

    /// Identity comparison of live values, matching the reference equality
    /// contract: a logically equal but separately allocated value is not
    /// contained.
    pub fn contains_value(&self, value: &Arc<V>) -> bool {
        self.store
            .iter()
            .any(|(_k, r)| r.get().map_or(false, |v| Arc::ptr_eq(&v, value)))
    }

    /// Inserts with a freshly minted reference, never reusing an existing
    /// one. Returns the previous value if it was still reachable.
    pub fn put(&mut self, key: K, value: &Arc<V>) -> Option<Arc<V>> {
        self.compact();
        let reference = self.mild_value(&key, value);
        self.store.insert(key, reference).and_then(|old| old.get())
    }

    /// Inserts every pair, compacting once up front.
    pub fn extend<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, Arc<V>)>,
    {
        self.compact();
        for (key, value) in entries {
            let reference = self.mild_value(&key, &value);
            self.store.insert(key, reference);
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<Arc<V>> {
        self.compact();
        self.store.remove(key).and_then(|(_k, r)| r.get())
    }

    /// Clears the backing container, then drains now-orphaned queue rows.
    pub fn clear(&mut self) {
        self.store.clear();
        self.compact();
    }

    pub fn len(&mut self) -> usize {
        self.compact();
        self.store.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.compact();
        self.store.is_empty()
    }

    /// Live entries: compacts first, then lazily skips entries whose value
    /// is reclaimed before being yielded. The `Arc<V>` is a strong hold for
    /// as long as the caller keeps it.
    pub fn iter(&mut self) -> impl Iterator<Item = (&K, Arc<V>)> {
        self.compact();
        self.store
            .iter()
            .filter_map(|(k, r)| r.get().map(|v| (k, v)))
    }

    /// Raw keys in storage order; no liveness filter on the value side.
    pub fn keys(&mut self) -> impl Iterator<Item = &K> {
        self.compact();
        self.store.iter().map(|(k, _r)| k)
    }

    pub fn values(&mut self) -> impl Iterator<Item = Arc<V>> + '_ {
        self.compact();
        self.store.iter().filter_map(|(_k, r)| r.get())
    }

    /// Traversal with removal: entries whose value has been reclaimed, or
    /// for which `pred` returns false, are dropped.
    pub fn retain(&mut self, mut pred: impl FnMut(&K, &Arc<V>) -> bool) {
        self.compact();
        self.store.retain(|k, r| match r.get() {
            Some(v) => pred(k, &v),
            None => false,
        });
    }

    /// Memory-pressure signal: releases soft keepalives and compacts.
    pub fn shed(&mut self) {
        self.queue.shed();
        self.compact();
    }
}
