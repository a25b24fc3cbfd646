//! Map whose keys are kept alive by soft/weak references.

use crate::queue::ReclaimQueue;
use crate::reference::{MildRef, Strength};
use crate::store::Store;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;
use std::sync::Arc;

/// Map from `Arc<K>` keys to strong values where entries do not keep their
/// keys alive. Lookup is by identity, not logical equality: two separately
/// allocated but `==`-equal keys never match.
///
/// Every mutating operation drains the reclamation queue first; read paths
/// (`get`, `contains_key`, `contains_value`) skip compaction and may
/// transiently observe an entry whose key has just been reclaimed. The
/// divergence is resolved by the next mutating call.
///
/// Not internally synchronized: mutating operations take `&mut self`,
/// including `len` and iteration, which compact before reporting.
pub struct MildKeyMap<K, V, S = RandomState> {
    store: Store<MildRef<K>, V, S>,
    queue: ReclaimQueue<(), K>,
    strength: Strength,
}

impl<K, V, S> MildKeyMap<K, V, S>
where
    K: Hash,
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

    /// Soft or weak reference for the given key, registered for reclamation.
    fn mild_key(&self, key: &Arc<K>) -> MildRef<K> {
        let hash = self.store.hasher().hash_one(&**key);
        let reference = MildRef::new(key, hash, self.strength);
        self.queue.register((), &reference);
        reference
    }

    /// Temporary reference for the given key; used in queries.
    fn temp_key(&self, key: &Arc<K>) -> MildRef<K> {
        MildRef::probe(key, self.store.hasher().hash_one(&**key))
    }

    /// Compacts the map by removing entries whose key has been reclaimed.
    fn compact(&mut self) {
        let store = &mut self.store;
        self.queue.drain(|(), reference| {
            store.remove(&reference);
        });
    }

    pub fn get(&self, key: &Arc<K>) -> Option<&V> {
        // skip compact for performance reasons
        self.store.get(&self.temp_key(key))
    }

    pub fn get_mut(&mut self, key: &Arc<K>) -> Option<&mut V> {
        // access path, not a structural mutation: no compact
        let probe = self.temp_key(key);
        self.store.get_mut(&probe)
    }

    pub fn contains_key(&self, key: &Arc<K>) -> bool {
        // skip compact for performance reasons
        self.store.contains_key(&self.temp_key(key))
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        // skip compact for performance reasons; entries whose key has just
        // been reclaimed still count until the next mutating call
        self.store.iter().any(|(_k, v)| v == value)
    }

    /// Inserts with a freshly minted reference, never reusing an existing
    /// one. Replacing keeps the stored key reference; the fresh orphan is
    /// pruned from the registry on a later sweep.
    pub fn put(&mut self, key: &Arc<K>, value: V) -> Option<V> {
        self.compact();
        let reference = self.mild_key(key);
        self.store.insert(reference, value)
    }

    /// Inserts every pair, compacting once up front.
    pub fn extend<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (Arc<K>, V)>,
    {
        self.compact();
        for (key, value) in entries {
            let reference = self.mild_key(&key);
            self.store.insert(reference, value);
        }
    }

    pub fn remove(&mut self, key: &Arc<K>) -> Option<V> {
        self.compact();
        let probe = self.temp_key(key);
        self.store.remove(&probe).map(|(_k, v)| v)
    }

    /// Clears the backing container, then drains now-orphaned queue rows so
    /// the registry does not grow unboundedly.
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

    /// Live entries. Compacts first, then skips any entry whose key is
    /// reclaimed between compaction and the moment it is yielded. The
    /// returned `Arc<K>` is a strong hold: an entry stays usable for as
    /// long as the caller keeps it.
    pub fn iter(&mut self) -> impl Iterator<Item = (Arc<K>, &V)> {
        self.compact();
        self.store
            .iter()
            .filter_map(|(r, v)| r.get().map(|k| (k, v)))
    }

    /// Like `iter`, but yields mutable values; writes are visible to later
    /// lookups.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Arc<K>, &mut V)> {
        self.compact();
        self.store
            .iter_mut()
            .filter_map(|(r, v)| r.get().map(|k| (k, v)))
    }

    pub fn keys(&mut self) -> impl Iterator<Item = Arc<K>> + '_ {
        self.compact();
        self.store.iter().filter_map(|(r, _v)| r.get())
    }

    /// Raw values in storage order. Compacts first but applies no liveness
    /// filter: a value whose key is reclaimed mid-traversal is still
    /// yielded.
    pub fn values(&mut self) -> impl Iterator<Item = &V> {
        self.compact();
        self.store.iter().map(|(_r, v)| v)
    }

    /// Traversal with removal: entries whose key has been reclaimed, or for
    /// which `pred` returns false, are dropped.
    pub fn retain(&mut self, mut pred: impl FnMut(&Arc<K>, &mut V) -> bool) {
        self.compact();
        self.store.retain(|r, v| match r.get() {
            Some(k) => pred(&k, v),
            None => false,
        });
    }

    /// Memory-pressure signal: releases the strong holds of soft references
    /// and compacts. Weak maps are unaffected.
    pub fn shed(&mut self) {
        self.queue.shed();
        self.compact();
    }

    #[cfg(test)]
    pub(crate) fn registered(&self) -> usize {
        self.queue.registered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{soft, weak};

    /// Invariant: a fresh reference is minted and registered on every put,
    /// even when the key is already present.
    #[test]
    fn put_always_registers_a_fresh_reference() {
        let mut m = weak::key_map::<String, i32>();
        let k = Arc::new("k".to_string());
        m.put(&k, 1);
        assert_eq!(m.registered(), 1);
        m.put(&k, 2);
        // The replaced insertion left an orphaned registration behind...
        assert_eq!(m.registered(), 2);
        // ...which the next compaction prunes.
        assert_eq!(m.len(), 1);
        assert_eq!(m.registered(), 1);
        assert_eq!(m.get(&k), Some(&2));
    }

    /// Invariant: the read path skips compaction, so a value whose key has
    /// just been reclaimed is still visible to `contains_value` until the
    /// next mutating call.
    #[test]
    fn read_path_tolerates_stale_entries() {
        let mut m = weak::key_map::<String, i32>();
        let k = Arc::new("gone".to_string());
        m.put(&k, 99);
        drop(k);
        assert!(m.contains_value(&99), "stale entry visible on read path");
        let anchor = Arc::new("anchor".to_string());
        m.put(&anchor, 1); // mutating call compacts
        assert!(!m.contains_value(&99));
        assert_eq!(m.len(), 1);
    }

    /// Invariant: `clear` leaves the registry prunable; no rows survive once
    /// the cleared entries' references are swept.
    #[test]
    fn clear_drains_orphaned_registrations() {
        let mut m = weak::key_map::<String, i32>();
        let keys: Vec<_> = (0..4).map(|i| Arc::new(format!("k{i}"))).collect();
        for (i, k) in keys.iter().enumerate() {
            m.put(k, i as i32);
        }
        assert_eq!(m.registered(), 4);
        m.clear();
        assert!(m.is_empty());
        assert_eq!(m.registered(), 0, "cleared entries leave no registry rows");
    }

    /// Invariant: a soft map retains entries after external handles drop,
    /// until shed releases the keepalives.
    #[test]
    fn soft_entries_survive_until_shed() {
        let mut m = soft::key_map::<String, i32>();
        let k = Arc::new("soft".to_string());
        m.put(&k, 5);
        drop(k);
        assert_eq!(m.len(), 1, "soft keepalive pins the entry");
        m.shed();
        assert_eq!(m.len(), 0);
    }

    /// Invariant: iteration skips reclaimed entries lazily and yields strong
    /// key handles.
    #[test]
    fn iteration_yields_only_reachable_keys() {
        let mut m = weak::key_map::<String, i32>();
        let kept = Arc::new("kept".to_string());
        let dropped = Arc::new("dropped".to_string());
        m.put(&kept, 1);
        m.put(&dropped, 2);
        drop(dropped);
        let entries: Vec<_> = m.iter().map(|(k, v)| ((*k).clone(), *v)).collect();
        assert_eq!(entries, vec![("kept".to_string(), 1)]);
    }

    /// Invariant: writes through `iter_mut` are visible to later gets.
    #[test]
    fn iter_mut_updates_are_visible() {
        let mut m = weak::key_map::<String, i32>();
        let k = Arc::new("k".to_string());
        m.put(&k, 10);
        for (_key, v) in m.iter_mut() {
            *v = 20;
        }
        assert_eq!(m.get(&k), Some(&20));
    }
}
