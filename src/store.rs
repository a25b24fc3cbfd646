//! Structural layer: an ordered key-value container with a hash index.
//!
//! A `hashbrown::HashTable` index over `slotmap::SlotMap` storage. Each
//! entry records its hash at insertion and indexing always uses the stored
//! hash, so stored keys are never re-hashed; probing a reference key after
//! its referent died must use the hash captured at creation.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;

struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
}

pub(crate) struct Store<K, V, S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Entry<K, V>>, // storage using generational keys
}

impl<K, V, S> Store<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub(crate) fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::new(),
            slots: SlotMap::with_key(),
        }
    }

    pub(crate) fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::with_capacity(capacity),
            slots: SlotMap::with_capacity_and_key(capacity),
        }
    }

    /// The hasher is shared with the owning map so captured reference
    /// hashes and probe hashes agree.
    pub(crate) fn hasher(&self) -> &S {
        &self.hasher
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn find_slot<Q>(&self, q: &Q) -> Option<DefaultKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.hasher.hash_one(q);
        self.index
            .find(hash, |&kk| {
                self.slots
                    .get(kk)
                    .map(|e| e.key.borrow() == q)
                    .unwrap_or(false)
            })
            .copied()
    }

    pub(crate) fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.slots.get(self.find_slot(q)?).map(|e| &e.value)
    }

    pub(crate) fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.find_slot(q)?;
        self.slots.get_mut(slot).map(|e| &mut e.value)
    }

    pub(crate) fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find_slot(q).is_some()
    }

    /// Insert or replace. On replace the original key object is kept and
    /// only the value is swapped out, like a plain map.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.hasher.hash_one(&key);
        match self.index.entry(
            hash,
            |&kk| self.slots.get(kk).map(|e| e.key == key).unwrap_or(false),
            |&kk| self.slots.get(kk).map(|e| e.hash).unwrap_or(0),
        ) {
            hashbrown::hash_table::Entry::Occupied(o) => {
                let slot = *o.get();
                let entry = self
                    .slots
                    .get_mut(slot)
                    .expect("indexed slot must be live");
                Some(core::mem::replace(&mut entry.value, value))
            }
            hashbrown::hash_table::Entry::Vacant(v) => {
                let slot = self.slots.insert(Entry { key, value, hash });
                let _ = v.insert(slot);
                None
            }
        }
    }

    pub(crate) fn remove<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.find_slot(q)?;
        self.remove_slot(slot)
    }

    /// Conditional removal: the entry is removed only when `pred` accepts
    /// its current value.
    pub(crate) fn remove_if<Q>(&mut self, q: &Q, pred: impl FnOnce(&V) -> bool) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.find_slot(q)?;
        if !pred(&self.slots.get(slot)?.value) {
            return None;
        }
        self.remove_slot(slot)
    }

    fn remove_slot(&mut self, slot: DefaultKey) -> Option<(K, V)> {
        let entry = self.slots.remove(slot)?;
        // Unlink from the index using the stored hash.
        self.index
            .find_entry(entry.hash, |&kk| kk == slot)
            .unwrap()
            .remove();
        Some((entry.key, entry.value))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.slots.iter().map(|(_slot, e)| (&e.key, &e.value))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut V)> {
        self.slots.iter_mut().map(|(_slot, e)| (&e.key, &mut e.value))
    }

    pub(crate) fn retain(&mut self, mut pred: impl FnMut(&K, &mut V) -> bool) {
        let mut dropped = Vec::new();
        for (slot, e) in self.slots.iter_mut() {
            if !pred(&e.key, &mut e.value) {
                dropped.push(slot);
            }
        }
        for slot in dropped {
            self.remove_slot(slot);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::hash::Hasher;
    use std::collections::BTreeSet;

    fn store() -> Store<String, i32> {
        Store::with_hasher(RandomState::new())
    }

    /// Invariant: inserting an existing key replaces the value and returns
    /// the previous one; the map length is unchanged.
    #[test]
    fn insert_replaces_and_returns_previous() {
        let mut m = store();
        assert_eq!(m.insert("k".to_string(), 1), None);
        assert_eq!(m.insert("k".to_string(), 2), Some(1));
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("k"), Some(&2));
    }

    /// Invariant: borrowed lookup works (store `String`, query with `&str`).
    #[test]
    fn borrowed_lookup_with_str() {
        let mut m = store();
        m.insert("hello".to_string(), 1);
        assert!(m.contains_key("hello"));
        assert!(!m.contains_key("world"));
        assert_eq!(m.get("hello"), Some(&1));
        assert_eq!(m.remove("hello"), Some(("hello".to_string(), 1)));
        assert!(m.is_empty());
    }

    /// Invariant: lookups resolve correctly under heavy hash collisions;
    /// equality disambiguates entries in the same bucket.
    #[test]
    fn collision_handling_with_const_hasher() {
        #[derive(Clone, Default)]
        struct ConstBuildHasher;
        struct ConstHasher;
        impl BuildHasher for ConstBuildHasher {
            type Hasher = ConstHasher;
            fn build_hasher(&self) -> Self::Hasher {
                ConstHasher
            }
        }
        impl Hasher for ConstHasher {
            fn write(&mut self, _bytes: &[u8]) {}
            fn finish(&self) -> u64 {
                0
            } // force all keys into the same bucket
        }

        let mut m: Store<String, i32, ConstBuildHasher> =
            Store::with_hasher(ConstBuildHasher);
        m.insert("a".to_string(), 1);
        m.insert("b".to_string(), 2);
        assert_eq!(m.get("a"), Some(&1));
        assert_eq!(m.get("b"), Some(&2));
        assert_eq!(m.remove("a"), Some(("a".to_string(), 1)));
        assert_eq!(m.get("b"), Some(&2));
    }

    /// Invariant: `remove_if` removes only when the predicate accepts the
    /// current value, and leaves the entry intact otherwise.
    #[test]
    fn remove_if_is_conditional() {
        let mut m = store();
        m.insert("k".to_string(), 5);
        assert_eq!(m.remove_if("k", |v| *v == 9), None);
        assert_eq!(m.get("k"), Some(&5));
        assert_eq!(m.remove_if("k", |v| *v == 5), Some(("k".to_string(), 5)));
        assert!(m.is_empty());
    }

    /// Invariant: `retain` keeps exactly the accepted entries and may mutate
    /// values during the traversal.
    #[test]
    fn retain_filters_and_mutates() {
        let mut m = store();
        for (i, k) in ["a", "b", "c", "d"].iter().enumerate() {
            m.insert((*k).to_string(), i as i32);
        }
        m.retain(|k, v| {
            *v += 10;
            k != "b"
        });
        assert_eq!(m.len(), 3);
        assert!(!m.contains_key("b"));
        assert_eq!(m.get("a"), Some(&10));
        assert_eq!(m.get("d"), Some(&13));
    }

    /// Invariant: iteration yields each live entry exactly once; `iter_mut`
    /// updates are visible to later lookups.
    #[test]
    fn iteration_and_mutation() {
        let mut m = store();
        let keys = ["k1", "k2", "k3"];
        for (i, k) in keys.iter().enumerate() {
            m.insert((*k).to_string(), i as i32);
        }
        let seen: BTreeSet<String> = m.iter().map(|(k, _v)| k.clone()).collect();
        let expected: BTreeSet<String> = keys.iter().map(|s| (*s).to_string()).collect();
        assert_eq!(seen, expected);

        for (_k, v) in m.iter_mut() {
            *v += 10;
        }
        assert_eq!(m.get("k2"), Some(&11));
    }

    /// Invariant: `clear` empties both storage and index; reinsertion after
    /// clear behaves like insertion into a fresh store.
    #[test]
    fn clear_then_reinsert() {
        let mut m = store();
        m.insert("a".to_string(), 1);
        m.insert("b".to_string(), 2);
        m.clear();
        assert!(m.is_empty());
        assert!(!m.contains_key("a"));
        assert_eq!(m.insert("a".to_string(), 3), None);
        assert_eq!(m.get("a"), Some(&3));
    }
}
