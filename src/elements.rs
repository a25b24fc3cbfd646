//! Set-like collection of mildly held elements.

use crate::mild_keys::MildKeyMap;
use crate::reference::Strength;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;
use std::sync::Arc;

/// Collection whose elements do not keep their referents alive: a key-mild
/// map whose values are ignored. Membership follows the identity contract
/// of the underlying references.
pub struct MildSet<T, S = RandomState> {
    map: MildKeyMap<T, (), S>,
}

impl<T, S> MildSet<T, S>
where
    T: Hash,
    S: BuildHasher,
{
    pub(crate) fn with_hasher(strength: Strength, hasher: S) -> Self {
        Self {
            map: MildKeyMap::with_hasher(strength, hasher),
        }
    }

    pub(crate) fn with_capacity_and_hasher(strength: Strength, capacity: usize, hasher: S) -> Self {
        Self {
            map: MildKeyMap::with_capacity_and_hasher(strength, capacity, hasher),
        }
    }

    /// Adds the element; false when the same instance was already present.
    pub fn add(&mut self, element: &Arc<T>) -> bool {
        self.map.put(element, ()).is_none()
    }

    pub fn contains(&self, element: &Arc<T>) -> bool {
        self.map.contains_key(element)
    }

    pub fn remove(&mut self, element: &Arc<T>) -> bool {
        self.map.remove(element).is_some()
    }

    pub fn len(&mut self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&mut self) -> impl Iterator<Item = Arc<T>> + '_ {
        self.map.keys()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Memory-pressure signal: releases soft keepalives and compacts.
    pub fn shed(&mut self) {
        self.map.shed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{soft, weak};

    /// Invariant: membership is per instance; a logically equal but distinct
    /// allocation is a different element.
    #[test]
    fn membership_is_referential() {
        let mut set = weak::elements::<String>();
        let a = Arc::new("e".to_string());
        let twin = Arc::new("e".to_string());
        assert!(set.add(&a));
        assert!(!set.add(&a), "same instance is already present");
        assert!(set.contains(&a));
        assert!(!set.contains(&twin));
        assert!(set.add(&twin), "distinct instance is a new element");
        assert_eq!(set.len(), 2);
    }

    /// Invariant: dropped elements vanish at the next mutating call.
    #[test]
    fn dropped_elements_are_reclaimed() {
        let mut set = weak::elements::<String>();
        let kept = Arc::new("kept".to_string());
        let dropped = Arc::new("dropped".to_string());
        set.add(&kept);
        set.add(&dropped);
        drop(dropped);
        assert_eq!(set.len(), 1);
        let seen: Vec<_> = set.iter().collect();
        assert!(seen.iter().any(|e| Arc::ptr_eq(e, &kept)));
    }

    /// Invariant: soft elements survive external drops until shed.
    #[test]
    fn soft_elements_survive_until_shed() {
        let mut set = soft::elements::<i32>();
        let e = Arc::new(1);
        set.add(&e);
        drop(e);
        assert_eq!(set.len(), 1);
        set.shed();
        assert!(set.is_empty());
    }
}
