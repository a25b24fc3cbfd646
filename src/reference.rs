//! Reclaimable reference handles with constant hash and identity equality.

use core::fmt;
use core::hash::{Hash, Hasher};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// How aggressively a referent may be reclaimed once no external strong
/// handle remains.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Strength {
    /// Cleared only when the owning cache is told the host is under memory
    /// pressure (see `shed`), after weak references.
    Soft,
    /// Cleared as soon as no strong handle remains elsewhere.
    Weak,
}

pub(crate) struct RefState<T> {
    hash: u64,
    referent: Weak<T>,
    // Soft only: strong hold released under memory pressure. Stays None for
    // weak and lookup-only references.
    keepalive: Mutex<Option<Arc<T>>>,
}

impl<T> RefState<T> {
    pub(crate) fn is_reclaimed(&self) -> bool {
        self.referent.strong_count() == 0
    }

    pub(crate) fn release_keepalive(&self) {
        *self.keepalive.lock() = None;
    }
}

/// Reference handle wrapping a referent. The hash is captured once at
/// creation and never changes, even after the referent is reclaimed.
///
/// Equality is *referential*: two handles are equal when they are the same
/// handle, or when both referents are still reachable and are the same
/// allocation. A handle whose referent has been reclaimed can never again
/// equal anything except itself; it becomes an un-findable tombstone.
pub struct MildRef<T> {
    state: Arc<RefState<T>>,
}

impl<T> MildRef<T> {
    /// Mint a reference for insertion. The caller registers it with the
    /// owning map's reclamation queue.
    pub(crate) fn new(referent: &Arc<T>, hash: u64, strength: Strength) -> Self {
        let keepalive = match strength {
            Strength::Soft => Some(Arc::clone(referent)),
            Strength::Weak => None,
        };
        Self {
            state: Arc::new(RefState {
                hash,
                referent: Arc::downgrade(referent),
                keepalive: Mutex::new(keepalive),
            }),
        }
    }

    /// Lookup-only reference used to probe a container; never registered
    /// for reclamation and never holds a keepalive.
    pub(crate) fn probe(referent: &Arc<T>, hash: u64) -> Self {
        Self {
            state: Arc::new(RefState {
                hash,
                referent: Arc::downgrade(referent),
                keepalive: Mutex::new(None),
            }),
        }
    }

    /// The referent, if still reachable. Once `None`, always `None`.
    pub fn get(&self) -> Option<Arc<T>> {
        self.state.referent.upgrade()
    }

    pub fn is_reclaimed(&self) -> bool {
        self.state.is_reclaimed()
    }

    /// The hash captured at creation.
    pub fn captured_hash(&self) -> u64 {
        self.state.hash
    }

    /// True when both handles share the same underlying reference state,
    /// regardless of whether the referent is still reachable.
    pub(crate) fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub(crate) fn weak_state(&self) -> Weak<RefState<T>> {
        Arc::downgrade(&self.state)
    }

    pub(crate) fn from_state(state: Arc<RefState<T>>) -> Self {
        Self { state }
    }
}

impl<T> Clone for MildRef<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> PartialEq for MildRef<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.same(other) {
            return true; // exact same reference
        }
        match (self.get(), other.get()) {
            // different reference, but same referent
            (Some(a), Some(b)) => Arc::ptr_eq(&a, &b),
            _ => false,
        }
    }
}

impl<T> Eq for MildRef<T> {}

impl<T> Hash for MildRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.state.hash.hash(state);
    }
}

impl<T> fmt::Debug for MildRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MildRef")
            .field("hash", &self.state.hash)
            .field("reclaimed", &self.is_reclaimed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weak_ref(referent: &Arc<String>, hash: u64) -> MildRef<String> {
        MildRef::new(referent, hash, Strength::Weak)
    }

    /// Invariant: two references to the same allocation are equal; references
    /// to distinct but `==`-equal allocations are not.
    #[test]
    fn equality_is_referential_not_logical() {
        let a = Arc::new("same".to_string());
        let b = Arc::new("same".to_string());
        assert_eq!(a, b); // logically equal
        let ra = weak_ref(&a, 1);
        let ra2 = weak_ref(&a, 1);
        let rb = weak_ref(&b, 1);
        assert_eq!(ra, ra2);
        assert_ne!(ra, rb);
    }

    /// Invariant: a reclaimed reference equals only itself, including against
    /// another reclaimed reference to what was the same referent.
    #[test]
    fn reclaimed_reference_is_a_tombstone() {
        let a = Arc::new(7u32);
        let r1 = MildRef::new(&a, 9, Strength::Weak);
        let r2 = MildRef::new(&a, 9, Strength::Weak);
        assert_eq!(r1, r2);
        drop(a);
        assert!(r1.is_reclaimed());
        assert!(r1.get().is_none());
        assert_ne!(r1, r2);
        let r1_alias = r1.clone();
        assert_eq!(r1, r1_alias); // same handle still equals itself
    }

    /// Invariant: the captured hash survives reclamation unchanged.
    #[test]
    fn hash_is_constant_after_reclamation() {
        let a = Arc::new(42u64);
        let r = MildRef::new(&a, 0xfeed, Strength::Weak);
        assert_eq!(r.captured_hash(), 0xfeed);
        drop(a);
        assert!(r.get().is_none());
        assert_eq!(r.captured_hash(), 0xfeed);
    }

    /// Invariant: a soft reference keeps its referent reachable until the
    /// keepalive is released; afterwards it behaves weakly.
    #[test]
    fn soft_keepalive_defers_reclamation() {
        let a = Arc::new("held".to_string());
        let r = MildRef::new(&a, 3, Strength::Soft);
        drop(a);
        assert!(!r.is_reclaimed());
        assert_eq!(r.get().as_deref().map(String::as_str), Some("held"));
        r.state.release_keepalive();
        assert!(r.is_reclaimed());
        assert!(r.get().is_none());
    }

    /// Invariant: a lookup-only probe matches a stored reference to the same
    /// allocation but never keeps the referent alive.
    #[test]
    fn probe_matches_by_identity_without_retaining() {
        let a = Arc::new(1i32);
        let stored = MildRef::new(&a, 5, Strength::Weak);
        let probe = MildRef::probe(&a, 5);
        assert_eq!(stored, probe);
        drop(probe);
        drop(a);
        assert!(stored.is_reclaimed());
    }
}
