//! Per-map reclamation queue.
//!
//! Rust provides no enqueue-on-unreachable signal, so the queue keeps a
//! registry of downgraded handles to the state of every registered
//! reference and discovers reclamation by sweeping it. A sweep delivers
//! each reclaimed reference at most once and silently prunes rows whose
//! reference object was itself discarded (entry overwritten or cleared),
//! mirroring a host runtime that never enqueues an unreachable reference.

use crate::reference::{MildRef, RefState};
use parking_lot::Mutex;
use std::sync::Weak;

/// Exclusively owned by one mild map instance. The tag travels with each
/// registered reference so compaction can find the entry from the strong
/// side: `()` for key-mild maps, the owning key for value-mild maps.
pub(crate) struct ReclaimQueue<Tag, T> {
    registry: Mutex<Vec<(Tag, Weak<RefState<T>>)>>,
}

impl<Tag, T> ReclaimQueue<Tag, T> {
    pub(crate) fn new() -> Self {
        Self {
            registry: Mutex::new(Vec::new()),
        }
    }

    /// Track a freshly minted reference.
    pub(crate) fn register(&self, tag: Tag, reference: &MildRef<T>) {
        self.registry.lock().push((tag, reference.weak_state()));
    }

    /// One sweep over the registry. Reclaimed references are handed to
    /// `sink` exactly once, after the registry lock is released, so the
    /// sink may freely touch the owning map. Removal driven from here is
    /// monotonic: a delivered reference is dropped from the registry and
    /// can never be delivered again.
    pub(crate) fn drain(&self, mut sink: impl FnMut(Tag, MildRef<T>)) {
        let mut reclaimed = Vec::new();
        {
            let mut rows = self.registry.lock();
            let mut i = 0;
            while i < rows.len() {
                match rows[i].1.upgrade() {
                    // Reference object discarded before its referent: prune.
                    None => {
                        rows.swap_remove(i);
                    }
                    Some(state) if state.is_reclaimed() => {
                        let (tag, _) = rows.swap_remove(i);
                        reclaimed.push((tag, MildRef::from_state(state)));
                    }
                    Some(_) => i += 1,
                }
            }
        }
        for (tag, reference) in reclaimed {
            sink(tag, reference);
        }
    }

    /// Memory-pressure signal: release every registered soft keepalive so
    /// otherwise-unreferenced referents can be reclaimed.
    pub(crate) fn shed(&self) {
        let rows = self.registry.lock();
        for (_, row) in rows.iter() {
            if let Some(state) = row.upgrade() {
                state.release_keepalive();
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn registered(&self) -> usize {
        self.registry.lock().len()
    }
}
