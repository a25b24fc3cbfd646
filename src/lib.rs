//! mild-cache: maps and sets whose keys or values are held through
//! reclaimable references, so cached metadata never pins its referents.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: plain-looking mapping types that self-evict entries once their
//!   referent has been reclaimed, without a maintenance thread or global
//!   lock.
//! - Layers:
//!   - MildRef<T>: reference handle over `std::sync::Weak` with a hash
//!     captured at creation and referential (identity) equality; soft
//!     references add a keepalive released under memory pressure.
//!   - ReclaimQueue: per-map registry of downgraded reference-state
//!     handles; one sweep delivers each reclaimed reference exactly once
//!     and prunes rows whose reference object was itself discarded.
//!   - Store<K, V, S>: structural layer, a hashbrown index over slotmap
//!     storage with per-entry precomputed hashes, so stored keys are never
//!     re-hashed after insertion.
//!   - MildKeyMap / MildValueMap: sequential maps, mild on the key or the
//!     value side; ConcurrentMildKeyMap / ConcurrentMildValueMap: sharded
//!     concurrent counterparts adding atomic put_if_absent / replace /
//!     replace_if / remove_if; MildSet: element collection over a key-mild
//!     map with ignored values.
//!   - weak / soft: stateless factory modules selecting the strength.
//!
//! Compaction discipline
//! - Every mutating call (put, remove, extend, clear, len, is_empty,
//!   iteration, retain, shed, the atomic operations) drains the queue
//!   before touching the map. Read paths (get, contains_key,
//!   contains_value) never compact and may transiently observe an entry
//!   whose referent has just been reclaimed; the divergence resolves at
//!   the next mutating call. Compaction is monotonic: a removed entry
//!   never reappears.
//!
//! Equality contract
//! - References hash by the referent's logical hash, captured once, but
//!   compare by identity of the live referents. Two separately allocated,
//!   `==`-equal keys never collide in a mild-key map; a reclaimed
//!   reference equals only itself. This is deliberate: metadata caches key
//!   on canonical instances (interned constants, shared descriptors), and
//!   the constant hash keeps a dead reference findable for removal.
//!
//! Reclamation model
//! - Referents are `Arc<T>`; reclamation is the strong count reaching
//!   zero. Weak references observe it immediately. Soft references hold a
//!   strong clone until the owner calls `shed()` (the memory-pressure
//!   signal); strict GC-driven timing is not reproducible outside a
//!   managed runtime and is not promised.
//!
//! Constraints and non-goals
//! - No background tasks: all work runs synchronously on the caller's
//!   thread. Reclamation timing is observed, never controlled.
//! - No LRU/TTL eviction; eviction is driven solely by reachability.
//! - Sequential maps carry no synchronization; compacting accessors
//!   (`len`, iteration) take `&mut self`. Concurrent maps delegate
//!   atomicity to the backing container's shard locks and add no ordering
//!   of their own.

mod cache;
mod concurrent;
mod elements;
mod mild_keys;
mod mild_values;
mod queue;
mod reference;
mod store;

// Public surface
pub use cache::{soft, weak};
pub use concurrent::{
    ConcurrentMildKeyMap, ConcurrentMildValueMap, KeyMapEntry, ValueRef, ValueRefMut,
};
pub use elements::MildSet;
pub use mild_keys::MildKeyMap;
pub use mild_values::MildValueMap;
pub use reference::{MildRef, Strength};
