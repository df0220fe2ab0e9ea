//! Peer registry: who is where, bounded by LRU eviction.
//!
//! A key index over an LRU slab, behind one mutex. The UDP loop upserts and
//! looks up; the monitor and the SIGHUP dump only enumerate. Records are
//! `Copy`, so callers always get their own copy and never a reference into
//! the table.
//!
//! Entries leave the table only by eviction. Clients re-register
//! periodically; stale addresses are tolerated, not detected.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use lru_slab::LruSlab;
use punch_core::wire::{PeerKey, PeerRecord};

/// Result of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    /// New key. `evicted` is the least recently used key pushed out to make room.
    Inserted { evicted: Option<PeerKey> },
    /// Known key. Address and recency updated in place.
    Refreshed,
    /// The registry has zero capacity and stores nothing.
    Discarded,
}

/// Snapshot of one resident peer, for monitoring.
#[derive(Debug, Clone, Copy)]
pub struct RegistryEntry {
    pub record: PeerRecord,
    /// Time of the most recent upsert for this key.
    pub registered_at: Instant,
}

/// The peer registry. Clones share the same table.
#[derive(Clone)]
pub struct PeerRegistry {
    inner: Arc<Mutex<State>>,
}

impl PeerRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(State::new(capacity))),
        }
    }

    /// Insert or refresh the record stored under `record.key()`.
    pub fn upsert(&self, record: PeerRecord) -> Upserted {
        let outcome = self.state().upsert(record, Instant::now());
        if let Upserted::Inserted {
            evicted: Some(evicted),
        } = outcome
        {
            tracing::debug!(
                evicted = evicted.short(),
                admitted = record.key().short(),
                "registry full, evicted least recently used peer"
            );
        }
        outcome
    }

    /// Current record for `key`. A hit counts as use for eviction purposes.
    pub fn lookup(&self, key: &PeerKey) -> Option<PeerRecord> {
        self.state().lookup(key)
    }

    /// Point-in-time copy of every resident entry. Order is unspecified.
    /// Does not touch recency.
    pub fn enumerate(&self) -> Vec<RegistryEntry> {
        self.state()
            .lookup
            .values()
            .map(|r| RegistryEntry {
                record: r.record,
                registered_at: r.registered_at,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state().lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.state().capacity
    }

    /// Total LRU evictions since the registry was created.
    pub fn evictions(&self) -> u64 {
        self.state().evictions
    }

    // No code inside the critical sections can panic, so a poisoned lock
    // still guards a consistent table.
    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lockable inner state of `PeerRegistry`.
struct State {
    capacity: usize,
    // key -> record plus its slot in the recency list
    lookup: HashMap<PeerKey, Resident>,
    // recency list; each slot holds the key so eviction can clean up `lookup`
    lru: LruSlab<PeerKey>,
    evictions: u64,
}

struct Resident {
    slot: u32,
    record: PeerRecord,
    registered_at: Instant,
}

impl State {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            lookup: HashMap::new(),
            lru: LruSlab::default(),
            evictions: 0,
        }
    }

    fn upsert(&mut self, record: PeerRecord, now: Instant) -> Upserted {
        if self.capacity == 0 {
            return Upserted::Discarded;
        }

        let key = record.key();
        if let Some(resident) = self.lookup.get_mut(&key) {
            resident.record = record;
            resident.registered_at = now;
            // get_mut marks the slot most recently used
            self.lru.get_mut(resident.slot);
            return Upserted::Refreshed;
        }

        let evicted = if self.lookup.len() >= self.capacity {
            self.evict_lru()
        } else {
            None
        };

        let slot = self.lru.insert(key);
        self.lookup.insert(
            key,
            Resident {
                slot,
                record,
                registered_at: now,
            },
        );
        Upserted::Inserted { evicted }
    }

    fn lookup(&mut self, key: &PeerKey) -> Option<PeerRecord> {
        let resident = self.lookup.get(key)?;
        self.lru.get_mut(resident.slot);
        Some(resident.record)
    }

    fn evict_lru(&mut self) -> Option<PeerKey> {
        let slot = self.lru.lru()?;
        let key = self.lru.remove(slot);
        let removed = self.lookup.remove(&key);
        debug_assert!(removed.is_some());
        self.evictions += 1;
        Some(key)
    }
}
