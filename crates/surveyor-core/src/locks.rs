//! Keyed async lock table.
//!
//! Serializes work per key without a global lock: each key gets its own
//! `tokio::sync::Mutex`, created lazily, and DashMap's internal sharding
//! keeps unrelated keys from contending on lookup. Used for session pairs
//! in the core and for file paths in the store implementation.

use dashmap::DashMap;
use tokio::sync::Mutex;

use std::hash::Hash;
use std::sync::Arc;

/// Lazily populated table of per-key async mutexes.
pub struct LockTable<K: Eq + Hash + Clone> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> LockTable<K> {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Get (or create) the lock for a key.
    ///
    /// The returned Arc keeps the mutex alive even if the entry is removed
    /// concurrently, so a guard can never be invalidated mid-hold.
    pub fn lock_for(&self, key: &K) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.clone())
            .or_default()
            .clone()
    }

    /// Drop a key's entry if nothing else holds a handle to its mutex.
    ///
    /// A key whose lock is held (or awaited) elsewhere is left alone; the
    /// outstanding Arc keeps the mutex valid either way.
    pub fn release(&self, key: &K) {
        self.locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for LockTable<K> {
    fn default() -> Self {
        Self::new()
    }
}
