// libs/appointment-cell/src/services/locks.rs
//
// Per-key serialization for scheduling work. A guard is held for the whole of
// one operation and dropped when it returns; nothing holds a lock across calls.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Ord + Copy,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other caller holds `key`.
    pub async fn acquire(&self, key: K) -> OwnedMutexGuard<()> {
        let slot = self.slot_for(key).await;
        slot.lock_owned().await
    }

    /// Locks every distinct key in ascending order, so two callers asking for
    /// overlapping key sets cannot deadlock.
    pub async fn acquire_all(&self, keys: impl IntoIterator<Item = K>) -> Vec<OwnedMutexGuard<()>> {
        let mut keys: Vec<K> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.acquire(key).await);
        }
        guards
    }

    /// Number of keys currently tracked. Idle keys are pruned on the next acquire.
    pub async fn tracked_keys(&self) -> usize {
        self.slots.lock().await.len()
    }

    async fn slot_for(&self, key: K) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().await;
        // Only the map itself references an idle slot.
        slots.retain(|k, slot| *k == key || Arc::strong_count(slot) > 1);
        Arc::clone(slots.entry(key).or_default())
    }
}
