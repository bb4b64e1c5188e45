//! Concurrent map with one async lock per key.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Values keyed by string identity; access to a single key is serialized
/// while different keys proceed independently.
///
/// A guard returned by [`KeyedStore::lock`] may be held across `.await`
/// points; other tasks locking the same key wait for it to drop.
pub struct KeyedStore<V> {
    entries: DashMap<String, Arc<Mutex<V>>>,
}

impl<V> Default for KeyedStore<V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V: Default + Send + 'static> KeyedStore<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the value for `key`, creating a default value on first use.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<V> {
        // Clone the slot out so no map shard stays locked across the await.
        let slot = self.entries.entry(key.to_string()).or_default().clone();
        slot.lock_owned().await
    }

    /// Snapshot of the value for `key` without creating it.
    pub async fn get_cloned(&self, key: &str) -> Option<V>
    where
        V: Clone,
    {
        let slot = self.entries.get(key).map(|entry| entry.value().clone())?;
        let value = slot.lock().await;
        Some(value.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
