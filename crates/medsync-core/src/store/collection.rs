// ── Generic reactive record set ──
//
// Insertion-ordered storage keyed by entity key, with push-based change
// notification via `watch` channels. Every mutation rebuilds the snapshot
// under the write lock, so subscribers only ever see whole sets.

use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use tokio::sync::watch;

use crate::model::Entity;

/// An ordered, reactive collection for a single entity type.
pub(crate) struct EntityCollection<T: Entity> {
    by_key: RwLock<IndexMap<String, Arc<T>>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation for efficient subscription.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Entity> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_key: RwLock::new(IndexMap::new()),
            version,
            snapshot,
        }
    }

    /// Replace the whole set, keeping the order of `records`.
    ///
    /// A later record with a duplicate key overwrites the earlier one in place.
    pub(crate) fn replace_all(&self, records: Vec<T>) {
        let mut map = self.by_key.write().unwrap_or_else(PoisonError::into_inner);
        map.clear();
        for record in records {
            map.insert(record.key().to_owned(), Arc::new(record));
        }
        self.publish(&map);
    }

    /// Insert or update one entity. New keys append; existing keys keep their
    /// position. Returns `true` if the key was new.
    pub(crate) fn upsert(&self, entity: T) -> bool {
        let mut map = self.by_key.write().unwrap_or_else(PoisonError::into_inner);
        let is_new = map
            .insert(entity.key().to_owned(), Arc::new(entity))
            .is_none();
        self.publish(&map);
        is_new
    }

    /// Apply `f` to the entity under `key`, if present. Returns the updated
    /// entity.
    pub(crate) fn modify(&self, key: &str, f: impl FnOnce(&mut T)) -> Option<Arc<T>> {
        let mut map = self.by_key.write().unwrap_or_else(PoisonError::into_inner);
        let slot = map.get_mut(key)?;
        let mut updated = (**slot).clone();
        f(&mut updated);
        let updated = Arc::new(updated);
        *slot = Arc::clone(&updated);
        self.publish(&map);
        Some(updated)
    }

    /// Look up an entity by key.
    pub(crate) fn get(&self, key: &str) -> Option<Arc<T>> {
        self.by_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(Arc::clone)
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Owned copy of the current records, in order.
    pub(crate) fn to_vec(&self) -> Vec<T> {
        self.snapshot().iter().map(|r| T::clone(r)).collect()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Rebuild the snapshot from the locked map and bump the version.
    fn publish(&self, map: &IndexMap<String, Arc<T>>) {
        let values: Vec<Arc<T>> = map.values().map(Arc::clone).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
        self.version.send_modify(|v| *v += 1);
    }
}
