// ── Local cache store ──
//
// Durable mirror of server-authoritative record sets, used when the remote
// API is unreachable. Each entity kind is stored whole, as a JSON array
// under `EntityKind::storage_key`. Reads never fail: absent or corrupt
// payloads read as empty.

mod kv;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

pub use kv::{DirectoryStore, KeyValueStore, MemoryStore, StorageError};

use crate::model::{CardRecord, Entity, EntityKind};

/// Whether the legacy `uid -> label` projection is kept on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LegacyProjection {
    /// Rewrite the projection after every card write.
    #[default]
    WriteThrough,
    /// Only the versioned shape is written. The projection can still be
    /// derived on demand with [`LocalCache::legacy_projection`].
    Off,
}

/// Typed record-set cache over a [`KeyValueStore`].
pub struct LocalCache {
    store: Arc<dyn KeyValueStore>,
    legacy: LegacyProjection,
    /// Serializes writers so a record set and its projection land together.
    write_lock: Mutex<()>,
}

impl LocalCache {
    pub fn new(store: Arc<dyn KeyValueStore>, legacy: LegacyProjection) -> Self {
        Self {
            store,
            legacy,
            write_lock: Mutex::new(()),
        }
    }

    /// An in-memory cache, for tests and ephemeral sessions.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), LegacyProjection::default())
    }

    /// The underlying key-value store.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Last persisted record set for `T`, in stored order.
    ///
    /// If the versioned key is absent but a legacy map exists, records are
    /// synthesized from it and written forward in the versioned shape.
    pub fn read<T: Entity>(&self) -> Vec<T> {
        let kind = T::KIND;
        match self.load::<T>(kind.storage_key()) {
            Some(records) => records,
            None => self.migrate::<T>(kind).unwrap_or_default(),
        }
    }

    /// Replace the whole record set for `T`.
    pub fn write<T: Entity>(&self, records: &[T]) -> Result<(), StorageError> {
        let kind = T::KIND;
        let payload = serde_json::to_string(records).map_err(|e| StorageError::Io {
            key: kind.storage_key().to_owned(),
            source: std::io::Error::other(e),
        })?;

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.store.set(kind.storage_key(), &payload)?;

        if self.legacy == LegacyProjection::WriteThrough {
            if let Some(legacy_key) = kind.legacy_key() {
                let projection = T::legacy_projection(records);
                let payload = serde_json::to_string(&projection).map_err(|e| StorageError::Io {
                    key: legacy_key.to_owned(),
                    source: std::io::Error::other(e),
                })?;
                self.store.set(legacy_key, &payload)?;
            }
        }

        debug!(%kind, records = records.len(), "cache written");
        Ok(())
    }

    /// `uid -> label` view of the active cached cards, derived from the
    /// versioned record set.
    pub fn legacy_projection(&self) -> BTreeMap<String, String> {
        CardRecord::legacy_projection(&self.read::<CardRecord>())
    }

    /// Remove every cached kind, including the legacy projection.
    pub fn clear(&self) -> Result<(), StorageError> {
        use strum::IntoEnumIterator;

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        for kind in EntityKind::iter() {
            self.store.remove(kind.storage_key())?;
            if let Some(legacy_key) = kind.legacy_key() {
                self.store.remove(legacy_key)?;
            }
        }
        Ok(())
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// `None` when the key is absent. Corrupt payloads are `Some(empty)`.
    fn load<T: Entity>(&self, key: &str) -> Option<Vec<T>> {
        let raw = match self.store.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key, error = %e, "cache read failed, treating as empty");
                return Some(Vec::new());
            }
        };

        match serde_json::from_str::<Vec<T>>(&raw) {
            Ok(records) => Some(records),
            Err(e) => {
                warn!(key, error = %e, "corrupt cache payload, treating as empty");
                Some(Vec::new())
            }
        }
    }

    fn migrate<T: Entity>(&self, kind: EntityKind) -> Option<Vec<T>> {
        let legacy_key = kind.legacy_key()?;
        let raw = match self.store.get(legacy_key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key = legacy_key, error = %e, "legacy cache read failed");
                return None;
            }
        };

        let legacy: BTreeMap<String, String> = match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(e) => {
                warn!(key = legacy_key, error = %e, "corrupt legacy cache payload, ignoring");
                return None;
            }
        };

        let records = T::from_legacy(&legacy);
        info!(%kind, records = records.len(), "migrating legacy cache entries");
        if let Err(e) = self.write(&records) {
            warn!(%kind, error = %e, "failed to write migrated cache");
        }
        Some(records)
    }
}

impl std::fmt::Debug for LocalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCache")
            .field("legacy", &self.legacy)
            .finish_non_exhaustive()
    }
}
