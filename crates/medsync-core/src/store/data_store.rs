// ── Central reactive data store ──
//
// Thread-safe storage for the record sets a session works with. Mutations
// are broadcast to subscribers via `watch` channels. Only the data service
// and the session bridge write here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::collection::EntityCollection;
use crate::model::{CardRecord, Entity, EntityKind, PatientRecord, PrescriptionRecord};
use crate::stream::EntityStream;

/// Central reactive store for MedSync record sets.
pub struct DataStore {
    pub(crate) cards: EntityCollection<CardRecord>,
    pub(crate) patients: EntityCollection<PatientRecord>,
    pub(crate) prescriptions: EntityCollection<PrescriptionRecord>,
    pub(crate) last_remote_refresh: watch::Sender<Option<DateTime<Utc>>>,
}

impl DataStore {
    pub fn new() -> Self {
        let (last_remote_refresh, _) = watch::channel(None);

        Self {
            cards: EntityCollection::new(),
            patients: EntityCollection::new(),
            prescriptions: EntityCollection::new(),
            last_remote_refresh,
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn cards_snapshot(&self) -> Arc<Vec<Arc<CardRecord>>> {
        self.cards.snapshot()
    }

    pub fn patients_snapshot(&self) -> Arc<Vec<Arc<PatientRecord>>> {
        self.patients.snapshot()
    }

    pub fn prescriptions_snapshot(&self) -> Arc<Vec<Arc<PrescriptionRecord>>> {
        self.prescriptions.snapshot()
    }

    // ── Single-entity lookups ────────────────────────────────────────

    pub fn card(&self, uid: &str) -> Option<Arc<CardRecord>> {
        self.cards.get(uid)
    }

    /// The card under `uid`, only if it is active.
    pub fn active_card(&self, uid: &str) -> Option<Arc<CardRecord>> {
        self.cards.get(uid).filter(|c| c.is_active)
    }

    pub fn patient(&self, id: &str) -> Option<Arc<PatientRecord>> {
        self.patients.get(id)
    }

    // ── Counts ───────────────────────────────────────────────────────

    pub fn card_count(&self) -> usize {
        self.cards.len()
    }

    pub fn patient_count(&self) -> usize {
        self.patients.len()
    }

    pub fn prescription_count(&self) -> usize {
        self.prescriptions.len()
    }

    /// Mutation counter for `kind`.
    pub fn version(&self, kind: EntityKind) -> u64 {
        match kind {
            EntityKind::Cards => self.cards.version(),
            EntityKind::Patients => self.patients.version(),
            EntityKind::Prescriptions => self.prescriptions.version(),
        }
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_cards(&self) -> EntityStream<CardRecord> {
        EntityStream::new(self.cards.subscribe())
    }

    pub fn subscribe_patients(&self) -> EntityStream<PatientRecord> {
        EntityStream::new(self.patients.subscribe())
    }

    pub fn subscribe_prescriptions(&self) -> EntityStream<PrescriptionRecord> {
        EntityStream::new(self.prescriptions.subscribe())
    }

    // ── Refresh metadata ─────────────────────────────────────────────

    pub fn last_remote_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_remote_refresh.borrow()
    }

    pub(crate) fn mark_remote_refresh(&self) {
        self.last_remote_refresh.send_replace(Some(Utc::now()));
    }
}

/// Maps an entity type to its collection in the store.
pub(crate) trait Stored: Entity {
    fn collection(store: &DataStore) -> &EntityCollection<Self>;
}

impl Stored for CardRecord {
    fn collection(store: &DataStore) -> &EntityCollection<Self> {
        &store.cards
    }
}

impl Stored for PatientRecord {
    fn collection(store: &DataStore) -> &EntityCollection<Self> {
        &store.patients
    }
}

impl Stored for PrescriptionRecord {
    fn collection(store: &DataStore) -> &EntityCollection<Self> {
        &store.prescriptions
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}
