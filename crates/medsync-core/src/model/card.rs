// ── RFID card domain type ──

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Entity, EntityKind};

/// An RFID card registration.
///
/// Keyed by `uid`, so the record set can never hold two cards (active or
/// not) with the same uid. Removal is a soft delete via `is_active = false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    pub uid: String,
    pub label: String,
    pub linked_patient_id: Option<String>,
    /// Joined from the patients table by the server; never sent back.
    #[serde(default)]
    pub patient_name: Option<String>,
    pub is_active: bool,
    pub registered_at: DateTime<Utc>,
    pub last_scanned_at: Option<DateTime<Utc>>,
    /// Written locally while the server was unreachable.
    #[serde(default)]
    pub pending_sync: bool,
}

impl CardRecord {
    /// A fresh, active, unlinked card created on this client.
    pub fn new_local(uid: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            label: label.into(),
            linked_patient_id: None,
            patient_name: None,
            is_active: true,
            registered_at: Utc::now(),
            last_scanned_at: None,
            pending_sync: true,
        }
    }
}

impl Entity for CardRecord {
    const KIND: EntityKind = EntityKind::Cards;

    fn key(&self) -> &str {
        &self.uid
    }

    fn from_legacy(legacy: &BTreeMap<String, String>) -> Vec<Self> {
        legacy
            .iter()
            .filter(|(uid, _)| !uid.is_empty())
            .map(|(uid, label)| Self::new_local(uid.clone(), label.clone()))
            .collect()
    }

    /// Active cards only; the old shape had no notion of deactivation.
    fn legacy_projection(records: &[Self]) -> BTreeMap<String, String> {
        records
            .iter()
            .filter(|c| c.is_active)
            .map(|c| (c.uid.clone(), c.label.clone()))
            .collect()
    }
}
