// ── Patient domain type ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Entity, EntityKind, PrescriptionRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: String,
    pub name: String,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub contact: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub rfid_uid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub pending_sync: bool,
}

/// One patient with every prescription issued to them, fetched directly from
/// the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientDetail {
    #[serde(flatten)]
    pub patient: PatientRecord,
    pub prescriptions: Vec<PrescriptionRecord>,
}

/// Fields for creating or updating a patient. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientDraft {
    pub name: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub contact: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub rfid_uid: Option<String>,
}

impl PatientRecord {
    /// Overlay the set fields of `draft` onto this record.
    pub fn apply(&mut self, draft: &PatientDraft) {
        fn overlay(slot: &mut Option<String>, value: Option<&String>) {
            if let Some(v) = value {
                *slot = Some(v.clone());
            }
        }

        if let Some(ref name) = draft.name {
            self.name.clone_from(name);
        }
        overlay(&mut self.date_of_birth, draft.date_of_birth.as_ref());
        overlay(&mut self.gender, draft.gender.as_ref());
        overlay(&mut self.contact, draft.contact.as_ref());
        overlay(&mut self.email, draft.email.as_ref());
        overlay(&mut self.address, draft.address.as_ref());
        overlay(&mut self.rfid_uid, draft.rfid_uid.as_ref());
        self.updated_at = Utc::now();
    }
}

impl Entity for PatientRecord {
    const KIND: EntityKind = EntityKind::Patients;

    fn key(&self) -> &str {
        &self.id
    }
}
