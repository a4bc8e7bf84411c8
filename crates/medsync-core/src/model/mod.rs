// ── Domain model ──
//
// Canonical client-side representations of MedSync entities. These are what
// the in-memory store holds, what the local cache persists, and what the CLI
// renders. Wire DTOs from `medsync_api::models` are converted in `convert`.

pub mod card;
pub mod patient;
pub mod prescription;
pub mod scan;

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

pub use card::CardRecord;
pub use patient::{PatientDetail, PatientRecord};
pub use prescription::{
    IssuedPrescription, PrescriptionDraft, PrescriptionRecord, VerifiedPrescription,
};
pub use scan::{ScanEvent, ScanLogEntry};

/// Entity kinds mirrored in the local cache.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum EntityKind {
    Cards,
    Patients,
    Prescriptions,
}

impl EntityKind {
    /// Storage key for the current record-set shape.
    pub fn storage_key(self) -> &'static str {
        match self {
            Self::Cards => "medsync.cards.v2",
            Self::Patients => "medsync.patients.v2",
            Self::Prescriptions => "medsync.prescriptions.v2",
        }
    }

    /// Storage key of the pre-versioned shape, if this kind ever had one.
    pub fn legacy_key(self) -> Option<&'static str> {
        match self {
            Self::Cards => Some("medsync.rfid_users"),
            Self::Patients | Self::Prescriptions => None,
        }
    }
}

/// An entity that lives in an ordered, keyed record set.
///
/// The legacy hooks describe the old flat `uid -> label` shape. Only kinds
/// whose [`EntityKind::legacy_key`] is set override them.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;

    /// Primary key within the record set.
    fn key(&self) -> &str;

    /// Build records from a legacy map during migration.
    fn from_legacy(_legacy: &BTreeMap<String, String>) -> Vec<Self> {
        Vec::new()
    }

    /// Derive the legacy map from the current record set.
    fn legacy_projection(_records: &[Self]) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}
