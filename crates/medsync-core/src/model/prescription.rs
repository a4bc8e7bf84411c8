// ── Prescription domain type ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Entity, EntityKind};

/// A prescription as listed by the server.
///
/// Issuing and verifying go straight to the server; the cached set only
/// changes on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionRecord {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub medication: String,
    pub dosage: String,
    pub frequency: String,
    pub date_issued: DateTime<Utc>,
    pub date_expires: Option<DateTime<Utc>>,
    pub status: String,
    pub notes: Option<String>,
    pub barcode: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<String>,
}

impl Entity for PrescriptionRecord {
    const KIND: EntityKind = EntityKind::Prescriptions;

    fn key(&self) -> &str {
        &self.id
    }
}

/// Fields for issuing a prescription. All but the optional ones are required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrescriptionDraft {
    pub patient_id: String,
    pub medication: String,
    pub dosage: String,
    pub frequency: String,
    /// ISO-8601 date, passed through to the server as written.
    pub date_expires: Option<String>,
    pub notes: Option<String>,
}

/// A newly issued prescription as acknowledged by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedPrescription {
    pub id: String,
    /// `RX-` code printed for the pharmacy.
    pub barcode: Option<String>,
}

/// A prescription a pharmacist has just verified, with the names the server
/// joined in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedPrescription {
    #[serde(flatten)]
    pub prescription: PrescriptionRecord,
    pub patient_name: String,
    pub doctor_name: String,
}
