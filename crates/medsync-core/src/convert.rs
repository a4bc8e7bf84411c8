// ── API-to-domain type conversions ──
//
// Bridges `medsync_api` wire types into `medsync_core::model` domain types.
// The server writes timestamps with Python's `datetime.isoformat()` (no
// offset) or SQLite's `CURRENT_TIMESTAMP`; both are read as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use medsync_api::events::ScanMessage;
use medsync_api::models::{
    CardDto, PatientDetailDto, PatientDto, PatientRequest, PrescriptionDto, PrescriptionRequest,
    ScanLogDto, VerifiedPrescriptionDto,
};

use crate::model::patient::{PatientDetail, PatientDraft};
use crate::model::prescription::{PrescriptionDraft, VerifiedPrescription};
use crate::model::{CardRecord, PatientRecord, PrescriptionRecord, ScanEvent, ScanLogEntry};

// ── Helpers ────────────────────────────────────────────────────────

/// Parse a server timestamp. Accepts RFC 3339, naive ISO-8601 with `T` or
/// space separator (fractional seconds optional), or a bare date.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_optional(raw: Option<&String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| parse_timestamp(s))
}

/// Required timestamps fall back to "now" rather than failing the whole row.
fn parse_required(raw: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|| {
        tracing::debug!(raw, "unparseable server timestamp, using current time");
        Utc::now()
    })
}

// ── Cards ──────────────────────────────────────────────────────────

impl From<CardDto> for CardRecord {
    fn from(dto: CardDto) -> Self {
        Self {
            registered_at: parse_required(&dto.registered_at),
            last_scanned_at: parse_optional(dto.last_scanned.as_ref()),
            uid: dto.uid,
            label: dto.label,
            linked_patient_id: dto.patient_id,
            patient_name: dto.patient_name,
            is_active: dto.is_active,
            pending_sync: false,
        }
    }
}

// ── Patients ───────────────────────────────────────────────────────

impl From<PatientDto> for PatientRecord {
    fn from(dto: PatientDto) -> Self {
        Self {
            created_at: parse_required(&dto.created_at),
            updated_at: parse_required(&dto.updated_at),
            id: dto.id,
            name: dto.name,
            date_of_birth: dto.date_of_birth,
            gender: dto.gender,
            contact: dto.contact,
            email: dto.email,
            address: dto.address,
            rfid_uid: dto.rfid_uid,
            pending_sync: false,
        }
    }
}

impl From<&PatientDraft> for PatientRequest {
    fn from(draft: &PatientDraft) -> Self {
        Self {
            name: draft.name.clone(),
            date_of_birth: draft.date_of_birth.clone(),
            gender: draft.gender.clone(),
            contact: draft.contact.clone(),
            email: draft.email.clone(),
            address: draft.address.clone(),
            rfid_uid: draft.rfid_uid.clone(),
        }
    }
}

impl From<PatientDetailDto> for PatientDetail {
    fn from(dto: PatientDetailDto) -> Self {
        Self {
            patient: dto.patient.into(),
            prescriptions: dto.prescriptions.into_iter().map(Into::into).collect(),
        }
    }
}

// ── Prescriptions ──────────────────────────────────────────────────

impl From<PrescriptionDto> for PrescriptionRecord {
    fn from(dto: PrescriptionDto) -> Self {
        Self {
            date_issued: parse_required(&dto.date_issued),
            date_expires: parse_optional(dto.date_expires.as_ref()),
            verified_at: parse_optional(dto.verified_at.as_ref()),
            id: dto.id,
            patient_id: dto.patient_id,
            doctor_id: dto.doctor_id,
            medication: dto.medication,
            dosage: dto.dosage,
            frequency: dto.frequency,
            status: dto.status,
            notes: dto.notes,
            barcode: dto.barcode,
            verified_by: dto.verified_by,
        }
    }
}

impl From<&PrescriptionDraft> for PrescriptionRequest {
    fn from(draft: &PrescriptionDraft) -> Self {
        Self {
            patient_id: draft.patient_id.trim().to_owned(),
            medication: draft.medication.trim().to_owned(),
            dosage: draft.dosage.trim().to_owned(),
            frequency: draft.frequency.trim().to_owned(),
            date_expires: draft.date_expires.clone(),
            notes: draft.notes.clone(),
        }
    }
}

impl From<VerifiedPrescriptionDto> for VerifiedPrescription {
    fn from(dto: VerifiedPrescriptionDto) -> Self {
        Self {
            prescription: dto.prescription.into(),
            patient_name: dto.patient_name,
            doctor_name: dto.doctor_name,
        }
    }
}

// ── Scans ──────────────────────────────────────────────────────────

impl From<ScanLogDto> for ScanLogEntry {
    fn from(dto: ScanLogDto) -> Self {
        Self {
            scanned_at: parse_required(&dto.scanned_at),
            id: dto.id,
            rfid_uid: dto.rfid_uid,
            action: dto.action,
            label: dto.label,
            patient_name: dto.patient_name,
        }
    }
}

/// Build a [`ScanEvent`] from a realtime scan message. `None` without a uid.
pub fn scan_event(msg: &ScanMessage) -> Option<ScanEvent> {
    let card_uid = msg.uid()?.to_owned();
    Some(ScanEvent {
        card_uid,
        label: msg.label.clone(),
        observed_at: parse_optional(msg.timestamp.as_ref()).unwrap_or_else(Utc::now),
    })
}
