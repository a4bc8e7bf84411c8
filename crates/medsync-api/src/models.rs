// REST API wire types
//
// Models for the MedSync server's JSON API. Row objects mirror the server's
// SQLite columns (snake_case); request bodies use the camelCase keys the
// handlers read. Fields use `#[serde(default)]` liberally because rows come
// straight from `SELECT *` and nullable columns are omitted or null.

use serde::{Deserialize, Deserializer, Serialize};

// ── Envelopes ────────────────────────────────────────────────────────

/// Error body attached to every non-2xx response: `{"error": "..."}`.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Acknowledgement body for mutations: `{"message": "...", "id": "..."}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CardsEnvelope {
    pub cards: Vec<CardDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PatientsEnvelope {
    pub patients: Vec<PatientDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PrescriptionsEnvelope {
    pub prescriptions: Vec<PrescriptionDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScanLogsEnvelope {
    pub logs: Vec<ScanLogDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileEnvelope {
    pub user: UserDto,
}

// ── Auth ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body for `POST /api/auth/register`.
#[derive(Debug, Serialize)]
pub struct RegisterUserRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub name: &'a str,
    /// One of `doctor`, `patient`, `pharmacy`; the server defaults to `patient`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'a str>,
}

/// Response from `POST /api/auth/login` and `POST /api/auth/register`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserDto,
}

/// Authenticated user as returned by the auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDto {
    pub id: String,
    pub email: String,
    pub name: String,
    /// One of `doctor`, `patient`, `pharmacy`, `admin`.
    pub role: String,
}

// ── RFID cards ───────────────────────────────────────────────────────

/// Row from `GET /api/rfid/cards` (joined with the linked patient's name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDto {
    pub uid: String,
    pub label: String,
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub patient_name: Option<String>,
    /// ISO-8601, naive local time as written by the server.
    pub registered_at: String,
    #[serde(default)]
    pub last_scanned: Option<String>,
    /// Stored as an INTEGER column; accept `0/1` or a JSON bool.
    #[serde(default = "default_true", deserialize_with = "deserialize_flag")]
    pub is_active: bool,
}

/// Body for `POST /api/rfid/cards`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCardRequest {
    pub uid: String,
    pub label: String,
    pub patient_id: Option<String>,
}

/// Body for `PUT /api/rfid/cards/{uid}`.
///
/// The server overwrites `patient_id` unconditionally, so `patient_id: None`
/// unlinks the card; `label: None` keeps the current label.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCardRequest {
    pub label: Option<String>,
    pub patient_id: Option<String>,
}

// ── Patients ─────────────────────────────────────────────────────────

/// Row from `GET /api/patients`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub rfid_uid: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Response from `GET /api/patients/{id}`: the patient row plus every
/// prescription issued to them. The id may also be the patient's card uid.
#[derive(Debug, Clone, Deserialize)]
pub struct PatientDetailDto {
    #[serde(flatten)]
    pub patient: PatientDto,
    #[serde(default)]
    pub prescriptions: Vec<PrescriptionDto>,
}

/// Body for `POST /api/patients` and `PUT /api/patients/{id}`.
///
/// On update every `None` field keeps its stored value.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRequest {
    pub name: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub contact: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub rfid_uid: Option<String>,
}

// ── Prescriptions ────────────────────────────────────────────────────

/// Row from `GET /api/prescriptions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionDto {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub medication: String,
    pub dosage: String,
    pub frequency: String,
    pub date_issued: String,
    #[serde(default)]
    pub date_expires: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub verified_at: Option<String>,
    #[serde(default)]
    pub verified_by: Option<String>,
}

/// Body for `POST /api/prescriptions`. The server records the caller as the
/// prescribing doctor and answers with the new id and `RX-` barcode.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionRequest {
    pub patient_id: String,
    pub medication: String,
    pub dosage: String,
    pub frequency: String,
    pub date_expires: Option<String>,
    pub notes: Option<String>,
}

/// Response from `POST /api/prescriptions/{id}/verify`.
///
/// The row is read before the server stamps `verified_at`, so those columns
/// still hold their previous values.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifiedPrescriptionDto {
    #[serde(flatten)]
    pub prescription: PrescriptionDto,
    pub patient_name: String,
    pub doctor_name: String,
    #[serde(default)]
    pub verified: bool,
}

/// Query filters for `GET /api/prescriptions`.
#[derive(Debug, Clone, Default)]
pub struct PrescriptionQuery {
    pub patient_id: Option<String>,
    pub doctor_id: Option<String>,
    pub status: Option<String>,
}

impl PrescriptionQuery {
    pub(crate) fn pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::new();
        if let Some(ref v) = self.patient_id {
            pairs.push(("patientId", v.as_str()));
        }
        if let Some(ref v) = self.doctor_id {
            pairs.push(("doctorId", v.as_str()));
        }
        if let Some(ref v) = self.status {
            pairs.push(("status", v.as_str()));
        }
        pairs
    }
}

// ── Scan logs & health ───────────────────────────────────────────────

/// Row from `GET /api/scan-logs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanLogDto {
    pub id: i64,
    pub rfid_uid: String,
    pub scanned_at: String,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub patient_name: Option<String>,
}

/// Response from `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDto {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub websocket_clients: u32,
    #[serde(default)]
    pub serial_connected: bool,
}

// ── Helpers ──────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_status() -> String {
    "active".into()
}

/// Accept SQLite-style integer flags as well as JSON booleans.
fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn card_row_accepts_integer_flag() {
        let json = serde_json::json!({
            "uid": "04A3FF21",
            "label": "Jane",
            "patient_id": null,
            "registered_at": "2026-03-01T09:15:00.123456",
            "last_scanned": null,
            "is_active": 0,
            "patient_name": null
        });
        let card: CardDto = serde_json::from_value(json).unwrap();
        assert!(!card.is_active);
        assert!(card.patient_id.is_none());
    }

    #[test]
    fn card_row_defaults_to_active() {
        let json = serde_json::json!({
            "uid": "AABBCC",
            "label": "Front desk",
            "registered_at": "2026-03-01T09:15:00"
        });
        let card: CardDto = serde_json::from_value(json).unwrap();
        assert!(card.is_active);
    }

    #[test]
    fn update_request_serializes_null_patient_for_unlink() {
        let req = UpdateCardRequest {
            label: None,
            patient_id: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, serde_json::json!({ "label": null, "patientId": null }));
    }

    #[test]
    fn patient_detail_flattens_row_and_prescriptions() {
        let json = serde_json::json!({
            "id": "p-1",
            "name": "Jane Doe",
            "rfid_uid": "AABBCC",
            "created_at": "2026-03-01T09:15:00",
            "updated_at": "2026-03-01T09:15:00",
            "prescriptions": [{
                "id": "rx-1",
                "patient_id": "p-1",
                "doctor_id": "d-1",
                "medication": "Amoxicillin",
                "dosage": "500mg",
                "frequency": "3x daily",
                "date_issued": "2026-03-01T09:20:00",
                "barcode": "RX-00FF"
            }]
        });
        let detail: PatientDetailDto = serde_json::from_value(json).unwrap();
        assert_eq!(detail.patient.rfid_uid.as_deref(), Some("AABBCC"));
        assert_eq!(detail.prescriptions.len(), 1);
        assert_eq!(detail.prescriptions[0].status, "active");
    }

    #[test]
    fn register_user_omits_unset_role() {
        let req = RegisterUserRequest {
            email: "nurse@example.org",
            password: "pw",
            name: "Nurse",
            role: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("role").is_none());
    }

    #[test]
    fn prescription_query_only_includes_set_filters() {
        let q = PrescriptionQuery {
            patient_id: Some("p1".into()),
            doctor_id: None,
            status: Some("active".into()),
        };
        assert_eq!(q.pairs(), vec![("patientId", "p1"), ("status", "active")]);
    }
}
