// Integration tests for `ApiClient` using wiremock.
#![allow(clippy::unwrap_used)]

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use medsync_api::models::{
    PatientRequest, PrescriptionQuery, PrescriptionRequest, RegisterCardRequest,
    RegisterUserRequest, UpdateCardRequest,
};
use medsync_api::{ApiClient, Error, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    let client = ApiClient::with_client(reqwest::Client::new(), Url::parse(&server.uri()).unwrap());
    (server, client)
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_list_cards_unwraps_envelope() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/rfid/cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cards": [
                {
                    "uid": "AABBCC",
                    "label": "Jane",
                    "patient_id": "p-1",
                    "registered_at": "2026-03-01T09:15:00.000001",
                    "last_scanned": null,
                    "is_active": 1,
                    "patient_name": "Jane Doe"
                },
                {
                    "uid": "112233",
                    "label": "Spare",
                    "patient_id": null,
                    "registered_at": "2026-02-01T08:00:00",
                    "last_scanned": "2026-02-02T08:00:00",
                    "is_active": 0,
                    "patient_name": null
                }
            ]
        })))
        .mount(&server)
        .await;

    let cards = client.list_cards().await.unwrap();

    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0].uid, "AABBCC");
    assert_eq!(cards[0].patient_name.as_deref(), Some("Jane Doe"));
    assert!(cards[0].is_active);
    assert!(!cards[1].is_active);
}

#[tokio::test]
async fn test_register_card_sends_camel_case_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/rfid/cards"))
        .and(body_json(json!({ "uid": "AABBCC", "label": "Jane", "patientId": null })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({ "message": "Card registered successfully" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ack = client
        .register_card(&RegisterCardRequest {
            uid: "AABBCC".into(),
            label: "Jane".into(),
            patient_id: None,
        })
        .await
        .unwrap();

    assert_eq!(ack.message.as_deref(), Some("Card registered successfully"));
}

#[tokio::test]
async fn test_update_and_delete_card_use_uid_path() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/rfid/cards/AABBCC"))
        .and(body_json(json!({ "label": "Jane D", "patientId": "p-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Card updated" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/rfid/cards/AABBCC"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "message": "Card deactivated" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    client
        .update_card(
            "AABBCC",
            &UpdateCardRequest {
                label: Some("Jane D".into()),
                patient_id: Some("p-1".into()),
            },
        )
        .await
        .unwrap();
    client.delete_card("AABBCC").await.unwrap();
}

#[tokio::test]
async fn test_create_patient_returns_server_id() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/patients"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "message": "Patient created",
            "id": "4f1c2a9e-0000-4000-8000-000000000001"
        })))
        .mount(&server)
        .await;

    let ack = client
        .create_patient(&PatientRequest {
            name: Some("Jane Doe".into()),
            ..PatientRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(ack.id.as_deref(), Some("4f1c2a9e-0000-4000-8000-000000000001"));
}

#[tokio::test]
async fn test_list_prescriptions_passes_filters() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/prescriptions"))
        .and(query_param("patientId", "p-1"))
        .and(query_param("status", "active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "prescriptions": [{
                "id": "rx-1",
                "patient_id": "p-1",
                "doctor_id": "d-1",
                "medication": "Amoxicillin",
                "dosage": "500mg",
                "frequency": "3x daily",
                "date_issued": "2026-03-01T09:00:00",
                "date_expires": null,
                "status": "active",
                "notes": null,
                "barcode": "RX-ABC",
                "verified_at": null,
                "verified_by": null
            }]
        })))
        .mount(&server)
        .await;

    let rx = client
        .list_prescriptions(&PrescriptionQuery {
            patient_id: Some("p-1".into()),
            doctor_id: None,
            status: Some("active".into()),
        })
        .await
        .unwrap();

    assert_eq!(rx.len(), 1);
    assert_eq!(rx[0].medication, "Amoxicillin");
}

#[tokio::test]
async fn test_create_prescription_returns_id_and_barcode() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/prescriptions"))
        .and(body_json(json!({
            "patientId": "p-1",
            "medication": "Amoxicillin",
            "dosage": "500mg",
            "frequency": "3x daily",
            "dateExpires": null,
            "notes": "with food"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "rx-9",
            "barcode": "RX-1A2B3C4D5E6F7A8B",
            "message": "Prescription created successfully"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ack = client
        .create_prescription(&PrescriptionRequest {
            patient_id: "p-1".into(),
            medication: "Amoxicillin".into(),
            dosage: "500mg".into(),
            frequency: "3x daily".into(),
            date_expires: None,
            notes: Some("with food".into()),
        })
        .await
        .unwrap();

    assert_eq!(ack.id.as_deref(), Some("rx-9"));
    assert_eq!(ack.barcode.as_deref(), Some("RX-1A2B3C4D5E6F7A8B"));
}

#[tokio::test]
async fn test_verify_prescription_by_barcode() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/prescriptions/RX-ABC/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "rx-1",
            "patient_id": "p-1",
            "doctor_id": "d-1",
            "medication": "Amoxicillin",
            "dosage": "500mg",
            "frequency": "3x daily",
            "date_issued": "2026-03-01T09:00:00",
            "status": "active",
            "barcode": "RX-ABC",
            "verified_at": null,
            "verified_by": null,
            "patient_name": "Jane Doe",
            "doctor_name": "Dr. Who",
            "verified": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let verified = client.verify_prescription("RX-ABC").await.unwrap();
    assert!(verified.verified);
    assert_eq!(verified.prescription.id, "rx-1");
    assert_eq!(verified.patient_name, "Jane Doe");
    assert_eq!(verified.doctor_name, "Dr. Who");
}

#[tokio::test]
async fn test_patient_detail_includes_prescriptions() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/patients/AABBCC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "p-1",
            "name": "Jane Doe",
            "rfid_uid": "AABBCC",
            "created_at": "2026-03-01T09:00:00",
            "updated_at": "2026-03-01T09:00:00",
            "prescriptions": []
        })))
        .mount(&server)
        .await;

    let detail = client.patient("AABBCC").await.unwrap();
    assert_eq!(detail.patient.id, "p-1");
    assert!(detail.prescriptions.is_empty());
}

#[tokio::test]
async fn test_missing_patient_is_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/patients/p-404"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "error": "Patient not found" })),
        )
        .mount(&server)
        .await;

    let err = client.patient("p-404").await.unwrap_err();
    assert!(err.is_not_found(), "got {err:?}");
}

#[tokio::test]
async fn test_register_user_returns_token() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .and(body_json(json!({
            "email": "rx@clinic.test",
            "password": "hunter2",
            "name": "Front Pharmacy",
            "role": "pharmacy"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "token": "tok-new",
            "user": { "id": "u-2", "email": "rx@clinic.test", "name": "Front Pharmacy", "role": "pharmacy" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client
        .register_user(&RegisterUserRequest {
            email: "rx@clinic.test",
            password: "hunter2",
            name: "Front Pharmacy",
            role: Some("pharmacy"),
        })
        .await
        .unwrap();
    assert_eq!(resp.token, "tok-new");
    assert_eq!(resp.user.role, "pharmacy");
}

#[tokio::test]
async fn test_scan_logs_sends_limit() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/scan-logs"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "logs": [{
                "id": 7,
                "rfid_uid": "AABBCC",
                "scanned_at": "2026-03-01T09:15:02",
                "action": "scan",
                "details": null,
                "label": "Jane",
                "patient_name": null
            }]
        })))
        .mount(&server)
        .await;

    let logs = client.scan_logs(10).await.unwrap();
    assert_eq!(logs[0].id, 7);
    assert_eq!(logs[0].label.as_deref(), Some("Jane"));
}

#[tokio::test]
async fn test_login_then_bearer_header_on_requests() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "email": "doc@clinic.test", "password": "hunter2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "tok-123",
            "user": { "id": "u-1", "email": "doc@clinic.test", "name": "Dr. Who", "role": "doctor" }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": { "id": "u-1", "email": "doc@clinic.test", "name": "Dr. Who", "role": "doctor" }
        })))
        .mount(&server)
        .await;

    let base = Url::parse(&server.uri()).unwrap();
    let anon = ApiClient::new(base.clone(), &TransportConfig::default()).unwrap();
    let login = anon
        .login("doc@clinic.test", &SecretString::from("hunter2"))
        .await
        .unwrap();
    assert_eq!(login.user.role, "doctor");

    let authed = ApiClient::new(
        base,
        &TransportConfig::default().with_token(SecretString::from(login.token)),
    )
    .unwrap();
    let profile = authed.profile().await.unwrap();
    assert_eq!(profile.name, "Dr. Who");
}

#[tokio::test]
async fn test_health() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "timestamp": "2026-03-01T09:15:02",
            "websocket_clients": 2,
            "serial_connected": true
        })))
        .mount(&server)
        .await;

    let health = client.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.websocket_clients, 2);
    assert!(health.serial_connected);
}

// ── Error-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_error_body_becomes_api_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/rfid/cards"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "Card already registered" })),
        )
        .mount(&server)
        .await;

    let err = client
        .register_card(&RegisterCardRequest {
            uid: "AABBCC".into(),
            label: "Jane".into(),
            patient_id: None,
        })
        .await
        .unwrap_err();

    match err {
        Error::Api { message, status } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Card already registered");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_401_maps_to_authentication() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/patients"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "Invalid token" })))
        .mount(&server)
        .await;

    let err = client.list_patients().await.unwrap_err();
    assert!(err.is_auth_expired(), "got {err:?}");
}

#[tokio::test]
async fn test_403_maps_to_forbidden() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/patients"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({ "error": "Insufficient permissions" })),
        )
        .mount(&server)
        .await;

    let err = client
        .create_patient(&PatientRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_non_json_error_body_is_previewed() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/rfid/cards"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let err = client.list_cards().await.unwrap_err();
    assert!(err.is_transient());
    assert!(err.to_string().contains("Bad Gateway"), "got {err}");
}

#[tokio::test]
async fn test_unexpected_success_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/rfid/cards"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = client.list_cards().await.unwrap_err();
    match err {
        Error::Deserialization { body, .. } => assert_eq!(body, "<html>login</html>"),
        other => panic!("expected Deserialization, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let client = ApiClient::with_client(
        reqwest::Client::new(),
        Url::parse("http://127.0.0.1:9").unwrap(),
    );
    let err = client.list_cards().await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "got {err:?}");
}
