// MedSync REST API client
//
// Wraps `reqwest::Client` with MedSync URL construction, bearer-token auth,
// and `{"error": "..."}` body unwrapping. Every method returns the decoded
// payload or a typed `Error`; no retries happen here.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{
    Ack, CardDto, CardsEnvelope, ErrorBody, HealthDto, LoginRequest, LoginResponse,
    PatientDetailDto, PatientDto, PatientRequest, PatientsEnvelope, PrescriptionDto,
    PrescriptionQuery, PrescriptionRequest, PrescriptionsEnvelope, ProfileEnvelope,
    RegisterCardRequest, RegisterUserRequest, ScanLogDto, ScanLogsEnvelope, UpdateCardRequest,
    UserDto, VerifiedPrescriptionDto,
};
use crate::transport::TransportConfig;

/// HTTP client for the MedSync REST API.
///
/// Cheap to clone: the inner `reqwest::Client` is reference-counted.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    timeout_secs: u64,
}

impl ApiClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the API root, e.g. `http://localhost:8001`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            timeout_secs: transport.timeout.as_secs(),
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            timeout_secs: 30,
        }
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Auth ─────────────────────────────────────────────────────────

    /// Exchange email + password for a bearer token.
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<LoginResponse, Error> {
        let body = LoginRequest {
            email,
            password: password.expose_secret(),
        };
        self.send(self.http.post(self.url("api/auth/login")?).json(&body))
            .await
    }

    /// Create an account. The response carries a token for the new user.
    /// The server answers HTTP 400 when the email is already registered.
    pub async fn register_user(&self, req: &RegisterUserRequest<'_>) -> Result<LoginResponse, Error> {
        self.send(self.http.post(self.url("api/auth/register")?).json(req))
            .await
    }

    /// Invalidate the current bearer token.
    pub async fn logout(&self) -> Result<(), Error> {
        let _: Ack = self
            .send(self.http.post(self.url("api/auth/logout")?))
            .await?;
        Ok(())
    }

    /// Fetch the profile of the token's owner.
    pub async fn profile(&self) -> Result<UserDto, Error> {
        let env: ProfileEnvelope = self
            .send(self.http.get(self.url("api/auth/profile")?))
            .await?;
        Ok(env.user)
    }

    // ── RFID cards ───────────────────────────────────────────────────

    /// List all cards, newest registration first.
    pub async fn list_cards(&self) -> Result<Vec<CardDto>, Error> {
        let env: CardsEnvelope = self
            .send(self.http.get(self.url("api/rfid/cards")?))
            .await?;
        Ok(env.cards)
    }

    /// Register a new card. The server rejects duplicate uids with HTTP 400.
    pub async fn register_card(&self, req: &RegisterCardRequest) -> Result<Ack, Error> {
        self.send(self.http.post(self.url("api/rfid/cards")?).json(req))
            .await
    }

    /// Rename a card and/or change its patient link.
    pub async fn update_card(&self, uid: &str, req: &UpdateCardRequest) -> Result<Ack, Error> {
        let url = self.url(&format!("api/rfid/cards/{uid}"))?;
        self.send(self.http.put(url).json(req)).await
    }

    /// Deactivate a card (server-side soft delete).
    pub async fn delete_card(&self, uid: &str) -> Result<Ack, Error> {
        let url = self.url(&format!("api/rfid/cards/{uid}"))?;
        self.send(self.http.delete(url)).await
    }

    // ── Patients ─────────────────────────────────────────────────────

    /// List all patients ordered by name.
    pub async fn list_patients(&self) -> Result<Vec<PatientDto>, Error> {
        let env: PatientsEnvelope = self
            .send(self.http.get(self.url("api/patients")?))
            .await?;
        Ok(env.patients)
    }

    /// Fetch one patient with their prescriptions, by id or card uid.
    pub async fn patient(&self, id_or_uid: &str) -> Result<PatientDetailDto, Error> {
        let url = self.url(&format!("api/patients/{id_or_uid}"))?;
        self.send(self.http.get(url)).await
    }

    /// Create a patient. The returned `Ack::id` is the server-assigned id.
    pub async fn create_patient(&self, req: &PatientRequest) -> Result<Ack, Error> {
        self.send(self.http.post(self.url("api/patients")?).json(req))
            .await
    }

    /// Update the non-`None` fields of a patient.
    pub async fn update_patient(&self, id: &str, req: &PatientRequest) -> Result<Ack, Error> {
        let url = self.url(&format!("api/patients/{id}"))?;
        self.send(self.http.put(url).json(req)).await
    }

    // ── Prescriptions ────────────────────────────────────────────────

    /// List prescriptions matching the given filters, newest first.
    pub async fn list_prescriptions(
        &self,
        query: &PrescriptionQuery,
    ) -> Result<Vec<PrescriptionDto>, Error> {
        let mut url = self.url("api/prescriptions")?;
        let pairs = query.pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        let env: PrescriptionsEnvelope = self.send(self.http.get(url)).await?;
        Ok(env.prescriptions)
    }

    /// Issue a prescription (doctors only). `Ack::id` and `Ack::barcode`
    /// identify the new prescription.
    pub async fn create_prescription(&self, req: &PrescriptionRequest) -> Result<Ack, Error> {
        self.send(self.http.post(self.url("api/prescriptions")?).json(req))
            .await
    }

    /// Mark a prescription verified (pharmacists only), by id or barcode.
    pub async fn verify_prescription(
        &self,
        id_or_barcode: &str,
    ) -> Result<VerifiedPrescriptionDto, Error> {
        let url = self.url(&format!("api/prescriptions/{id_or_barcode}/verify"))?;
        self.send(self.http.post(url)).await
    }

    // ── Scan logs & health ───────────────────────────────────────────

    /// Most recent scan log entries.
    pub async fn scan_logs(&self, limit: u32) -> Result<Vec<ScanLogDto>, Error> {
        let mut url = self.url("api/scan-logs")?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        let env: ScanLogsEnvelope = self.send(self.http.get(url)).await?;
        Ok(env.logs)
    }

    /// Unauthenticated health probe.
    pub async fn health(&self) -> Result<HealthDto, Error> {
        self.send(self.http.get(self.url("health")?)).await
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Join an API path onto the base URL.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    /// Send a request and decode the JSON body, mapping failures to `Error`.
    async fn send<T: DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> Result<T, Error> {
        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    timeout_secs: self.timeout_secs,
                }
            } else {
                Error::Transport(e)
            }
        })?;

        debug!(status = %resp.status(), url = %resp.url(), "response");
        parse_response(resp).await
    }
}

/// Decode a success body as `T`, or the `{"error": ...}` body as an `Error`.
async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    let body = resp.text().await.map_err(Error::Transport)?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&body).map_or_else(
            |_| format!("HTTP {status}: {}", preview(&body)),
            |e| e.error,
        );
        return Err(match status {
            reqwest::StatusCode::UNAUTHORIZED => Error::Authentication { message },
            reqwest::StatusCode::FORBIDDEN => Error::Forbidden { message },
            _ => Error::Api {
                message,
                status: status.as_u16(),
            },
        });
    }

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(&body)),
        body: body.clone(),
    })
}

fn preview(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map_or(body.len(), |(idx, _)| idx);
    &body[..end]
}
