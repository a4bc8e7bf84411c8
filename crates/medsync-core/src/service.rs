// ── Reconciling data service ──
//
// Every operation tries the remote API first. On success the authoritative
// result lands in the DataStore and the local cache. On failure writes are
// applied optimistically to local state (flagged `pending_sync`) and reads
// serve the cached record set, so callers keep working while the server is
// unreachable.
//
// Refreshes are sequenced per entity kind: only the most recently issued
// refresh may apply its result, and every write advances the sequence so a
// refresh issued before a write cannot clobber it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use medsync_api::ApiClient;
use medsync_api::Error as ApiError;
use medsync_api::models::{
    Ack, CardDto, HealthDto, PatientDetailDto, PatientDto, PatientRequest, PrescriptionDto,
    PrescriptionQuery, PrescriptionRequest, RegisterCardRequest, ScanLogDto, UpdateCardRequest,
    VerifiedPrescriptionDto,
};

use crate::cache::LocalCache;
use crate::error::CoreError;
use crate::model::patient::PatientDraft;
use crate::model::{
    CardRecord, EntityKind, IssuedPrescription, PatientDetail, PatientRecord, PrescriptionDraft,
    PrescriptionRecord, ScanLogEntry, VerifiedPrescription,
};
use crate::store::{DataStore, EntityCollection, Stored};

// ── Remote seam ──────────────────────────────────────────────────────

/// The REST operations the data service depends on.
///
/// Implemented for [`ApiClient`]; tests substitute scripted remotes.
pub trait RemoteApi: Send + Sync + 'static {
    fn list_cards(&self) -> impl Future<Output = Result<Vec<CardDto>, ApiError>> + Send;

    fn register_card(
        &self,
        req: &RegisterCardRequest,
    ) -> impl Future<Output = Result<Ack, ApiError>> + Send;

    fn update_card(
        &self,
        uid: &str,
        req: &UpdateCardRequest,
    ) -> impl Future<Output = Result<Ack, ApiError>> + Send;

    fn delete_card(&self, uid: &str) -> impl Future<Output = Result<Ack, ApiError>> + Send;

    fn list_patients(&self) -> impl Future<Output = Result<Vec<PatientDto>, ApiError>> + Send;

    fn create_patient(
        &self,
        req: &PatientRequest,
    ) -> impl Future<Output = Result<Ack, ApiError>> + Send;

    fn update_patient(
        &self,
        id: &str,
        req: &PatientRequest,
    ) -> impl Future<Output = Result<Ack, ApiError>> + Send;

    fn patient(
        &self,
        id_or_uid: &str,
    ) -> impl Future<Output = Result<PatientDetailDto, ApiError>> + Send;

    fn list_prescriptions(
        &self,
        query: &PrescriptionQuery,
    ) -> impl Future<Output = Result<Vec<PrescriptionDto>, ApiError>> + Send;

    fn create_prescription(
        &self,
        req: &PrescriptionRequest,
    ) -> impl Future<Output = Result<Ack, ApiError>> + Send;

    fn verify_prescription(
        &self,
        id_or_barcode: &str,
    ) -> impl Future<Output = Result<VerifiedPrescriptionDto, ApiError>> + Send;

    fn scan_logs(&self, limit: u32)
    -> impl Future<Output = Result<Vec<ScanLogDto>, ApiError>> + Send;

    fn health(&self) -> impl Future<Output = Result<HealthDto, ApiError>> + Send;
}

impl RemoteApi for ApiClient {
    fn list_cards(&self) -> impl Future<Output = Result<Vec<CardDto>, ApiError>> + Send {
        ApiClient::list_cards(self)
    }

    fn register_card(
        &self,
        req: &RegisterCardRequest,
    ) -> impl Future<Output = Result<Ack, ApiError>> + Send {
        ApiClient::register_card(self, req)
    }

    fn update_card(
        &self,
        uid: &str,
        req: &UpdateCardRequest,
    ) -> impl Future<Output = Result<Ack, ApiError>> + Send {
        ApiClient::update_card(self, uid, req)
    }

    fn delete_card(&self, uid: &str) -> impl Future<Output = Result<Ack, ApiError>> + Send {
        ApiClient::delete_card(self, uid)
    }

    fn list_patients(&self) -> impl Future<Output = Result<Vec<PatientDto>, ApiError>> + Send {
        ApiClient::list_patients(self)
    }

    fn create_patient(
        &self,
        req: &PatientRequest,
    ) -> impl Future<Output = Result<Ack, ApiError>> + Send {
        ApiClient::create_patient(self, req)
    }

    fn update_patient(
        &self,
        id: &str,
        req: &PatientRequest,
    ) -> impl Future<Output = Result<Ack, ApiError>> + Send {
        ApiClient::update_patient(self, id, req)
    }

    fn patient(
        &self,
        id_or_uid: &str,
    ) -> impl Future<Output = Result<PatientDetailDto, ApiError>> + Send {
        ApiClient::patient(self, id_or_uid)
    }

    fn list_prescriptions(
        &self,
        query: &PrescriptionQuery,
    ) -> impl Future<Output = Result<Vec<PrescriptionDto>, ApiError>> + Send {
        ApiClient::list_prescriptions(self, query)
    }

    fn create_prescription(
        &self,
        req: &PrescriptionRequest,
    ) -> impl Future<Output = Result<Ack, ApiError>> + Send {
        ApiClient::create_prescription(self, req)
    }

    fn verify_prescription(
        &self,
        id_or_barcode: &str,
    ) -> impl Future<Output = Result<VerifiedPrescriptionDto, ApiError>> + Send {
        ApiClient::verify_prescription(self, id_or_barcode)
    }

    fn scan_logs(
        &self,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<ScanLogDto>, ApiError>> + Send {
        ApiClient::scan_logs(self, limit)
    }

    fn health(&self) -> impl Future<Output = Result<HealthDto, ApiError>> + Send {
        ApiClient::health(self)
    }
}

// ── Result types ─────────────────────────────────────────────────────

/// Where a write's result came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// The server accepted the change.
    Remote,
    /// The server could not be reached or refused; the change was applied
    /// locally and is marked `pending_sync`.
    Local { reason: String },
}

/// A record together with the source that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synced<T> {
    pub value: T,
    pub source: DataSource,
}

impl<T> Synced<T> {
    pub fn is_offline(&self) -> bool {
        matches!(self.source, DataSource::Local { .. })
    }
}

/// Outcome of a record-set refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refresh<T> {
    /// Server records replaced local state.
    Applied(Vec<T>),
    /// A newer refresh or a write landed first; this result was discarded.
    Superseded,
    /// The server was unreachable; these are the cached records.
    Cached { records: Vec<T>, reason: String },
}

impl<T> Refresh<T> {
    /// The records this outcome carries, if any.
    pub fn records(&self) -> Option<&[T]> {
        match self {
            Self::Applied(records) | Self::Cached { records, .. } => Some(records),
            Self::Superseded => None,
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Cached { .. })
    }
}

// ── DataService ──────────────────────────────────────────────────────

/// Remote-first data access with a local fallback.
pub struct DataService<R> {
    remote: R,
    store: Arc<DataStore>,
    cache: Arc<LocalCache>,
    /// Last issued sequence number per kind.
    sequence: Mutex<HashMap<EntityKind, u64>>,
}

impl<R: RemoteApi> DataService<R> {
    /// Build the service and load the cached record sets into `store`.
    pub fn new(remote: R, store: Arc<DataStore>, cache: Arc<LocalCache>) -> Self {
        let service = Self {
            remote,
            store,
            cache,
            sequence: Mutex::new(HashMap::new()),
        };
        service.hydrate();
        service
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<LocalCache> {
        &self.cache
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Replace in-memory state with the cached record sets.
    pub fn hydrate(&self) {
        self.reload::<CardRecord>();
        self.reload::<PatientRecord>();
        self.reload::<PrescriptionRecord>();
        debug!(
            cards = self.store.card_count(),
            patients = self.store.patient_count(),
            prescriptions = self.store.prescription_count(),
            "hydrated from cache"
        );
    }

    // ── Card writes ──────────────────────────────────────────────────

    /// Register a card, optionally linked to a patient.
    pub async fn register_card(
        &self,
        uid: &str,
        label: &str,
        patient_id: Option<&str>,
    ) -> Result<Synced<CardRecord>, CoreError> {
        let uid = required("card UID", uid)?;
        let label = required("label", label)?;
        let patient_id = patient_id.map(str::trim).filter(|id| !id.is_empty());

        let req = RegisterCardRequest {
            uid: uid.to_owned(),
            label: label.to_owned(),
            patient_id: patient_id.map(str::to_owned),
        };

        let mut card = CardRecord::new_local(uid, label);
        card.linked_patient_id = patient_id.map(str::to_owned);
        card.patient_name = patient_id
            .and_then(|id| self.store.patient(id))
            .map(|p| p.name.clone());

        match self.remote.register_card(&req).await {
            Ok(_) => {
                card.pending_sync = false;
                self.commit::<CardRecord, _>(|cards| cards.upsert(card.clone()));
                info!(uid, "card registered");
                Ok(Synced {
                    value: card,
                    source: DataSource::Remote,
                })
            }
            Err(e) => {
                warn!(uid, error = %e, "remote registration failed, registering locally");
                self.commit::<CardRecord, _>(|cards| {
                    if cards.get(uid).is_some_and(|c| c.is_active) {
                        return Err(CoreError::ValidationFailed {
                            message: format!("card {uid} is already registered"),
                        });
                    }
                    cards.upsert(card.clone());
                    Ok(())
                })?;
                Ok(Synced {
                    value: card,
                    source: DataSource::Local {
                        reason: e.to_string(),
                    },
                })
            }
        }
    }

    /// Rename a card, keeping the patient link the server holds.
    ///
    /// The server overwrites the link on every update, so the card list is
    /// fetched first and the link sent back is the server's own. When the
    /// list cannot be fetched the rename is applied locally.
    pub async fn update_card(
        &self,
        uid: &str,
        label: &str,
    ) -> Result<Synced<CardRecord>, CoreError> {
        let label = required("label", label)?.to_owned();
        let seq = self.begin(EntityKind::Cards);

        let outcome = match self.remote.list_cards().await {
            Ok(dtos) => {
                let server_link = dtos
                    .iter()
                    .find(|c| c.uid == uid)
                    .map(|c| c.patient_id.clone());
                let records: Vec<CardRecord> = dtos.into_iter().map(Into::into).collect();
                self.finish_refresh(seq, Ok(records));

                let Some(patient_id) = server_link else {
                    return Err(CoreError::CardNotFound {
                        uid: uid.to_owned(),
                    });
                };
                let req = UpdateCardRequest {
                    label: Some(label.clone()),
                    patient_id,
                };
                self.remote.update_card(uid, &req).await.map(drop)
            }
            Err(e) => Err(e),
        };

        self.finish_card_edit(uid, outcome, |card| card.label.clone_from(&label))
            .await
    }

    /// Link a card to a patient.
    pub async fn link_card(
        &self,
        uid: &str,
        patient_id: &str,
    ) -> Result<Synced<CardRecord>, CoreError> {
        let patient_id = required("patient id", patient_id)?.to_owned();
        let patient_name = self.store.patient(&patient_id).map(|p| p.name.clone());
        let req = UpdateCardRequest {
            label: None,
            patient_id: Some(patient_id.clone()),
        };
        let outcome = self.remote.update_card(uid, &req).await.map(drop);
        self.finish_card_edit(uid, outcome, |card| {
            card.linked_patient_id = Some(patient_id.clone());
            card.patient_name.clone_from(&patient_name);
        })
        .await
    }

    /// Clear a card's patient link.
    pub async fn unlink_card(&self, uid: &str) -> Result<Synced<CardRecord>, CoreError> {
        let req = UpdateCardRequest {
            label: None,
            patient_id: None,
        };
        let outcome = self.remote.update_card(uid, &req).await.map(drop);
        self.finish_card_edit(uid, outcome, |card| {
            card.linked_patient_id = None;
            card.patient_name = None;
        })
        .await
    }

    /// Deactivate a card. The record is kept with `is_active = false`.
    pub async fn remove_card(&self, uid: &str) -> Result<Synced<CardRecord>, CoreError> {
        let outcome = self.remote.delete_card(uid).await.map(drop);
        self.finish_card_edit(uid, outcome, |card| card.is_active = false)
            .await
    }

    async fn finish_card_edit(
        &self,
        uid: &str,
        outcome: Result<(), ApiError>,
        edit: impl Fn(&mut CardRecord),
    ) -> Result<Synced<CardRecord>, CoreError> {
        let source = source_of(outcome, "card", uid);
        let offline = matches!(source, DataSource::Local { .. });

        let updated = self.commit::<CardRecord, _>(|cards| {
            cards.modify(uid, |card| {
                edit(card);
                if offline {
                    card.pending_sync = true;
                }
            })
        });

        if let Some(card) = updated {
            return Ok(Synced {
                value: (*card).clone(),
                source,
            });
        }

        // The server knows a card we have not seen yet.
        if !offline {
            self.refresh_cards().await;
            if let Some(card) = self.store.card(uid) {
                return Ok(Synced {
                    value: (*card).clone(),
                    source,
                });
            }
        }
        Err(CoreError::CardNotFound {
            uid: uid.to_owned(),
        })
    }

    // ── Patient writes ───────────────────────────────────────────────

    /// Create a patient. Offline creations get a locally generated id.
    pub async fn create_patient(
        &self,
        draft: &PatientDraft,
    ) -> Result<Synced<PatientRecord>, CoreError> {
        let name = required("patient name", draft.name.as_deref().unwrap_or_default())?;
        let req = PatientRequest::from(draft);

        let (id, source) = match self.remote.create_patient(&req).await {
            Ok(ack) => {
                let id = ack.id.ok_or_else(|| {
                    CoreError::Internal("server did not return the new patient id".into())
                })?;
                (id, DataSource::Remote)
            }
            Err(e) => {
                warn!(error = %e, "remote patient creation failed, creating locally");
                (
                    format!("local-{}", uuid::Uuid::new_v4()),
                    DataSource::Local {
                        reason: e.to_string(),
                    },
                )
            }
        };

        let now = chrono::Utc::now();
        let mut patient = PatientRecord {
            id,
            name: name.to_owned(),
            date_of_birth: None,
            gender: None,
            contact: None,
            email: None,
            address: None,
            rfid_uid: None,
            created_at: now,
            updated_at: now,
            pending_sync: matches!(source, DataSource::Local { .. }),
        };
        patient.apply(draft);

        self.commit::<PatientRecord, _>(|patients| patients.upsert(patient.clone()));
        info!(id = %patient.id, offline = patient.pending_sync, "patient created");
        Ok(Synced {
            value: patient,
            source,
        })
    }

    /// Overlay the set fields of `draft` onto an existing patient.
    pub async fn update_patient(
        &self,
        id: &str,
        draft: &PatientDraft,
    ) -> Result<Synced<PatientRecord>, CoreError> {
        if draft.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(CoreError::ValidationFailed {
                message: "patient name cannot be empty".into(),
            });
        }
        let req = PatientRequest::from(draft);
        let outcome = self.remote.update_patient(id, &req).await.map(drop);
        let source = source_of(outcome, "patient", id);
        let offline = matches!(source, DataSource::Local { .. });

        let updated = self.commit::<PatientRecord, _>(|patients| {
            patients.modify(id, |patient| {
                patient.apply(draft);
                if offline {
                    patient.pending_sync = true;
                }
            })
        });

        if let Some(patient) = updated {
            return Ok(Synced {
                value: (*patient).clone(),
                source,
            });
        }

        if !offline {
            self.refresh_patients().await;
            if let Some(patient) = self.store.patient(id) {
                return Ok(Synced {
                    value: (*patient).clone(),
                    source,
                });
            }
        }
        Err(CoreError::PatientNotFound { id: id.to_owned() })
    }

    // ── Refreshes ────────────────────────────────────────────────────

    pub async fn refresh_cards(&self) -> Refresh<CardRecord> {
        let seq = self.begin(EntityKind::Cards);
        let result = self.remote.list_cards().await;
        self.finish_refresh(seq, result.map(|dtos| dtos.into_iter().map(Into::into).collect()))
    }

    pub async fn refresh_patients(&self) -> Refresh<PatientRecord> {
        let seq = self.begin(EntityKind::Patients);
        let result = self.remote.list_patients().await;
        self.finish_refresh(seq, result.map(|dtos| dtos.into_iter().map(Into::into).collect()))
    }

    /// Refresh the full prescription set.
    pub async fn refresh_prescriptions(&self) -> Refresh<PrescriptionRecord> {
        let seq = self.begin(EntityKind::Prescriptions);
        let result = self
            .remote
            .list_prescriptions(&PrescriptionQuery::default())
            .await;
        self.finish_refresh(seq, result.map(|dtos| dtos.into_iter().map(Into::into).collect()))
    }

    /// Refresh every record set concurrently.
    pub async fn refresh_all(&self) -> bool {
        let (cards, patients, prescriptions) = tokio::join!(
            self.refresh_cards(),
            self.refresh_patients(),
            self.refresh_prescriptions()
        );
        !(cards.is_offline() || patients.is_offline() || prescriptions.is_offline())
    }

    // ── Remote-only reads ────────────────────────────────────────────

    /// Most recent scan log rows. There is no cached copy.
    pub async fn scan_logs(&self, limit: u32) -> Result<Vec<ScanLogEntry>, CoreError> {
        let rows = self.remote.scan_logs(limit).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn health(&self) -> Result<HealthDto, CoreError> {
        Ok(self.remote.health().await?)
    }

    /// One patient with their prescriptions, looked up by id or card uid.
    pub async fn patient_detail(&self, id_or_uid: &str) -> Result<PatientDetail, CoreError> {
        let key = required("patient id", id_or_uid)?;
        match self.remote.patient(key).await {
            Ok(dto) => Ok(dto.into()),
            Err(e) if e.is_not_found() => Err(CoreError::PatientNotFound { id: key.to_owned() }),
            Err(e) => Err(e.into()),
        }
    }

    /// Issue a prescription. There is no offline path: the server assigns
    /// the id and barcode.
    pub async fn create_prescription(
        &self,
        draft: &PrescriptionDraft,
    ) -> Result<IssuedPrescription, CoreError> {
        required("patient id", &draft.patient_id)?;
        required("medication", &draft.medication)?;
        required("dosage", &draft.dosage)?;
        required("frequency", &draft.frequency)?;

        let ack = self
            .remote
            .create_prescription(&PrescriptionRequest::from(draft))
            .await?;
        let id = ack.id.ok_or_else(|| {
            CoreError::Internal("server did not return the new prescription id".into())
        })?;
        info!(%id, patient = %draft.patient_id.trim(), "prescription issued");
        Ok(IssuedPrescription {
            id,
            barcode: ack.barcode,
        })
    }

    /// Verify a prescription by id or `RX-` barcode.
    pub async fn verify_prescription(
        &self,
        id_or_barcode: &str,
    ) -> Result<VerifiedPrescription, CoreError> {
        let key = required("prescription id or barcode", id_or_barcode)?;
        match self.remote.verify_prescription(key).await {
            Ok(dto) => {
                info!(id = %dto.prescription.id, "prescription verified");
                Ok(dto.into())
            }
            Err(e) if e.is_not_found() => Err(CoreError::PrescriptionNotFound {
                id: key.to_owned(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    // ── Sequencing and persistence ───────────────────────────────────

    fn begin(&self, kind: EntityKind) -> u64 {
        let mut issued = self.sequence.lock().unwrap_or_else(PoisonError::into_inner);
        let seq = issued.entry(kind).or_default();
        *seq += 1;
        *seq
    }

    fn finish_refresh<T: Stored>(&self, seq: u64, result: Result<Vec<T>, ApiError>) -> Refresh<T> {
        let records = match result {
            Ok(records) => records,
            Err(e) => {
                warn!(kind = %T::KIND, error = %e, "refresh failed, serving cached records");
                return Refresh::Cached {
                    records: self.cache.read::<T>(),
                    reason: e.to_string(),
                };
            }
        };

        let issued = self.sequence.lock().unwrap_or_else(PoisonError::into_inner);
        if issued.get(&T::KIND).copied().unwrap_or_default() != seq {
            debug!(kind = %T::KIND, seq, "discarding superseded refresh");
            return Refresh::Superseded;
        }

        T::collection(&self.store).replace_all(records.clone());
        self.persist::<T>();
        drop(issued);

        self.store.mark_remote_refresh();
        debug!(kind = %T::KIND, records = records.len(), "refresh applied");
        Refresh::Applied(records)
    }

    /// Apply a mutation to `T`'s collection and persist the result.
    /// Advances the kind's sequence so in-flight refreshes are discarded.
    fn commit<T: Stored, O>(&self, mutate: impl FnOnce(&EntityCollection<T>) -> O) -> O {
        let mut issued = self.sequence.lock().unwrap_or_else(PoisonError::into_inner);
        *issued.entry(T::KIND).or_default() += 1;
        let out = mutate(T::collection(&self.store));
        self.persist::<T>();
        out
    }

    fn persist<T: Stored>(&self) {
        let records = T::collection(&self.store).to_vec();
        if let Err(e) = self.cache.write(&records) {
            warn!(kind = %T::KIND, error = %e, "cache write failed");
        }
    }

    fn reload<T: Stored>(&self) {
        let records = self.cache.read::<T>();
        T::collection(&self.store).replace_all(records);
    }
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, CoreError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CoreError::ValidationFailed {
            message: format!("{field} is required"),
        });
    }
    Ok(value)
}

fn source_of(outcome: Result<(), ApiError>, what: &str, key: &str) -> DataSource {
    match outcome {
        Ok(()) => DataSource::Remote,
        Err(e) => {
            warn!(what, key, error = %e, "remote write failed, applying locally");
            DataSource::Local {
                reason: e.to_string(),
            }
        }
    }
}
