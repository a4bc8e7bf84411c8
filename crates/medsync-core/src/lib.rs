//! Offline-tolerant data layer and realtime session state for MedSync clients.
//!
//! - **[`MedSync`]**: facade that wires everything for one server.
//!   [`start()`](MedSync::start) refreshes the record sets and opens the
//!   realtime channel; [`MedSync::oneshot()`](MedSync::oneshot) is the
//!   lightweight mode for single CLI invocations.
//!
//! - **[`DataService`]**: remote-first reads and writes. When the server is
//!   unreachable, writes land locally flagged `pending_sync` and reads serve
//!   the [`LocalCache`]. Refresh results are sequenced per record set so a
//!   late response never overwrites a newer one.
//!
//! - **[`DataStore`]**: reactive in-memory record sets, published as whole
//!   `Arc<Vec<Arc<T>>>` snapshots through `watch` channels and consumed via
//!   [`EntityStream`].
//!
//! - **[`SessionBridge`]**: router listener that keeps [`SessionState`]
//!   current and raises [`Notification`]s for scans, reader changes, and
//!   server errors.

pub mod app;
pub mod bridge;
pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod notification;
pub mod service;
pub mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use app::MedSync;
pub use bridge::SessionBridge;
pub use cache::{DirectoryStore, KeyValueStore, LegacyProjection, LocalCache, MemoryStore};
pub use config::{CacheLocation, ClientConfig, TlsVerification};
pub use error::CoreError;
pub use notification::{Notification, Severity};
pub use service::{DataService, DataSource, Refresh, RemoteApi, Synced};
pub use session::{ResolvedScan, SessionSnapshot, SessionState};
pub use store::DataStore;
pub use stream::EntityStream;

pub use model::patient::PatientDraft;
pub use model::{
    CardRecord, EntityKind, IssuedPrescription, PatientDetail, PatientRecord, PrescriptionDraft,
    PrescriptionRecord, ScanEvent, ScanLogEntry, VerifiedPrescription,
};

// Transport types consumers commonly need alongside the core.
pub use medsync_api::models::HealthDto;
pub use medsync_api::{ConnectionState, ReconnectConfig};
