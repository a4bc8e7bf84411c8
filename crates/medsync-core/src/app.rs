// ── MedSync session facade ──
//
// Composition root: wires the REST client, local cache, data service,
// realtime transport, router, and session bridge for one server.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use medsync_api::{ApiClient, ConnectionState, Router, TransportClient};

use crate::bridge::SessionBridge;
use crate::cache::{DirectoryStore, KeyValueStore, LocalCache, MemoryStore};
use crate::config::{CacheLocation, ClientConfig};
use crate::error::CoreError;
use crate::model::{CardRecord, PatientRecord, PrescriptionRecord};
use crate::notification::Notification;
use crate::service::DataService;
use crate::session::{SessionSnapshot, SessionState};
use crate::store::DataStore;
use crate::stream::EntityStream;

const NOTIFICATION_CHANNEL_SIZE: usize = 64;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<MedSyncInner>`. Construction loads the
/// local cache and attaches the session bridge; [`start`](Self::start)
/// refreshes from the server and opens the realtime channel.
#[derive(Clone)]
pub struct MedSync {
    inner: Arc<MedSyncInner>,
}

struct MedSyncInner {
    config: ClientConfig,
    service: Arc<DataService<ApiClient>>,
    transport: TransportClient,
    session: SessionState,
    notifications: broadcast::Sender<Arc<Notification>>,
    /// Detached on shutdown.
    bridge: Mutex<Option<SessionBridge>>,
}

impl MedSync {
    /// Build a session for `config`. Does not touch the network.
    pub fn new(config: ClientConfig) -> Result<Self, CoreError> {
        let transport_config = config.transport();
        let api = ApiClient::new(config.api_url.clone(), &transport_config)?;

        let kv: Arc<dyn KeyValueStore> = match &config.cache {
            CacheLocation::Memory => Arc::new(MemoryStore::new()),
            CacheLocation::Directory(path) => Arc::new(DirectoryStore::new(path.clone())),
        };
        let cache = Arc::new(LocalCache::new(kv, config.legacy_projection));
        let store = Arc::new(DataStore::new());
        let service = Arc::new(DataService::new(api, store, cache));

        let router = Router::new();
        let transport = TransportClient::new(
            config.ws_url.clone(),
            &transport_config,
            config.reconnect.clone(),
            router.clone(),
        )?;

        let session = SessionState::new();
        let (notifications, _) = broadcast::channel(NOTIFICATION_CHANNEL_SIZE);
        let bridge = SessionBridge::attach(
            &router,
            Arc::clone(&service),
            session.clone(),
            notifications.clone(),
        );

        debug!(api = %config.api_url, ws = %config.ws_url, "session built");

        Ok(Self {
            inner: Arc::new(MedSyncInner {
                config,
                service,
                transport,
                session,
                notifications,
                bridge: Mutex::new(Some(bridge)),
            }),
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Refresh every record set, then open the realtime channel if enabled.
    ///
    /// Returns `false` when the server was unreachable and cached data is
    /// being served. Never fails on connectivity alone.
    pub async fn start(&self) -> bool {
        let online = self.inner.service.refresh_all().await;
        if self.inner.config.realtime_enabled {
            self.inner.transport.connect();
        }
        info!(online, realtime = self.inner.config.realtime_enabled, "session started");
        online
    }

    /// Close the realtime channel and detach the bridge.
    pub fn shutdown(&self) {
        self.inner.transport.disconnect();
        self.inner
            .bridge
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        debug!("session shut down");
    }

    /// Build a session without realtime, run `f`, shut down.
    pub async fn oneshot<F, Fut, T>(config: ClientConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(MedSync) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.realtime_enabled = false;

        let app = MedSync::new(cfg)?;
        let result = f(app.clone()).await;
        app.shutdown();
        result
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn service(&self) -> &Arc<DataService<ApiClient>> {
        &self.inner.service
    }

    pub fn api(&self) -> &ApiClient {
        self.inner.service.remote()
    }

    pub fn store(&self) -> &Arc<DataStore> {
        self.inner.service.store()
    }

    pub fn cache(&self) -> &Arc<LocalCache> {
        self.inner.service.cache()
    }

    pub fn transport(&self) -> &TransportClient {
        &self.inner.transport
    }

    pub fn router(&self) -> &Router {
        self.inner.transport.router()
    }

    // ── State observation ────────────────────────────────────────────

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.transport.subscribe_state()
    }

    pub fn session(&self) -> SessionSnapshot {
        self.inner.session.snapshot()
    }

    pub fn subscribe_session(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.session.subscribe()
    }

    /// Subscribe to the notification broadcast stream.
    pub fn notifications(&self) -> broadcast::Receiver<Arc<Notification>> {
        self.inner.notifications.subscribe()
    }

    pub fn cards(&self) -> EntityStream<CardRecord> {
        self.store().subscribe_cards()
    }

    pub fn patients(&self) -> EntityStream<PatientRecord> {
        self.store().subscribe_patients()
    }

    pub fn prescriptions(&self) -> EntityStream<PrescriptionRecord> {
        self.store().subscribe_prescriptions()
    }
}
