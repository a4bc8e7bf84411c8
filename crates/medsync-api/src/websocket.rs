//! Realtime channel client with auto-reconnect and heartbeat.
//!
//! [`TransportClient`] owns at most one WebSocket connection to the MedSync
//! server. A background task drives the lifecycle:
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──open──▶ Connected
//!      ▲                          │                   │
//!      └──── backoff sleep ◀──────┴──── close/error ◀─┘
//! ```
//!
//! Inbound text frames are handed to the [`Router`]. Transport transitions
//! are dispatched through the same router as
//! [`RealtimeEvent::ConnectionStatus`] events. `disconnect()` cancels the
//! task, including any pending reconnect sleep and the heartbeat.
//!
//! # Example
//!
//! ```rust,ignore
//! use medsync_api::{Router, TransportClient, ReconnectConfig, TransportConfig};
//! use url::Url;
//!
//! let router = Router::new();
//! let _sub = router.subscribe(|event| println!("{}", event.kind()));
//!
//! let ws = TransportClient::new(
//!     Url::parse("ws://localhost:8000")?,
//!     &TransportConfig::default(),
//!     ReconnectConfig::default(),
//!     router,
//! )?;
//! ws.connect();
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::events::{ClientMessage, RealtimeEvent};
use crate::router::Router;
use crate::transport::TransportConfig;

// ── ConnectionState ──────────────────────────────────────────────────

/// Lifecycle state of the realtime connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Backoff and heartbeat timing for the realtime connection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 3s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Multiplier applied after each failed attempt. Default: 1.5.
    pub factor: f64,

    /// Interval between outbound `ping` messages. Default: 30s.
    pub heartbeat_interval: Duration,

    /// Give up on a single opening handshake after this long. Default: 10s.
    pub connect_timeout: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(30),
            factor: 1.5,
            heartbeat_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Heartbeat intervals are clamped to this so the first tick stays
/// representable as an [`Instant`].
const MAX_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

// ── Backoff ──────────────────────────────────────────────────────────

/// Multiplicative backoff: `delay(n) = min(initial * factor^n, max)`.
///
/// No jitter; the schedule is deterministic.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    factor: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(config: &ReconnectConfig) -> Self {
        let initial = config.initial_delay.min(config.max_delay);
        Self {
            initial,
            max: config.max_delay,
            factor: config.factor.max(1.0),
            current: initial,
        }
    }

    /// The delay to wait before the next attempt. Advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.mul_f64(self.factor).min(self.max);
        delay
    }

    /// Return to the initial delay (after a successful open).
    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    /// The delay [`next_delay`](Self::next_delay) would return.
    pub fn peek(&self) -> Duration {
        self.current
    }
}

// ── TransportClient ──────────────────────────────────────────────────

/// Handle to the realtime connection.
///
/// Cheaply cloneable; clones control the same connection.
#[derive(Clone)]
pub struct TransportClient {
    inner: Arc<Inner>,
}

struct Inner {
    url: Url,
    authorization: Option<SecretString>,
    reconnect: ReconnectConfig,
    router: Router,
    state_tx: watch::Sender<ConnectionState>,
    /// Present only while a connection is open.
    outbound: Mutex<Option<(u64, mpsc::UnboundedSender<ClientMessage>)>>,
    /// The running lifecycle task, if any.
    session: Mutex<Option<Session>>,
    next_generation: std::sync::atomic::AtomicU64,
}

struct Session {
    generation: u64,
    cancel: CancellationToken,
}

/// How a single connection attempt ended.
enum Ended {
    Cancelled,
    FailedToOpen(Error),
    Closed(Option<Error>),
}

impl TransportClient {
    /// Create a client for `ws_url`. Does not connect.
    ///
    /// The bearer token from `transport`, if any, is sent on the upgrade
    /// request.
    pub fn new(
        ws_url: Url,
        transport: &TransportConfig,
        reconnect: ReconnectConfig,
        router: Router,
    ) -> Result<Self, Error> {
        let authorization = transport
            .authorization_header()?
            .map(|value| {
                value
                    .to_str()
                    .map(|s| SecretString::from(s.to_owned()))
                    .map_err(|_| Error::Authentication {
                        message: "bearer token is not valid ASCII".into(),
                    })
            })
            .transpose()?;

        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            inner: Arc::new(Inner {
                url: ws_url,
                authorization,
                reconnect,
                router,
                state_tx,
                outbound: Mutex::new(None),
                session: Mutex::new(None),
                next_generation: std::sync::atomic::AtomicU64::new(0),
            }),
        })
    }

    /// Start the connection lifecycle if it is not already running.
    ///
    /// Idempotent: while a connection is open, opening, or waiting to
    /// reconnect, further calls do nothing. Must be called from within a
    /// Tokio runtime.
    pub fn connect(&self) {
        let mut session = self
            .inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if session.as_ref().is_some_and(|s| !s.cancel.is_cancelled()) {
            tracing::debug!("realtime connection already active, ignoring connect()");
            return;
        }

        let generation = self
            .inner
            .next_generation
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let cancel = CancellationToken::new();
        *session = Some(Session {
            generation,
            cancel: cancel.clone(),
        });
        drop(session);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            run(inner, generation, cancel).await;
        });
    }

    /// Tear down the connection and cancel any pending reconnect or heartbeat.
    ///
    /// Terminal until [`connect`](Self::connect) is called again.
    pub fn disconnect(&self) {
        let session = self
            .inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(session) = session else {
            return;
        };
        session.cancel.cancel();
        self.inner.clear_outbound(session.generation);

        let previous = self.inner.state_tx.send_replace(ConnectionState::Disconnected);
        tracing::info!(url = %self.inner.url, "realtime connection closed by caller");
        if previous == ConnectionState::Connected {
            self.inner
                .router
                .dispatch(&RealtimeEvent::transport_disconnected());
        }
    }

    /// Send a control message. A no-op returning `false` when not connected;
    /// nothing is queued.
    pub fn send(&self, message: ClientMessage) -> bool {
        let outbound = self
            .inner
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match outbound.as_ref() {
            Some((_, tx)) => tx.send(message).is_ok(),
            None => {
                tracing::debug!(?message, "not connected, dropping outbound message");
                false
            }
        }
    }

    /// Send a heartbeat `ping` outside the regular interval.
    pub fn ping(&self) -> bool {
        self.send(ClientMessage::Ping)
    }

    /// Ask the server for a `status` snapshot.
    pub fn request_status(&self) -> bool {
        self.send(ClientMessage::GetStatus)
    }

    /// Ask the server to open its serial reader.
    pub fn start_reader(&self) -> bool {
        self.send(ClientMessage::StartSerial)
    }

    /// Ask the server to close its serial reader.
    pub fn stop_reader(&self) -> bool {
        self.send(ClientMessage::StopSerial)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Watch lifecycle state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// The router inbound events are dispatched through.
    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    pub fn url(&self) -> &Url {
        &self.inner.url
    }
}

// ── Inner helpers ────────────────────────────────────────────────────

impl Inner {
    /// Publish `state` only if `generation` is still the live session.
    fn publish_state(&self, generation: u64, state: ConnectionState) -> bool {
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let current = session
            .as_ref()
            .is_some_and(|s| s.generation == generation && !s.cancel.is_cancelled());
        if current {
            self.state_tx.send_replace(state);
        }
        current
    }

    fn install_outbound(&self, generation: u64, tx: mpsc::UnboundedSender<ClientMessage>) {
        *self.outbound.lock().unwrap_or_else(PoisonError::into_inner) = Some((generation, tx));
    }

    fn clear_outbound(&self, generation: u64) {
        let mut outbound = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        if outbound.as_ref().is_some_and(|(g, _)| *g == generation) {
            *outbound = None;
        }
    }

    fn upgrade_request(&self) -> Result<ClientRequestBuilder, Error> {
        let uri: tungstenite::http::Uri = self
            .url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

        let mut request = ClientRequestBuilder::new(uri);
        if let Some(ref auth) = self.authorization {
            request = request.with_header("Authorization", auth.expose_secret());
        }
        Ok(request)
    }
}

// ── Background lifecycle loop ────────────────────────────────────────

/// connect → read until close → backoff → reconnect, until cancelled.
async fn run(inner: Arc<Inner>, generation: u64, cancel: CancellationToken) {
    let mut backoff = Backoff::new(&inner.reconnect);

    loop {
        if !inner.publish_state(generation, ConnectionState::Connecting) {
            break;
        }

        match connect_once(&inner, generation, &cancel, &mut backoff).await {
            Ended::Cancelled => break,
            Ended::FailedToOpen(e) => {
                tracing::warn!(error = %e, url = %inner.url, "realtime connection failed");
            }
            Ended::Closed(Some(e)) => tracing::warn!(error = %e, "realtime connection dropped"),
            Ended::Closed(None) => tracing::info!("realtime connection closed"),
        }

        if !inner.publish_state(generation, ConnectionState::Disconnected) {
            break;
        }
        inner.router.dispatch(&RealtimeEvent::transport_disconnected());

        let delay = backoff.next_delay();
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    tracing::debug!(generation, "realtime loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Open one connection and pump frames until it closes or is cancelled.
async fn connect_once(
    inner: &Inner,
    generation: u64,
    cancel: &CancellationToken,
    backoff: &mut Backoff,
) -> Ended {
    let request = match inner.upgrade_request() {
        Ok(r) => r,
        Err(e) => return Ended::FailedToOpen(e),
    };

    tracing::info!(url = %inner.url, "connecting to realtime channel");

    let opened = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ended::Cancelled,
        r = tokio::time::timeout(
            inner.reconnect.connect_timeout,
            tokio_tungstenite::connect_async(request),
        ) => r,
    };

    let ws_stream = match opened {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => return Ended::FailedToOpen(Error::WebSocketConnect(e.to_string())),
        Err(_) => {
            return Ended::FailedToOpen(Error::Timeout {
                timeout_secs: inner.reconnect.connect_timeout.as_secs(),
            });
        }
    };

    backoff.reset();
    let (tx, mut rx) = mpsc::unbounded_channel();
    inner.install_outbound(generation, tx);
    if !inner.publish_state(generation, ConnectionState::Connected) {
        inner.clear_outbound(generation);
        return Ended::Cancelled;
    }
    tracing::info!("realtime channel connected");
    inner.router.dispatch(&RealtimeEvent::transport_connected());

    let (mut write, mut read) = ws_stream.split();
    let period = inner
        .reconnect
        .heartbeat_interval
        .clamp(Duration::from_millis(1), MAX_HEARTBEAT_INTERVAL);
    let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let ended = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                break Ended::Cancelled;
            }
            Some(message) = rx.recv() => {
                if let Err(e) = write.send(tungstenite::Message::text(message.to_frame())).await {
                    break Ended::Closed(Some(Error::WebSocketConnect(e.to_string())));
                }
            }
            _ = heartbeat.tick() => {
                tracing::trace!("sending heartbeat ping");
                if let Err(e) = write.send(tungstenite::Message::text(ClientMessage::Ping.to_frame())).await {
                    break Ended::Closed(Some(Error::WebSocketConnect(e.to_string())));
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        inner.router.dispatch_frame(text.as_str());
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let err = frame.map(|cf| Error::WebSocketClosed {
                            code: u16::from(cf.code),
                            reason: cf.reason.as_str().to_owned(),
                        });
                        break Ended::Closed(err);
                    }
                    Some(Ok(tungstenite::Message::Binary(_))) => {
                        tracing::warn!("dropping binary realtime frame");
                    }
                    Some(Ok(_)) => {
                        // Ping/Pong/raw frames; tungstenite answers pings itself
                    }
                    Some(Err(e)) => {
                        break Ended::Closed(Some(Error::WebSocketConnect(e.to_string())));
                    }
                    None => break Ended::Closed(None),
                }
            }
        }
    };

    inner.clear_outbound(generation);
    ended
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(3));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!((config.factor - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
    }

    #[test]
    fn backoff_schedule_for_five_failures() {
        let mut backoff = Backoff::new(&ReconnectConfig::default());
        let delays: Vec<Duration> = (0..5).map(|_| backoff.next_delay()).collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_millis(3000),
                Duration::from_millis(4500),
                Duration::from_millis(6750),
                Duration::from_millis(10125),
                Duration::from_micros(15_187_500),
            ]
        );
    }

    #[test]
    fn backoff_is_monotonic_and_capped() {
        let config = ReconnectConfig::default();
        let mut backoff = Backoff::new(&config);
        let mut previous = Duration::ZERO;
        for _ in 0..50 {
            let delay = backoff.next_delay();
            assert!(delay >= previous, "{delay:?} < {previous:?}");
            assert!(delay <= config.max_delay);
            previous = delay;
        }
        assert_eq!(previous, config.max_delay);
    }

    #[test]
    fn backoff_reset_returns_to_initial() {
        let mut backoff = Backoff::new(&ReconnectConfig::default());
        for _ in 0..4 {
            backoff.next_delay();
        }
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(3));
    }

    #[test]
    fn send_without_connection_is_noop() {
        let client = TransportClient::new(
            Url::parse("ws://127.0.0.1:9").expect("valid url"),
            &TransportConfig::default(),
            ReconnectConfig::default(),
            Router::new(),
        )
        .expect("client");

        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(!client.send(ClientMessage::Ping));
        assert!(!client.start_reader());
    }

    #[test]
    fn disconnect_before_connect_is_harmless() {
        let client = TransportClient::new(
            Url::parse("ws://127.0.0.1:9").expect("valid url"),
            &TransportConfig::default(),
            ReconnectConfig::default(),
            Router::new(),
        )
        .expect("client");

        client.disconnect();
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}
