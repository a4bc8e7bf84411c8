// ── Session/notification bridge ──
//
// Router listener that turns realtime events into session state changes,
// user-facing notifications, and data refreshes. Runs synchronously on the
// transport task; anything that needs the remote API is spawned.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use medsync_api::events::{
    CardRegistered, ConnectionStatus, LinkStatus, ReaderStatus, ScanMessage, ServerError,
    StatusSnapshot,
};
use medsync_api::{RealtimeEvent, Router, Subscription};

use crate::convert::scan_event;
use crate::notification::Notification;
use crate::service::{DataService, RemoteApi};
use crate::session::{ResolvedScan, SessionState};

/// A live attachment of the bridge to a router. Dropping it detaches.
pub struct SessionBridge {
    _subscription: Subscription,
}

impl SessionBridge {
    /// Register the bridge as a listener on `router`.
    pub fn attach<R: RemoteApi>(
        router: &Router,
        service: Arc<DataService<R>>,
        session: SessionState,
        notifications: broadcast::Sender<Arc<Notification>>,
    ) -> Self {
        let handler = Handler {
            service,
            session,
            notifications,
        };
        let subscription = router.subscribe(move |event| handler.handle(event));
        Self {
            _subscription: subscription,
        }
    }
}

struct Handler<R> {
    service: Arc<DataService<R>>,
    session: SessionState,
    notifications: broadcast::Sender<Arc<Notification>>,
}

impl<R: RemoteApi> Handler<R> {
    fn handle(&self, event: &RealtimeEvent) {
        match event {
            RealtimeEvent::ScanDetected(msg) => self.on_scan(msg),
            RealtimeEvent::ReaderStatusChanged(status) => self.on_reader_status(status),
            RealtimeEvent::ConnectionStatus(status) => self.on_connection_status(status),
            RealtimeEvent::CardRegistered(card) => self.on_card_registered(card),
            RealtimeEvent::ServerError(err) => self.on_server_error(err),
            RealtimeEvent::HeartbeatAck => {
                self.session
                    .update(|s| s.last_heartbeat_ack = Some(Utc::now()));
            }
            RealtimeEvent::StatusSnapshot(status) => self.on_status_snapshot(status),
            RealtimeEvent::Unknown => {}
        }
    }

    fn on_scan(&self, msg: &ScanMessage) {
        let Some(scan) = self.resolve(msg) else {
            debug!("scan without a card uid");
            return;
        };

        let notification = if scan.is_known() {
            let mut message = format!("{} ({})", scan.display_label(), scan.event.card_uid);
            if let Some(ref patient) = scan.patient_name {
                message.push_str(" - ");
                message.push_str(patient);
            }
            Notification::info("Card scanned", message)
        } else {
            Notification::warning(
                "Unknown card",
                format!("Unknown card {}", scan.event.card_uid),
            )
        };
        info!(uid = %scan.event.card_uid, known = scan.is_known(), "card scanned");

        self.session.update(|s| s.last_scan = Some(scan));
        self.notify(notification);
    }

    fn on_reader_status(&self, status: &ReaderStatus) {
        let up = status.status == LinkStatus::Connected;
        self.session.update(|s| {
            s.serial_connected = up;
            s.reader_active = up;
            if status.port.is_some() {
                s.serial_port.clone_from(&status.port);
            }
        });

        let notification = if up {
            Notification::success(
                "RFID reader connected",
                status.port.as_deref().unwrap_or("serial port opened"),
            )
        } else {
            Notification::warning("RFID reader disconnected", "serial port closed")
        };
        self.notify(notification);
    }

    fn on_connection_status(&self, status: &ConnectionStatus) {
        match status.status {
            LinkStatus::Connected => {
                let last_scan = status.last_scan.as_ref().and_then(|m| self.resolve(m));
                let was_connected = self.session.update(|s| {
                    let was = s.connected;
                    s.connected = true;
                    if let Some(serial) = status.serial_connected {
                        s.serial_connected = serial;
                    }
                    if last_scan.is_some() {
                        s.last_scan = last_scan;
                    }
                    was
                });
                if !was_connected {
                    self.notify(Notification::success(
                        "Connected",
                        "realtime updates are live",
                    ));
                }
            }
            LinkStatus::Disconnected => {
                let was_connected = self.session.update(|s| {
                    let was = s.connected;
                    s.mark_disconnected();
                    was
                });
                if was_connected {
                    self.notify(Notification::warning(
                        "Disconnected",
                        "realtime connection lost, reconnecting",
                    ));
                }
            }
        }
    }

    fn on_card_registered(&self, card: &CardRegistered) {
        let label = if card.label.is_empty() {
            card.uid.clone()
        } else {
            format!("{} ({})", card.label, card.uid)
        };
        self.notify(Notification::success("Card registered", label));
        self.spawn_card_refresh();
    }

    fn on_server_error(&self, err: &ServerError) {
        warn!(message = %err.message, "server reported an error");
        self.notify(Notification::error("Server error", err.message.clone()));
    }

    fn on_status_snapshot(&self, status: &StatusSnapshot) {
        let last_scan = status.last_scan.as_ref().and_then(|m| self.resolve(m));
        self.session.update(|s| {
            s.serial_connected = status.serial_connected;
            s.reader_active = status.is_reading;
            if last_scan.is_some() {
                s.last_scan = last_scan;
            }
        });
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn resolve(&self, msg: &ScanMessage) -> Option<ResolvedScan> {
        let event = scan_event(msg)?;
        let card = self.service.store().active_card(&event.card_uid);
        Some(ResolvedScan {
            card_label: card.as_ref().map(|c| c.label.clone()),
            patient_name: card.and_then(|c| c.patient_name.clone()),
            event,
        })
    }

    fn spawn_card_refresh(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no runtime, skipping card refresh");
            return;
        };
        let service = Arc::clone(&self.service);
        runtime.spawn(async move {
            let outcome = service.refresh_cards().await;
            debug!(offline = outcome.is_offline(), "card refresh after registration");
        });
    }

    fn notify(&self, notification: Notification) {
        debug!(%notification, "notification");
        // No receivers is fine.
        let _ = self.notifications.send(Arc::new(notification));
    }
}
