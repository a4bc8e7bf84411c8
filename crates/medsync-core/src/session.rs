// ── Shared session state ──
//
// What the realtime channel has told us about the server and its reader.
// Written only by the session bridge; everyone else reads snapshots or
// subscribes to changes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::model::ScanEvent;

/// A scan together with what the local records say about the card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedScan {
    pub event: ScanEvent,
    /// Label of the matching active card, if any.
    pub card_label: Option<String>,
    pub patient_name: Option<String>,
}

impl ResolvedScan {
    pub fn is_known(&self) -> bool {
        self.card_label.is_some()
    }

    /// Card label, falling back to the label the reader reported.
    pub fn display_label(&self) -> &str {
        self.card_label.as_deref().unwrap_or(&self.event.label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// The realtime channel is open.
    pub connected: bool,
    /// The server has its serial reader open.
    pub serial_connected: bool,
    /// The server is actively reading scans.
    pub reader_active: bool,
    pub serial_port: Option<String>,
    pub last_scan: Option<ResolvedScan>,
    pub last_heartbeat_ack: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    /// Clear everything that depends on an open channel.
    pub(crate) fn mark_disconnected(&mut self) {
        self.connected = false;
        self.serial_connected = false;
        self.reader_active = false;
    }

    /// Short human summary, for status lines.
    pub fn summary(&self) -> String {
        let link = if self.connected { "connected" } else { "disconnected" };
        let reader = match (self.serial_connected, self.reader_active) {
            (true, true) => "reading",
            (true, false) => "idle",
            (false, _) => "offline",
        };
        format!("server {link}, reader {reader}")
    }
}

/// Cloneable handle on the session snapshot.
#[derive(Clone)]
pub struct SessionState {
    tx: Arc<watch::Sender<SessionSnapshot>>,
}

impl SessionState {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    /// Apply `f` and notify subscribers if anything changed. Returns what
    /// `f` returned.
    pub(crate) fn update<O>(&self, f: impl FnOnce(&mut SessionSnapshot) -> O) -> O {
        let mut out = None;
        self.tx.send_if_modified(|snap| {
            let before = snap.clone();
            out = Some(f(snap));
            *snap != before
        });
        // send_if_modified always runs the closure.
        match out {
            Some(out) => out,
            None => unreachable!("session update closure did not run"),
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
