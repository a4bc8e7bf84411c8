//! Realtime channel message types.
//!
//! Inbound frames are UTF-8 JSON objects discriminated by a `type` field.
//! [`decode_frame`] classifies a raw frame into a [`RealtimeEvent`], an
//! ignorable unknown type, or a malformed payload. Outbound control messages
//! are modeled by [`ClientMessage`].

use serde::{Deserialize, Serialize};

// ── Inbound ──────────────────────────────────────────────────────────

/// A classified message from the realtime channel.
///
/// The transport also publishes its own open/close transitions as
/// [`ConnectionStatus`](Self::ConnectionStatus) events so listeners observe
/// one ordered stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RealtimeEvent {
    /// A card was presented to the reader.
    #[serde(rename = "rfid_scan")]
    ScanDetected(ScanMessage),

    /// The server opened or closed its serial reader.
    #[serde(rename = "serial_status")]
    ReaderStatusChanged(ReaderStatus),

    /// Connection greeting from the server, or a local transport transition.
    #[serde(rename = "connection")]
    ConnectionStatus(ConnectionStatus),

    /// A card was registered through the REST API by some client.
    #[serde(rename = "card_registered")]
    CardRegistered(CardRegistered),

    /// Server-side failure report (serial errors, bad JSON from us, ...).
    #[serde(rename = "error")]
    ServerError(ServerError),

    /// Reply to an outbound `ping`.
    #[serde(rename = "pong")]
    HeartbeatAck,

    /// Reply to an outbound `get_status`.
    #[serde(rename = "status")]
    StatusSnapshot(StatusSnapshot),

    /// Any discriminant this client does not know about.
    #[serde(other)]
    Unknown,
}

impl RealtimeEvent {
    /// Event synthesized by the transport after a successful open.
    pub fn transport_connected() -> Self {
        Self::ConnectionStatus(ConnectionStatus {
            status: LinkStatus::Connected,
            serial_connected: None,
            last_scan: None,
        })
    }

    /// Event synthesized by the transport after a close or failed open.
    pub fn transport_disconnected() -> Self {
        Self::ConnectionStatus(ConnectionStatus {
            status: LinkStatus::Disconnected,
            serial_connected: None,
            last_scan: None,
        })
    }

    /// Short name of the event kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ScanDetected(_) => "scan-detected",
            Self::ReaderStatusChanged(_) => "reader-status-changed",
            Self::ConnectionStatus(_) => "connection-status",
            Self::CardRegistered(_) => "card-registered",
            Self::ServerError(_) => "server-error",
            Self::HeartbeatAck => "heartbeat-ack",
            Self::StatusSnapshot(_) => "status-snapshot",
            Self::Unknown => "unknown",
        }
    }
}

/// Scan broadcast, as relayed from the reader line
/// `DATA,<label>,<date>,<time>,<uid>`.
///
/// The server sends the uid twice (`cardUid` and `rfidUid`); either may be
/// the only one present on older servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanMessage {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub card_uid: Option<String>,
    #[serde(default)]
    pub rfid_uid: Option<String>,
    /// Server receive time, ISO-8601.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl ScanMessage {
    /// The scanned tag uid, whichever field carried it.
    pub fn uid(&self) -> Option<&str> {
        self.card_uid
            .as_deref()
            .or(self.rfid_uid.as_deref())
            .filter(|uid| !uid.is_empty())
    }
}

/// Up/down state used by both serial and connection status messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderStatus {
    pub status: LinkStatus,
    /// Serial device path, present when the reader opened.
    #[serde(default)]
    pub port: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub status: LinkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_connected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scan: Option<ScanMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRegistered {
    pub uid: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub patient_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    #[serde(default)]
    pub serial_connected: bool,
    #[serde(default)]
    pub is_reading: bool,
    #[serde(default)]
    pub last_scan: Option<ScanMessage>,
}

// ── Decoding ─────────────────────────────────────────────────────────

/// Outcome of classifying one inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A known, well-formed event.
    Event(RealtimeEvent),
    /// A well-formed frame with a discriminant this client does not handle.
    Ignored { kind: String },
    /// Not JSON, no `type` field, or a known type with an unusable body.
    Malformed { reason: String },
}

/// Classify a raw text frame.
pub fn decode_frame(text: &str) -> Decoded {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            return Decoded::Malformed {
                reason: format!("invalid JSON: {e}"),
            };
        }
    };

    let Some(kind) = value.get("type").and_then(serde_json::Value::as_str) else {
        return Decoded::Malformed {
            reason: "missing `type` discriminant".into(),
        };
    };
    let kind = kind.to_owned();

    match serde_json::from_value::<RealtimeEvent>(value) {
        Ok(RealtimeEvent::Unknown) => Decoded::Ignored { kind },
        Ok(RealtimeEvent::ScanDetected(ref scan)) if scan.uid().is_none() => Decoded::Malformed {
            reason: "scan without card uid".into(),
        },
        Ok(event) => Decoded::Event(event),
        Err(e) => Decoded::Malformed {
            reason: format!("invalid `{kind}` payload: {e}"),
        },
    }
}

// ── Outbound ─────────────────────────────────────────────────────────

/// Control messages the client may send. Delivery is at-most-once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    GetStatus,
    StartSerial,
    StopSerial,
}

impl ClientMessage {
    /// Encode as a JSON text frame.
    pub fn to_frame(self) -> String {
        match self {
            Self::Ping => r#"{"type":"ping"}"#,
            Self::GetStatus => r#"{"type":"get_status"}"#,
            Self::StartSerial => r#"{"type":"start_serial"}"#,
            Self::StopSerial => r#"{"type":"stop_serial"}"#,
        }
        .to_owned()
    }
}
