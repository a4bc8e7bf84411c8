// ── Scan types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A card presented to the reader, as relayed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub card_uid: String,
    /// The label the reader firmware attached to the scan line.
    pub label: String,
    pub observed_at: DateTime<Utc>,
}

/// A row of the server's scan log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanLogEntry {
    pub id: i64,
    pub rfid_uid: String,
    pub scanned_at: DateTime<Utc>,
    pub action: Option<String>,
    pub label: Option<String>,
    pub patient_name: Option<String>,
}
