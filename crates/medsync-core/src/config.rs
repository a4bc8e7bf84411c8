// ── Runtime client configuration ──
//
// These types describe *how* to reach a MedSync server and where to keep
// the local cache. They carry credential data and tuning, but never touch
// config files: the CLI builds a `ClientConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use medsync_api::transport::{TlsMode, TransportConfig};
use medsync_api::websocket::ReconnectConfig;

use crate::cache::LegacyProjection;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed clinic servers).
    DangerAcceptInvalid,
}

/// Where the local cache lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CacheLocation {
    /// Process memory only; nothing survives a restart.
    #[default]
    Memory,
    /// One file per record set under this directory.
    Directory(PathBuf),
}

/// Configuration for one MedSync session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST API root, e.g. `http://localhost:8001`.
    pub api_url: Url,
    /// Realtime channel, e.g. `ws://localhost:8000`.
    pub ws_url: Url,
    /// Bearer token from a previous login.
    pub token: Option<SecretString>,
    pub tls: TlsVerification,
    /// Per-request timeout for the REST API.
    pub timeout: Duration,
    /// Backoff and heartbeat timing for the realtime channel.
    pub reconnect: ReconnectConfig,
    pub cache: CacheLocation,
    pub legacy_projection: LegacyProjection,
    /// Open the realtime channel on start.
    pub realtime_enabled: bool,
}

impl ClientConfig {
    /// A config for the given endpoints with default tuning.
    pub fn new(api_url: Url, ws_url: Url) -> Self {
        Self {
            api_url,
            ws_url,
            token: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
            cache: CacheLocation::default(),
            legacy_projection: LegacyProjection::default(),
            realtime_enabled: true,
        }
    }

    /// Transport settings shared by the REST client and the realtime channel.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
            token: self.token.clone(),
        }
    }
}
