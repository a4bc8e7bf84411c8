//! Shared configuration for MedSync tools.
//!
//! TOML profiles, token resolution (env + keyring + plaintext), and
//! translation to `medsync_core::ClientConfig`. The CLI adds flag-aware
//! wrappers on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use medsync_core::{
    CacheLocation, ClientConfig, LegacyProjection, ReconnectConfig, TlsVerification,
};

const KEYRING_SERVICE: &str = "medsync";
const DEFAULT_TOKEN_ENV: &str = "MEDSYNC_TOKEN";
/// Longest accepted heartbeat interval, one hour.
const MAX_HEARTBEAT_SECS: u64 = 3600;

/// REST API port of a stock MedSync server.
pub const DEFAULT_API_PORT: u16 = 8001;
/// Realtime channel port of a stock MedSync server.
pub const DEFAULT_WS_PORT: u16 = 8000;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<keyring::Error> for ConfigError {
    fn from(err: keyring::Error) -> Self {
        Self::Keyring(err.to_string())
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// A config with one `default` profile pointing at a local server.
    pub fn starter() -> Self {
        let mut cfg = Self::default();
        cfg.profiles.insert("default".into(), Profile::default());
        cfg
    }

    /// The profile to use: `requested`, else `default_profile`, else
    /// `"default"`. A missing profile named `default` resolves to the
    /// built-in local profile.
    pub fn profile(&self, requested: Option<&str>) -> Result<(String, Profile), ConfigError> {
        let name = requested
            .or(self.default_profile.as_deref())
            .unwrap_or("default")
            .to_owned();
        match self.profiles.get(&name) {
            Some(p) => Ok((name, p.clone())),
            None if name == "default" => Ok((name, Profile::default())),
            None => Err(ConfigError::UnknownProfile { profile: name }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named server profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// REST API base URL (e.g., "http://localhost:8001").
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Realtime channel URL. Derived from `api_url` when unset.
    pub ws_url: Option<String>,

    /// Account used by `login`.
    pub email: Option<String>,

    /// Bearer token (plaintext, prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the bearer token.
    pub token_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Local cache directory. Defaults to the platform cache dir.
    pub cache_dir: Option<PathBuf>,

    /// Keep writing the legacy `uid -> label` card map.
    pub legacy_projection: Option<bool>,

    /// Realtime heartbeat interval in seconds.
    pub heartbeat_secs: Option<u64>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            ws_url: None,
            email: None,
            token: None,
            token_env: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
            cache_dir: None,
            legacy_projection: None,
            heartbeat_secs: None,
        }
    }
}

fn default_api_url() -> String {
    format!("http://localhost:{DEFAULT_API_PORT}")
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "medsync", "medsync")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default cache directory for a profile.
pub fn cache_dir(profile_name: &str) -> PathBuf {
    project_dirs()
        .map_or_else(
            || dirs_fallback(".cache"),
            |dirs| dirs.cache_dir().to_path_buf(),
        )
        .join(profile_name)
}

fn dirs_fallback(kind: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(kind);
    p.push("medsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the Config from `path` + environment.
///
/// Environment keys use `__` for nesting, e.g.
/// `MEDSYNC_DEFAULTS__TIMEOUT=10`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("MEDSYNC_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution ────────────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/token"),
    )?)
}

/// Resolve a bearer token from the credential chain (no CLI flag step).
///
/// Order: the env var named by the profile (or `MEDSYNC_TOKEN`), the
/// system keyring, then plaintext in the config. `None` means
/// unauthenticated.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    // 1. Env var
    let env_name = profile.token_env.as_deref().unwrap_or(DEFAULT_TOKEN_ENV);
    if let Ok(val) = std::env::var(env_name) {
        if !val.is_empty() {
            return Some(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    profile.token.clone().map(SecretString::from)
}

/// Store a token in the system keyring for `profile_name`.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(token)?;
    Ok(())
}

/// Remove a stored token. A missing entry is not an error.
pub fn clear_token(profile_name: &str) -> Result<(), ConfigError> {
    match keyring_entry(profile_name)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// ── Translation to ClientConfig ─────────────────────────────────────

/// Realtime URL for a server whose REST API lives at `api_url`: same host,
/// `ws`/`wss` scheme, the realtime port.
pub fn derive_ws_url(api_url: &Url) -> Result<Url, ConfigError> {
    let scheme = if api_url.scheme() == "https" {
        "wss"
    } else {
        "ws"
    };
    let host = api_url.host_str().ok_or_else(|| ConfigError::Validation {
        field: "api_url".into(),
        reason: format!("no host in {api_url}"),
    })?;
    parse_url("ws_url", &format!("{scheme}://{host}:{DEFAULT_WS_PORT}"))
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

/// Build a `ClientConfig` from a profile, with no CLI flag overrides.
///
/// Uses the profile's cache directory, or the platform default for
/// `profile_name`.
pub fn profile_to_client_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    let api_url = parse_url("api_url", &profile.api_url)?;
    let ws_url = match profile.ws_url {
        Some(ref raw) => parse_url("ws_url", raw)?,
        None => derive_ws_url(&api_url)?,
    };

    let mut cfg = ClientConfig::new(api_url, ws_url);
    cfg.token = resolve_token(profile, profile_name);

    cfg.tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    cfg.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    cfg.cache = CacheLocation::Directory(
        profile
            .cache_dir
            .clone()
            .unwrap_or_else(|| cache_dir(profile_name)),
    );

    if profile.legacy_projection == Some(false) {
        cfg.legacy_projection = LegacyProjection::Off;
    }

    if let Some(secs) = profile.heartbeat_secs {
        if !(1..=MAX_HEARTBEAT_SECS).contains(&secs) {
            return Err(ConfigError::Validation {
                field: "heartbeat_secs".into(),
                reason: format!("must be between 1 and {MAX_HEARTBEAT_SECS}"),
            });
        }
        cfg.reconnect = ReconnectConfig {
            heartbeat_interval: Duration::from_secs(secs),
            ..ReconnectConfig::default()
        };
    }

    Ok(cfg)
}
