//! CLI configuration: thin wrapper around `medsync_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--api-url, --token, --cache-dir, etc.).

use secrecy::SecretString;

use medsync_core::{ClientConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use medsync_config::{
    Config, Profile, clear_token, config_path, load_config_or_default, save_config, store_token,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// The active profile name and its settings with flag overrides applied.
pub fn active_profile(global: &GlobalOpts, cfg: &Config) -> Result<(String, Profile), CliError> {
    let (name, mut profile) = cfg.profile(global.profile.as_deref())?;

    if let Some(ref api_url) = global.api_url {
        profile.api_url.clone_from(api_url);
        // A profile's realtime URL belongs to its own server.
        if global.ws_url.is_none() {
            profile.ws_url = None;
        }
    }
    if let Some(ref ws_url) = global.ws_url {
        profile.ws_url = Some(ws_url.clone());
    }
    if let Some(ref dir) = global.cache_dir {
        profile.cache_dir = Some(dir.clone());
    }
    if let Some(secs) = global.timeout {
        if secs == 0 {
            return Err(CliError::Validation {
                field: "timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        profile.timeout = Some(secs);
    }

    Ok((name, profile))
}

/// Translate the active profile + global flags into a `ClientConfig`.
///
/// Realtime is off; commands that need it turn it on.
pub fn resolve_client_config(global: &GlobalOpts) -> Result<(String, ClientConfig), CliError> {
    let cfg = load_config_or_default();
    let (name, profile) = active_profile(global, &cfg)?;

    let mut client = medsync_config::profile_to_client_config(&profile, &name, &cfg.defaults)?;

    if let Some(ref token) = global.token {
        client.token = Some(SecretString::from(token.clone()));
    }
    if global.insecure {
        client.tls = TlsVerification::DangerAcceptInvalid;
    }
    client.realtime_enabled = false;

    Ok((name, client))
}
