//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use medsync_config::ConfigError;
use medsync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to MedSync server at {url}")]
    #[diagnostic(
        code(medsync::connection_failed),
        help(
            "Check that the server is running and reachable.\n\
             URL: {url}\n\
             Try: medsync health --api-url <URL>"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Realtime channel at {url} did not come up")]
    #[diagnostic(
        code(medsync::realtime_unavailable),
        help(
            "The reader is controlled over the realtime channel, which listens\n\
             on a separate port from the REST API. Check --ws-url or ws_url in\n\
             your profile."
        )
    )]
    RealtimeUnavailable { url: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(medsync::auth_failed),
        help("Sign in again with: medsync login --profile {profile}")
    )]
    AuthFailed { profile: String, message: String },

    #[error("Permission denied: {message}")]
    #[diagnostic(
        code(medsync::permission_denied),
        help("Your account's role does not allow this operation.")
    )]
    PermissionDenied { message: String },

    #[error("Could not access the system keyring: {message}")]
    #[diagnostic(
        code(medsync::keyring),
        help(
            "Set the token in the MEDSYNC_TOKEN environment variable instead,\n\
             or put it in the profile's `token` field."
        )
    )]
    Keyring { message: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(medsync::not_found),
        help("Run: medsync {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Conflict: {message}")]
    #[diagnostic(code(medsync::conflict))]
    Conflict { message: String },

    // ── Server ───────────────────────────────────────────────────────

    #[error("Server error ({status}): {message}")]
    #[diagnostic(code(medsync::api_error))]
    ApiError { status: String, message: String },

    #[error("Reader error: {message}")]
    #[diagnostic(
        code(medsync::reader),
        help("Check that the reader is plugged into the server and the serial port is free.")
    )]
    Reader { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(medsync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(medsync::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: medsync --profile {name} config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(medsync::config),
        help("Inspect the file with: medsync config show")
    )]
    Config { message: String },

    #[error("Local cache error: {message}")]
    #[diagnostic(
        code(medsync::cache),
        help("Check permissions on the cache directory, or point --cache-dir elsewhere.")
    )]
    Storage { message: String },

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(medsync::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Request timed out{detail}")]
    #[diagnostic(
        code(medsync::timeout),
        help("Increase timeout with --timeout or check server responsiveness.")
    )]
    Timeout { detail: String },

    // ── IO ───────────────────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::RealtimeUnavailable { .. } => {
                exit_code::CONNECTION
            }
            Self::AuthFailed { .. } | Self::Keyring { .. } => exit_code::AUTH,
            Self::PermissionDenied { .. } => exit_code::PERMISSION,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Name the profile in authentication errors raised below the CLI.
    pub(crate) fn for_profile(self, name: &str) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                profile: name.to_owned(),
                message,
            },
            other => other,
        }
    }

    pub(crate) fn timeout_after(seconds: u64) -> Self {
        Self::Timeout {
            detail: if seconds == 0 {
                String::new()
            } else {
                format!(" after {seconds}s")
            },
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "default".into(),
                message,
            },

            CoreError::PermissionDenied { message } => CliError::PermissionDenied { message },

            CoreError::Timeout { timeout_secs } => CliError::timeout_after(timeout_secs),

            CoreError::CardNotFound { uid } => CliError::NotFound {
                resource_type: "card".into(),
                identifier: uid,
                list_command: "cards list --all".into(),
            },

            CoreError::PatientNotFound { id } => CliError::NotFound {
                resource_type: "patient".into(),
                identifier: id,
                list_command: "patients list".into(),
            },

            CoreError::PrescriptionNotFound { id } => CliError::NotFound {
                resource_type: "prescription".into(),
                identifier: id,
                list_command: "prescriptions list".into(),
            },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Api {
                message,
                status: Some(409),
            } => CliError::Conflict { message },

            CoreError::Api { message, status } => CliError::ApiError {
                status: status.map_or_else(|| "-".into(), |s| s.to_string()),
                message,
            },

            CoreError::Storage(e) => CliError::Storage {
                message: e.to_string(),
            },

            CoreError::Config { message } => CliError::Config { message },

            CoreError::Internal(message) => CliError::ApiError {
                status: "internal".into(),
                message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { profile } => {
                let cfg = medsync_config::load_config_or_default();
                let mut names: Vec<_> = cfg.profiles.into_keys().collect();
                names.sort();
                CliError::ProfileNotFound {
                    name: profile,
                    available: if names.is_empty() {
                        "(none)".into()
                    } else {
                        names.join(", ")
                    },
                }
            }
            ConfigError::Keyring(message) => CliError::Keyring { message },
            ConfigError::Io(e) => CliError::Io(e),
            other @ (ConfigError::Serialization(_) | ConfigError::Figment(_)) => {
                CliError::Config {
                    message: other.to_string(),
                }
            }
        }
    }
}
