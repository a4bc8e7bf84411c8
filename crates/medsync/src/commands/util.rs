//! Shared helpers for command handlers.

use std::io::IsTerminal;

use owo_colors::OwoColorize;

use medsync_core::{DataSource, Synced};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Print a status line to stderr unless `--quiet`.
pub fn status(global: &GlobalOpts, message: &str) {
    if !global.quiet {
        eprintln!("{message}");
    }
}

/// Warn on stderr that the server was unreachable and local data was used.
pub fn warn_offline(global: &GlobalOpts, message: &str, reason: &str) {
    if global.quiet {
        return;
    }
    let line = format!("offline: {message} ({reason})");
    if output::should_color(&global.color) {
        eprintln!("{}", line.yellow());
    } else {
        eprintln!("{line}");
    }
}

/// Report where a write landed.
pub fn report_write<T>(global: &GlobalOpts, result: &Synced<T>, done: &str) {
    match &result.source {
        DataSource::Remote => status(global, done),
        DataSource::Local { reason } => warn_offline(
            global,
            &format!("{done}; saved locally and marked pending sync"),
            reason,
        ),
    }
}

/// `-` for missing optional values in detail views.
pub fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

/// Short local timestamp for table cells.
pub fn short_time(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}
