//! Server health check.

use medsync_core::{HealthDto, MedSync};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

fn detail(h: &HealthDto) -> String {
    [
        format!("Status:            {}", h.status),
        format!("Server time:       {}", util::or_dash(h.timestamp.as_deref())),
        format!("Realtime clients:  {}", h.websocket_clients),
        format!(
            "Reader:            {}",
            if h.serial_connected {
                "connected"
            } else {
                "disconnected"
            }
        ),
    ]
    .join("\n")
}

pub async fn handle(app: &MedSync, global: &GlobalOpts) -> Result<(), CliError> {
    let health = app.service().health().await?;
    tracing::debug!(status = %health.status, "health check");
    let out = output::render_single(&global.output, &health, detail, |h| h.status.clone());
    output::print_output(&out, global.quiet);
    Ok(())
}
