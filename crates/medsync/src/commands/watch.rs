//! Live session view: prints notifications until Ctrl-C.

use tokio::sync::broadcast::error::RecvError;

use medsync_core::{MedSync, Notification};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

fn render(n: &Notification, format: &OutputFormat, color: bool) -> String {
    match format {
        OutputFormat::Table | OutputFormat::Plain => output::notification_line(n, color),
        // One object per line so the stream stays parseable.
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json_compact(n),
        OutputFormat::Yaml => format!("---\n{}", output::render_yaml(n).trim_end()),
    }
}

pub async fn handle(app: &MedSync, global: &GlobalOpts) -> Result<(), CliError> {
    let mut notifications = app.notifications();
    let color = matches!(global.output, OutputFormat::Table) && output::should_color(&global.color);

    if !app.start().await {
        util::warn_offline(
            global,
            "record sets served from cache",
            "server unreachable",
        );
    }
    util::status(
        global,
        &format!("Watching {} (Ctrl-C to stop)", app.config().ws_url),
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            received = notifications.recv() => match received {
                Ok(n) => output::print_output(&render(&n, &global.output, color), global.quiet),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "watch fell behind, notifications dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    tracing::debug!(session = %app.session().summary(), "watch stopped");
    Ok(())
}
