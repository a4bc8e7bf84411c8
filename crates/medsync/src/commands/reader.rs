//! Reader control over the realtime channel.
//!
//! Opens the channel, sends one command, and waits for the server's answer
//! before printing the resulting session state.

use std::time::Duration;

use tokio::sync::mpsc;

use medsync_api::RealtimeEvent;
use medsync_core::{ConnectionState, MedSync, SessionSnapshot};

use crate::cli::{GlobalOpts, ReaderArgs, ReaderCommand};
use crate::error::CliError;
use crate::output;

use super::util;

fn detail(s: &SessionSnapshot) -> String {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    let mut lines = vec![
        format!("Server:     {}", if s.connected { "connected" } else { "disconnected" }),
        format!("Reader:     {}", yes_no(s.serial_connected)),
        format!("Reading:    {}", yes_no(s.reader_active)),
        format!("Port:       {}", util::or_dash(s.serial_port.as_deref())),
    ];
    if let Some(ref scan) = s.last_scan {
        lines.push(format!(
            "Last scan:  {} ({}) at {}",
            scan.display_label(),
            scan.event.card_uid,
            util::short_time(&scan.event.observed_at)
        ));
    }
    lines.join("\n")
}

/// Open the realtime channel and wait until it is up.
pub(crate) async fn connect(app: &MedSync, wait: Duration) -> Result<(), CliError> {
    let mut state = app.connection_state();
    app.transport().connect();
    let up = tokio::time::timeout(wait, state.wait_for(|s| *s == ConnectionState::Connected))
        .await
        .is_ok_and(|r| r.is_ok());
    if up {
        Ok(())
    } else {
        Err(CliError::RealtimeUnavailable {
            url: app.config().ws_url.to_string(),
        })
    }
}

pub async fn handle(app: &MedSync, args: ReaderArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let wait = app.config().timeout;

    // Registered after the session bridge, so the snapshot is already
    // updated by the time a reply arrives here.
    let (tx, mut replies) = mpsc::unbounded_channel();
    let _subscription = app.router().subscribe(move |event| {
        let reply = match event {
            RealtimeEvent::ReaderStatusChanged(_) | RealtimeEvent::StatusSnapshot(_) => Ok(()),
            RealtimeEvent::ServerError(e) => Err(e.message.clone()),
            _ => return,
        };
        let _ = tx.send(reply);
    });

    connect(app, wait).await?;

    let transport = app.transport();
    let sent = match args.command {
        ReaderCommand::Start => transport.start_reader(),
        ReaderCommand::Stop => transport.stop_reader(),
        ReaderCommand::Status => transport.request_status(),
    };
    if !sent {
        return Err(CliError::RealtimeUnavailable {
            url: transport.url().to_string(),
        });
    }

    match tokio::time::timeout(wait, replies.recv()).await {
        Ok(Some(Ok(()))) => {}
        Ok(Some(Err(message))) => return Err(CliError::Reader { message }),
        Ok(None) => {
            return Err(CliError::RealtimeUnavailable {
                url: transport.url().to_string(),
            });
        }
        Err(_) => return Err(CliError::timeout_after(wait.as_secs())),
    }

    let snap = app.session();
    let out = output::render_single(&global.output, &snap, detail, SessionSnapshot::summary);
    output::print_output(&out, global.quiet);
    Ok(())
}
