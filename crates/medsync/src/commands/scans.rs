//! Scan log handler. The log lives only on the server.

use tabled::Tabled;

use medsync_core::{MedSync, ScanLogEntry};

use crate::cli::{GlobalOpts, ScansArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct ScanRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Scanned")]
    scanned: String,
    #[tabled(rename = "UID")]
    uid: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Patient")]
    patient: String,
    #[tabled(rename = "Action")]
    action: String,
}

impl From<&ScanLogEntry> for ScanRow {
    fn from(s: &ScanLogEntry) -> Self {
        Self {
            id: s.id,
            scanned: util::short_time(&s.scanned_at),
            uid: s.rfid_uid.clone(),
            label: s.label.clone().unwrap_or_default(),
            patient: s.patient_name.clone().unwrap_or_default(),
            action: s.action.clone().unwrap_or_default(),
        }
    }
}

pub async fn handle(app: &MedSync, args: ScansArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if args.limit == 0 {
        return Err(CliError::Validation {
            field: "limit".into(),
            reason: "must be at least 1".into(),
        });
    }
    let logs = app.service().scan_logs(args.limit).await?;
    let out = output::render_list(&global.output, &logs, |s| ScanRow::from(s), |s| s.id.to_string());
    output::print_output(&out, global.quiet);
    Ok(())
}
