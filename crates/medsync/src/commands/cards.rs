//! Card command handlers.

use std::sync::Arc;

use tabled::Tabled;

use medsync_core::{CardRecord, MedSync, Refresh, Synced};

use crate::cli::{CardsArgs, CardsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct CardRow {
    #[tabled(rename = "UID")]
    uid: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Patient")]
    patient: String,
    #[tabled(rename = "Active")]
    active: String,
    #[tabled(rename = "Last Scan")]
    last_scan: String,
    #[tabled(rename = "Sync")]
    sync: String,
}

impl From<&Arc<CardRecord>> for CardRow {
    fn from(c: &Arc<CardRecord>) -> Self {
        Self {
            uid: c.uid.clone(),
            label: c.label.clone(),
            patient: c
                .patient_name
                .clone()
                .or_else(|| c.linked_patient_id.clone())
                .unwrap_or_default(),
            active: if c.is_active { "yes" } else { "no" }.into(),
            last_scan: c
                .last_scanned_at
                .as_ref()
                .map(util::short_time)
                .unwrap_or_default(),
            sync: if c.pending_sync { "pending" } else { "" }.into(),
        }
    }
}

fn detail(c: &CardRecord) -> String {
    [
        format!("UID:         {}", c.uid),
        format!("Label:       {}", c.label),
        format!(
            "Patient:     {}",
            match (&c.patient_name, &c.linked_patient_id) {
                (Some(name), Some(id)) => format!("{name} ({id})"),
                (None, Some(id)) => id.clone(),
                _ => "-".into(),
            }
        ),
        format!("Active:      {}", c.is_active),
        format!("Registered:  {}", util::short_time(&c.registered_at)),
        format!(
            "Last scan:   {}",
            c.last_scanned_at
                .as_ref()
                .map_or_else(|| "-".into(), util::short_time)
        ),
        format!("Pending:     {}", c.pending_sync),
    ]
    .join("\n")
}

fn print_card(global: &GlobalOpts, result: &Synced<CardRecord>, done: &str) {
    util::report_write(global, result, done);
    let out = output::render_single(&global.output, &result.value, detail, |c| c.uid.clone());
    output::print_output(&out, global.quiet);
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(app: &MedSync, args: CardsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let service = app.service();

    match args.command {
        CardsCommand::List { all, patient } => {
            if let Refresh::Cached { reason, .. } = service.refresh_cards().await {
                util::warn_offline(global, "showing cached cards", &reason);
            }
            let snap = app.store().cards_snapshot();
            let cards: Vec<Arc<CardRecord>> = snap
                .iter()
                .filter(|c| all || c.is_active)
                .filter(|c| {
                    patient
                        .as_deref()
                        .is_none_or(|p| c.linked_patient_id.as_deref() == Some(p))
                })
                .cloned()
                .collect();
            let out = output::render_list(
                &global.output,
                &cards,
                |c| CardRow::from(c),
                |c| c.uid.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CardsCommand::Register {
            uid,
            label,
            patient,
        } => {
            let result = service
                .register_card(&uid, &label, patient.as_deref())
                .await?;
            print_card(global, &result, &format!("Registered card {}", result.value.uid));
            Ok(())
        }

        CardsCommand::Update { uid, label } => {
            let result = service.update_card(&uid, &label).await?;
            print_card(global, &result, &format!("Updated card {uid}"));
            Ok(())
        }

        CardsCommand::Link { uid, patient } => {
            let result = service.link_card(&uid, &patient).await?;
            print_card(global, &result, &format!("Linked card {uid} to {patient}"));
            Ok(())
        }

        CardsCommand::Unlink { uid } => {
            let result = service.unlink_card(&uid).await?;
            print_card(global, &result, &format!("Unlinked card {uid}"));
            Ok(())
        }

        CardsCommand::Remove { uid } => {
            if !util::confirm(&format!("Deactivate card {uid}?"), global.yes)? {
                return Ok(());
            }
            let result = service.remove_card(&uid).await?;
            util::report_write(global, &result, &format!("Deactivated card {uid}"));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn row_prefers_patient_name_and_flags_pending() {
        let card = Arc::new(CardRecord {
            linked_patient_id: Some("p-1".into()),
            patient_name: Some("Ada Lovelace".into()),
            ..CardRecord::new_local("04A1", "Ward key")
        });
        let row = CardRow::from(&card);
        assert_eq!(row.patient, "Ada Lovelace");
        assert_eq!(row.sync, "pending");
        assert_eq!(row.active, "yes");
    }

    #[test]
    fn detail_shows_linked_id_without_name() {
        let card = CardRecord {
            linked_patient_id: Some("p-7".into()),
            pending_sync: false,
            last_scanned_at: Some(Utc::now()),
            ..CardRecord::new_local("04B2", "Spare")
        };
        let text = detail(&card);
        assert!(text.contains("Patient:     p-7"));
        assert!(text.contains("Pending:     false"));
    }
}
