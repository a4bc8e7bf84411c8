//! Patient command handlers.

use std::fmt::Write;
use std::sync::Arc;

use tabled::Tabled;

use medsync_core::{MedSync, PatientDetail, PatientDraft, PatientRecord, Refresh};

use crate::cli::{GlobalOpts, PatientFields, PatientsArgs, PatientsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct PatientRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Born")]
    dob: String,
    #[tabled(rename = "Contact")]
    contact: String,
    #[tabled(rename = "Card")]
    card: String,
    #[tabled(rename = "Sync")]
    sync: String,
}

impl From<&Arc<PatientRecord>> for PatientRow {
    fn from(p: &Arc<PatientRecord>) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            dob: p.date_of_birth.clone().unwrap_or_default(),
            contact: p
                .contact
                .clone()
                .or_else(|| p.email.clone())
                .unwrap_or_default(),
            card: p.rfid_uid.clone().unwrap_or_default(),
            sync: if p.pending_sync { "pending" } else { "" }.into(),
        }
    }
}

fn detail(p: &PatientRecord) -> String {
    [
        format!("ID:        {}", p.id),
        format!("Name:      {}", p.name),
        format!("Born:      {}", util::or_dash(p.date_of_birth.as_deref())),
        format!("Gender:    {}", util::or_dash(p.gender.as_deref())),
        format!("Contact:   {}", util::or_dash(p.contact.as_deref())),
        format!("Email:     {}", util::or_dash(p.email.as_deref())),
        format!("Address:   {}", util::or_dash(p.address.as_deref())),
        format!("Card:      {}", util::or_dash(p.rfid_uid.as_deref())),
        format!("Updated:   {}", util::short_time(&p.updated_at)),
        format!("Pending:   {}", p.pending_sync),
    ]
    .join("\n")
}

fn full_detail(d: &PatientDetail) -> String {
    let mut out = detail(&d.patient);
    if d.prescriptions.is_empty() {
        out.push_str("\nPrescriptions: none");
        return out;
    }
    out.push_str("\nPrescriptions:");
    for rx in &d.prescriptions {
        let _ = write!(
            out,
            "\n  {} {} {}, {} [{}]{}",
            rx.date_issued.format("%Y-%m-%d"),
            rx.medication,
            rx.dosage,
            rx.frequency,
            rx.status,
            rx.barcode
                .as_deref()
                .map(|b| format!(" {b}"))
                .unwrap_or_default(),
        );
    }
    out
}

impl From<PatientFields> for PatientDraft {
    fn from(f: PatientFields) -> Self {
        Self {
            name: f.name,
            date_of_birth: f.dob,
            gender: f.gender,
            contact: f.contact,
            email: f.email,
            address: f.address,
            rfid_uid: f.card,
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    app: &MedSync,
    args: PatientsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let service = app.service();

    match args.command {
        PatientsCommand::List { search } => {
            if let Refresh::Cached { reason, .. } = service.refresh_patients().await {
                util::warn_offline(global, "showing cached patients", &reason);
            }
            let needle = search.map(|s| s.to_lowercase());
            let snap = app.store().patients_snapshot();
            let patients: Vec<Arc<PatientRecord>> = snap
                .iter()
                .filter(|p| {
                    needle
                        .as_deref()
                        .is_none_or(|n| p.name.to_lowercase().contains(n))
                })
                .cloned()
                .collect();
            let out = output::render_list(
                &global.output,
                &patients,
                |p| PatientRow::from(p),
                |p| p.id.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        PatientsCommand::Show { id } => {
            let found = service.patient_detail(&id).await?;
            let out = output::render_single(&global.output, &found, full_detail, |d| {
                d.patient.id.clone()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        PatientsCommand::Create(fields) => {
            let draft = PatientDraft::from(fields);
            let result = service.create_patient(&draft).await?;
            util::report_write(
                global,
                &result,
                &format!("Created patient {}", result.value.id),
            );
            let out = output::render_single(&global.output, &result.value, detail, |p| {
                p.id.clone()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        PatientsCommand::Update { id, fields } => {
            let draft = PatientDraft::from(fields);
            if draft == PatientDraft::default() {
                return Err(CliError::Validation {
                    field: "fields".into(),
                    reason: "nothing to update; pass at least one of --name, --dob, --gender, \
                             --contact, --email, --address, --card"
                        .into(),
                });
            }
            let result = service.update_patient(&id, &draft).await?;
            util::report_write(global, &result, &format!("Updated patient {id}"));
            let out = output::render_single(&global.output, &result.value, detail, |p| {
                p.id.clone()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
