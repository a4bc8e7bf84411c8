//! Prescription command handlers.

use std::sync::Arc;

use tabled::Tabled;

use medsync_core::{
    IssuedPrescription, MedSync, PrescriptionDraft, PrescriptionRecord, Refresh,
    VerifiedPrescription,
};

use crate::cli::{GlobalOpts, PrescriptionsArgs, PrescriptionsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct PrescriptionRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Patient")]
    patient: String,
    #[tabled(rename = "Medication")]
    medication: String,
    #[tabled(rename = "Dosage")]
    dosage: String,
    #[tabled(rename = "Frequency")]
    frequency: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Issued")]
    issued: String,
    #[tabled(rename = "Expires")]
    expires: String,
}

impl PrescriptionRow {
    fn new(rx: &PrescriptionRecord, patient: String) -> Self {
        Self {
            id: rx.id.clone(),
            patient,
            medication: rx.medication.clone(),
            dosage: rx.dosage.clone(),
            frequency: rx.frequency.clone(),
            status: rx.status.clone(),
            issued: rx.date_issued.format("%Y-%m-%d").to_string(),
            expires: rx
                .date_expires
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        }
    }
}

fn issued_detail(rx: &IssuedPrescription) -> String {
    format!(
        "ID:       {}\nBarcode:  {}",
        rx.id,
        util::or_dash(rx.barcode.as_deref())
    )
}

fn verified_detail(v: &VerifiedPrescription) -> String {
    let rx = &v.prescription;
    [
        format!("ID:          {}", rx.id),
        format!("Barcode:     {}", util::or_dash(rx.barcode.as_deref())),
        format!("Patient:     {}", v.patient_name),
        format!("Prescriber:  {}", v.doctor_name),
        format!("Medication:  {} {}, {}", rx.medication, rx.dosage, rx.frequency),
        format!("Status:      {}", rx.status),
        format!(
            "Expires:     {}",
            rx.date_expires
                .map_or_else(|| "-".into(), |d| d.format("%Y-%m-%d").to_string())
        ),
        format!("Notes:       {}", util::or_dash(rx.notes.as_deref())),
    ]
    .join("\n")
}

pub async fn handle(
    app: &MedSync,
    args: PrescriptionsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        PrescriptionsCommand::List { patient, status } => {
            if let Refresh::Cached { reason, .. } = app.service().refresh_prescriptions().await {
                util::warn_offline(global, "showing cached prescriptions", &reason);
            }
            let snap = app.store().prescriptions_snapshot();
            let rows: Vec<Arc<PrescriptionRecord>> = snap
                .iter()
                .filter(|rx| patient.as_deref().is_none_or(|p| rx.patient_id == p))
                .filter(|rx| {
                    status
                        .as_deref()
                        .is_none_or(|s| rx.status.eq_ignore_ascii_case(s))
                })
                .cloned()
                .collect();

            let store = app.store();
            let out = output::render_list(
                &global.output,
                &rows,
                |rx| {
                    let name = store
                        .patient(&rx.patient_id)
                        .map_or_else(|| rx.patient_id.clone(), |p| p.name.clone());
                    PrescriptionRow::new(rx, name)
                },
                |rx| rx.id.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        PrescriptionsCommand::Create {
            patient,
            medication,
            dosage,
            frequency,
            expires,
            notes,
        } => {
            let draft = PrescriptionDraft {
                patient_id: patient,
                medication,
                dosage,
                frequency,
                date_expires: expires,
                notes,
            };
            let issued = app.service().create_prescription(&draft).await?;
            util::status(global, &format!("Issued prescription {}", issued.id));
            // Plain output is the barcode the pharmacy scans.
            let out = output::render_single(&global.output, &issued, issued_detail, |rx| {
                rx.barcode.clone().unwrap_or_else(|| rx.id.clone())
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        PrescriptionsCommand::Verify { id } => {
            let verified = app.service().verify_prescription(&id).await?;
            util::status(
                global,
                &format!("Verified prescription {}", verified.prescription.id),
            );
            let out = output::render_single(&global.output, &verified, verified_detail, |v| {
                v.prescription.id.clone()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
