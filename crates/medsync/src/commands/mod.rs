//! Command dispatch: bridges CLI args -> data service calls -> output formatting.

pub mod auth;
pub mod cards;
pub mod config_cmd;
pub mod health;
pub mod patients;
pub mod prescriptions;
pub mod reader;
pub mod scans;
pub mod util;
pub mod watch;

use medsync_core::MedSync;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a session-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, app: &MedSync, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Cards(args) => cards::handle(app, args, global).await,
        Command::Patients(args) => patients::handle(app, args, global).await,
        Command::Prescriptions(args) => prescriptions::handle(app, args, global).await,
        Command::Scans(args) => scans::handle(app, args, global).await,
        Command::Reader(args) => reader::handle(app, args, global).await,
        Command::Watch => watch::handle(app, global).await,
        Command::Login(args) => auth::login(app, args, global).await,
        Command::Signup(args) => auth::signup(app, args, global).await,
        Command::Logout => auth::logout(app, global).await,
        Command::Health => health::handle(app, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
