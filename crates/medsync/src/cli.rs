//! Clap derive structures for the `medsync` CLI.
//!
//! Defines the command tree, global flags, and shared output types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// medsync -- RFID card and patient records from the command line
#[derive(Debug, Parser)]
#[command(
    name = "medsync",
    version,
    about = "Manage MedSync RFID cards, patients, and the card reader",
    long_about = "Command-line client for a MedSync server.\n\n\
        Writes made while the server is unreachable are kept in the local\n\
        cache, marked pending sync, and replaced by server data on the next\n\
        successful refresh.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "MEDSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// REST API URL (overrides profile)
    #[arg(long, env = "MEDSYNC_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Realtime channel URL (overrides profile)
    #[arg(long, env = "MEDSYNC_WS_URL", global = true)]
    pub ws_url: Option<String>,

    /// Bearer token (overrides keyring and profile)
    #[arg(long, env = "MEDSYNC_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Local cache directory (overrides profile)
    #[arg(long, env = "MEDSYNC_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "MEDSYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "MEDSYNC_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "MEDSYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage RFID card registrations
    #[command(alias = "card", alias = "c")]
    Cards(CardsArgs),

    /// Manage patient records
    #[command(alias = "pt")]
    Patients(PatientsArgs),

    /// Browse prescriptions
    #[command(alias = "rx")]
    Prescriptions(PrescriptionsArgs),

    /// Show the server's recent scan log
    Scans(ScansArgs),

    /// Control the server's RFID reader
    Reader(ReaderArgs),

    /// Stream scans and reader events until interrupted
    Watch,

    /// Sign in and store the session token
    Login(LoginArgs),

    /// Create an account and store its session token
    Signup(SignupArgs),

    /// Sign out and forget the stored token
    Logout,

    /// Check server health
    Health,

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CARDS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CardsArgs {
    #[command(subcommand)]
    pub command: CardsCommand,
}

#[derive(Debug, Subcommand)]
pub enum CardsCommand {
    /// List registered cards
    #[command(alias = "ls")]
    List {
        /// Include removed cards
        #[arg(long, short = 'a')]
        all: bool,

        /// Only cards linked to this patient
        #[arg(long)]
        patient: Option<String>,
    },

    /// Register a new card
    Register {
        /// Card UID as reported by the reader
        uid: String,

        /// Human-readable label
        label: String,

        /// Link the card to this patient on registration
        #[arg(long)]
        patient: Option<String>,
    },

    /// Change a card's label
    Update {
        /// Card UID
        uid: String,

        /// New label
        #[arg(long, short = 'l')]
        label: String,
    },

    /// Link a card to a patient
    Link {
        /// Card UID
        uid: String,

        /// Patient ID
        patient: String,
    },

    /// Unlink a card from its patient
    Unlink {
        /// Card UID
        uid: String,
    },

    /// Deactivate a card
    #[command(alias = "rm")]
    Remove {
        /// Card UID
        uid: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  PATIENTS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct PatientsArgs {
    #[command(subcommand)]
    pub command: PatientsCommand,
}

#[derive(Debug, Subcommand)]
pub enum PatientsCommand {
    /// List patients
    #[command(alias = "ls")]
    List {
        /// Case-insensitive name filter
        #[arg(long, short = 's')]
        search: Option<String>,
    },

    /// Show one patient with their prescriptions
    #[command(alias = "get")]
    Show {
        /// Patient ID or the UID of their card
        id: String,
    },

    /// Create a patient
    Create(PatientFields),

    /// Update fields of an existing patient
    Update {
        /// Patient ID
        id: String,

        #[command(flatten)]
        fields: PatientFields,
    },
}

/// Patient attributes. Unset fields are left untouched on update.
#[derive(Debug, Args)]
pub struct PatientFields {
    /// Full name
    #[arg(long, short = 'n')]
    pub name: Option<String>,

    /// Date of birth (YYYY-MM-DD)
    #[arg(long)]
    pub dob: Option<String>,

    #[arg(long)]
    pub gender: Option<String>,

    /// Phone number
    #[arg(long)]
    pub contact: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub address: Option<String>,

    /// UID of the patient's RFID card
    #[arg(long)]
    pub card: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  PRESCRIPTIONS / SCANS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct PrescriptionsArgs {
    #[command(subcommand)]
    pub command: PrescriptionsCommand,
}

#[derive(Debug, Subcommand)]
pub enum PrescriptionsCommand {
    /// List prescriptions
    #[command(alias = "ls")]
    List {
        /// Only prescriptions for this patient
        #[arg(long)]
        patient: Option<String>,

        /// Only prescriptions with this status (e.g. active, filled)
        #[arg(long)]
        status: Option<String>,
    },

    /// Issue a prescription (doctor accounts)
    Create {
        /// Patient ID
        #[arg(long)]
        patient: String,

        #[arg(long, short = 'm')]
        medication: String,

        /// e.g. 500mg
        #[arg(long, short = 'd')]
        dosage: String,

        /// e.g. "3x daily"
        #[arg(long, short = 'f')]
        frequency: String,

        /// Expiry date (YYYY-MM-DD)
        #[arg(long)]
        expires: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Mark a prescription verified (pharmacy accounts)
    Verify {
        /// Prescription ID or RX- barcode
        id: String,
    },
}

#[derive(Debug, Args)]
pub struct ScansArgs {
    /// Number of log rows to fetch
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: u32,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  READER
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ReaderArgs {
    #[command(subcommand)]
    pub command: ReaderCommand,
}

#[derive(Debug, Subcommand)]
pub enum ReaderCommand {
    /// Ask the server to open its serial reader
    Start,
    /// Ask the server to close its serial reader
    Stop,
    /// Show the server's reader status
    Status,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  AUTH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Account email (defaults to the profile's email, else prompts)
    #[arg(long, short = 'e')]
    pub email: Option<String>,

    /// Read the password from stdin instead of prompting
    #[arg(long)]
    pub password_stdin: bool,

    /// Print the token to stdout instead of storing it in the keyring
    #[arg(long)]
    pub print_token: bool,
}

#[derive(Debug, Args)]
pub struct SignupArgs {
    /// Account email (defaults to the profile's email, else prompts)
    #[arg(long, short = 'e')]
    pub email: Option<String>,

    /// Display name (prompts when omitted)
    #[arg(long, short = 'n')]
    pub name: Option<String>,

    /// Account role; the server defaults to patient
    #[arg(long, value_enum)]
    pub role: Option<AccountRole>,

    /// Read the password from stdin instead of prompting
    #[arg(long)]
    pub password_stdin: bool,

    /// Print the token to stdout instead of storing it in the keyring
    #[arg(long)]
    pub print_token: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AccountRole {
    Doctor,
    Patient,
    Pharmacy,
}

impl AccountRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Doctor => "doctor",
            Self::Patient => "patient",
            Self::Pharmacy => "pharmacy",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG / COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Display the configuration with secrets masked
    Show,

    /// Create or replace a profile
    ///
    /// Takes the server from --api-url / --ws-url when given, otherwise
    /// prompts for it.
    Init {
        /// Account email used by `login`
        #[arg(long)]
        email: Option<String>,

        /// Make this the default profile
        #[arg(long)]
        set_default: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
