// cmemo - review and reconcile extracted credit memo fields
// Batches are the JSON output of the extraction step, one per upload.

mod exit_codes;
mod ingest;
mod review;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use creditmemo_config::Settings;
use creditmemo_recon::{FieldPath, MemoSession, PolicyTable, ReconError, StoreError};
use creditmemo_store::SqliteStore;

use exit_codes::{EXIT_ERROR, EXIT_FIELD, EXIT_STORE, EXIT_SUCCESS, EXIT_USAGE, recon_exit_code};

#[derive(Parser)]
#[command(name = "cmemo")]
#[command(about = "Reconcile extracted credit memo fields across source documents")]
#[command(version)]
struct Cli {
    /// Memo database (defaults to the platform data directory)
    #[arg(long, global = true, env = "CMEMO_DB", value_name = "PATH")]
    db: Option<PathBuf>,

    /// Conflict policy table (TOML), overriding settings
    #[arg(long, global = true, value_name = "PATH")]
    policies: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply one or more extraction batches, in order
    #[command(after_help = "\
Examples:
  cmemo ingest teaser.batch.json
  cmemo ingest teaser.batch.json --file teaser.pdf
  cmemo ingest teaser.batch.json agreement.batch.json --json")]
    Ingest {
        /// Extraction batch files (JSON)
        #[arg(required = true)]
        batches: Vec<PathBuf>,

        /// Source documents to keep alongside the first batch
        #[arg(long = "file", value_name = "PATH")]
        files: Vec<PathBuf>,

        /// Print reconcile reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show every field with its provenance
    Show {
        /// Print the full memo state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the current value of one field
    #[command(after_help = "\
Examples:
  cmemo get borrower.name
  cmemo get facilities.0.amount")]
    Get {
        /// Dot-separated field path
        path: String,
    },

    /// List the candidates recorded for a field
    Candidates {
        path: String,

        #[arg(long)]
        json: bool,
    },

    /// List fields with unresolved conflicting candidates
    #[command(after_help = "\
Examples:
  cmemo conflicts
  cmemo conflicts --check    # exit 6 while anything needs review")]
    Conflicts {
        #[arg(long)]
        json: bool,

        /// Exit non-zero when conflicts remain
        #[arg(long)]
        check: bool,
    },

    /// Add or remove a candidate from the field's composed value
    #[command(after_help = "\
Examples:
  cmemo toggle riskAssessment.borrowerRating.proposedBrr 1")]
    Toggle {
        path: String,

        /// Candidate index as listed by `cmemo candidates`
        index: usize,
    },

    /// Mark a field's conflict as reviewed
    Resolve { path: String },

    /// Set a field by hand, bypassing its candidates
    #[command(after_help = "\
Examples:
  cmemo set borrower.name 'Northwind Logistics Ltd'
  cmemo set facilities.0.amount 30000000
  cmemo set borrower.address '{\"city\":\"Leeds\"}'")]
    Set {
        path: String,

        /// Value as JSON; anything that does not parse is taken as text
        value: String,
    },

    /// Forget all state and stored documents
    Clear,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings_path = Settings::config_path();
    let (settings, settings_error) = match Settings::load_or_default(&settings_path) {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };
    init_logging(&settings);
    if let Some(e) = settings_error {
        warn!(path = %settings_path.display(), error = %e, "ignoring settings file, using defaults");
    }

    let result = run(cli, &settings);

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Logs go to stderr so stdout stays parseable. `CMEMO_LOG` wins over settings.
fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_env("CMEMO_LOG")
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli, settings: &Settings) -> Result<(), CliError> {
    let mut session = open_session(&cli, settings)?;

    match cli.command {
        Commands::Ingest { batches, files, json } => ingest::cmd_ingest(&mut session, &batches, &files, json),
        Commands::Show { json } => review::cmd_show(&session, json),
        Commands::Get { path } => review::cmd_get(&session, &parse_path(&path)?),
        Commands::Candidates { path, json } => review::cmd_candidates(&session, &parse_path(&path)?, json),
        Commands::Conflicts { json, check } => review::cmd_conflicts(&session, json, check),
        Commands::Toggle { path, index } => review::cmd_toggle(&mut session, &parse_path(&path)?, index),
        Commands::Resolve { path } => review::cmd_resolve(&mut session, &parse_path(&path)?),
        Commands::Set { path, value } => review::cmd_set(&mut session, &parse_path(&path)?, &value),
        Commands::Clear => {
            session.clear();
            eprintln!("cleared memo state");
            Ok(())
        }
    }
}

fn open_session(cli: &Cli, settings: &Settings) -> Result<MemoSession, CliError> {
    let policies = match &cli.policies {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| CliError::usage(format!("cannot read {}: {}", path.display(), e)))?;
            PolicyTable::from_toml(&raw).map_err(|e| CliError::from(e).with_hint(format!("in {}", path.display())))?
        }
        None => settings
            .policy_table()
            .map_err(|e| CliError::store(e.to_string()).with_hint("check \"policies.path\" in settings.json"))?,
    };

    let db = cli.db.clone().unwrap_or_else(|| settings.store_path());
    let store = SqliteStore::open(&db).map_err(|e| CliError::from(e).with_hint(format!("database: {}", db.display())))?;
    Ok(MemoSession::with_store(policies, Box::new(store)))
}

fn parse_path(raw: &str) -> Result<FieldPath, CliError> {
    FieldPath::parse(raw).map_err(|e| {
        CliError::field(e.to_string()).with_hint("paths are dot-separated, e.g. riskAssessment.borrowerRating.proposedBrr")
    })
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: None,
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, message)
    }

    pub fn field(message: impl Into<String>) -> Self {
        Self::new(EXIT_FIELD, message)
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::new(EXIT_STORE, message)
    }

    /// Exit with `code` without printing anything.
    pub fn silent(code: u8) -> Self {
        Self::new(code, "")
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        Self::new(recon_exit_code(&err), err.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        Self::store(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(EXIT_ERROR, format!("cannot encode output: {}", err))
    }
}
