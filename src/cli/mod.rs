//! # Command line
//!
//! `campaign-harness run <campaign|search|all>` drives the workflows for CI
//! pipelines; `ledger` and `search` are ad-hoc helpers. The exit code is
//! non-zero whenever a step failed.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{HarnessError, Result};
use crate::ledger::{FileLedger, IdLedger, SqliteLedger};
use crate::payload::Service;
use crate::search::{SearchQuery, search_entity};
use crate::testing::RunReport;
use crate::workflow::{Session, run_campaign_e2e, run_search_flow};

#[derive(Parser, Debug)]
#[command(name = "campaign-harness", version, about = "API test harness for the campaign platform")]
pub struct Cli {
    /// Env file loaded instead of `./.env`.
    #[arg(long, value_name = "PATH", global = true)]
    pub env_file: Option<PathBuf>,
    /// Text ID ledger; defaults to `LEDGER_PATH`.
    #[arg(long, value_name = "PATH", global = true)]
    pub ledger: Option<PathBuf>,
    /// Use a SQLite ledger at this path instead of the text file.
    #[arg(long, value_name = "PATH", global = true, conflicts_with = "ledger")]
    pub sqlite_ledger: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one or both workflows and print the step report.
    Run(RunArgs),
    /// Read or write the ID ledger.
    Ledger {
        #[command(subcommand)]
        action: LedgerCommand,
    },
    /// Search a household or product by ID and print the result.
    Search { service: Service, id: String },
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    pub workflow: WorkflowTarget,
    /// Campaign name; a unique one is generated otherwise.
    #[arg(long)]
    pub name: Option<String>,
    /// Also write the report as JSON to this path.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum LedgerCommand {
    Get { label: String },
    Put { label: String, id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WorkflowTarget {
    Campaign,
    Search,
    All,
}

impl WorkflowTarget {
    fn includes_campaign(self) -> bool {
        matches!(self, WorkflowTarget::Campaign | WorkflowTarget::All)
    }

    fn includes_search(self) -> bool {
        matches!(self, WorkflowTarget::Search | WorkflowTarget::All)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.env_file {
        Some(path) => Config::from_env_file(path)?,
        None => Config::from_env()?,
    };
    Ok(config)
}

/// Open the ledger selected on the command line. Existing entries are kept;
/// the campaign workflow clears them once it has new IDs.
pub fn open_ledger(cli: &Cli, config: &Config) -> Result<Box<dyn IdLedger>> {
    if let Some(path) = &cli.sqlite_ledger {
        return Ok(Box::new(SqliteLedger::open(path)?));
    }

    let path = cli.ledger.clone().unwrap_or_else(|| config.ledger_path.clone());
    Ok(Box::new(FileLedger::new(path)))
}

/// Dispatch a parsed command line. `Ok(false)` means a step failed.
pub fn execute(cli: Cli) -> Result<bool> {
    let config = load_config(&cli)?;
    match &cli.command {
        Command::Run(args) => {
            let session = Session::connect(config)?;
            let ledger = open_ledger(&cli, &session.config)?;
            let report = run(&session, ledger.as_ref(), args)?;
            Ok(report.all_passed())
        }
        Command::Ledger { action } => {
            let ledger = open_ledger(&cli, &config)?;
            match action {
                LedgerCommand::Get { label } => println!("{}", ledger.lookup(label)?),
                LedgerCommand::Put { label, id } => ledger.record(label, id)?,
            }
            Ok(true)
        }
        Command::Search { service, id } => {
            let query = SearchQuery::for_service(*service, id.as_str(), &config)?;
            let session = Session::connect(config)?;
            let found = search_entity(&session.client, &session.config, &session.payloads, &query)?;
            println!("{}", serde_json::to_string_pretty(&found)?);
            Ok(true)
        }
    }
}

fn run(session: &Session, ledger: &dyn IdLedger, args: &RunArgs) -> Result<RunReport> {
    let mut report = RunReport::new();

    if args.workflow.includes_campaign() {
        match run_campaign_e2e(session, ledger, &mut report, args.name.as_deref()) {
            Ok(output) => info!(campaign = %output.campaign_number, "campaign workflow passed"),
            Err(err) => warn!(error = %err, "campaign workflow stopped"),
        }
    }
    // A search right after a failed campaign would only read stale output.
    if args.workflow.includes_search() && report.all_passed() {
        match run_search_flow(session, ledger, &mut report) {
            Ok(summary) => info!(projects = summary.project_ids.len(), "search workflow passed"),
            Err(err) => warn!(error = %err, "search workflow stopped"),
        }
    }

    match args.format {
        OutputFormat::Text => println!("{}", report.to_text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    if let Some(path) = &args.report {
        write_report(path, &report)?;
    }
    Ok(report)
}

pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| HarnessError::io(parent, err))?;
    }
    let raw = serde_json::to_string_pretty(report)?;
    fs::write(path, raw).map_err(|err| HarnessError::io(path, err))
}
