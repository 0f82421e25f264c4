// aprledger - append a monthly APR export to the master ledger workbook

mod exit_codes;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use aprledger_ingest::{IngestConfig, IngestError, IngestResult};
use aprledger_io::{ingest_with_options, IngestOptions};
use clap::Parser;
use log::info;

use exit_codes::{ingest_exit_code, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE, EXIT_WRITE};

#[derive(Parser)]
#[command(name = "aprledger")]
#[command(about = "Append a monthly APR report to the master ledger, skipping records it already holds")]
#[command(long_version = long_version())]
#[command(version)]
#[command(after_help = "\
Examples:
  aprledger 'Master APR.xlsm' march.xlsx
  aprledger 'Master APR.xlsm' march.xlsx --dry-run --json
  aprledger master.xlsx march.xlsx --config vendor.toml --output runs/march.json")]
struct Cli {
    /// Master ledger workbook (.xlsx or .xlsm), updated in place
    ledger: PathBuf,

    /// Monthly report workbook
    monthly: PathBuf,

    /// TOML file replacing the built-in APR Bundle schema
    #[arg(long, short = 'c', env = "APRLEDGER_CONFIG")]
    config: Option<PathBuf>,

    /// Print the result as JSON instead of a text summary
    #[arg(long)]
    json: bool,

    /// Also write the JSON result to this file
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Report what would be appended without backing up or saving
    #[arg(long)]
    dry_run: bool,

    /// Print nothing on success
    #[arg(long, short = 'q')]
    quiet: bool,

    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("GIT_COMMIT_HASH"),
        ")",
        "\nengine:  aprledger-ingest ",
        env!("CARGO_PKG_VERSION"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
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

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn ingest(err: IngestError) -> Self {
        let hint = match &err {
            IngestError::LedgerNotFound(_) | IngestError::MonthlyNotFound(_) => {
                Some("both workbooks must exist before a run; check the paths".to_string())
            }
            IngestError::SheetNotFound { .. } => {
                Some("set ledger_sheet (or [monthly] sheet) in a --config file".to_string())
            }
            IngestError::ConfigParse(_) | IngestError::ConfigValidation(_) => {
                Some("see [[columns]] and [[dedupe]] in the config reference".to_string())
            }
            IngestError::Save { .. } => {
                Some("the ledger may be open in Excel; close it and rerun (a backup was taken)".to_string())
            }
            _ => None,
        };
        Self { code: ingest_exit_code(&err), message: err.to_string(), hint }
    }
}

// ============================================================================
// ingest
// ============================================================================

fn run(cli: &Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_deref())?;
    let options = IngestOptions { dry_run: cli.dry_run };

    let result = ingest_with_options(&cli.ledger, &cli.monthly, &config, options).map_err(CliError::ingest)?;
    let json = serde_json::to_string_pretty(&result).map_err(|e| CliError::general(e.to_string()))?;

    if let Some(path) = &cli.output {
        fs::write(path, format!("{}\n", json)).map_err(|e| CliError {
            code: EXIT_WRITE,
            message: format!("cannot write {}: {}", path.display(), e),
            hint: None,
        })?;
        info!("wrote result to {}", path.display());
    }

    if cli.quiet {
        return Ok(());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let written = if cli.json {
        writeln!(out, "{}", json)
    } else {
        write_summary(&mut out, &result)
    };
    written.map_err(|e| CliError::general(e.to_string()))
}

fn load_config(path: Option<&Path>) -> Result<IngestConfig, CliError> {
    let Some(path) = path else {
        return Ok(IngestConfig::default());
    };
    let text = fs::read_to_string(path).map_err(|e| CliError {
        code: EXIT_USAGE,
        message: format!("cannot read config {}: {}", path.display(), e),
        hint: None,
    })?;
    IngestConfig::from_toml(&text).map_err(CliError::ingest)
}

fn write_summary(out: &mut impl Write, result: &IngestResult) -> io::Result<()> {
    let heading = if result.dry_run { "Dry run complete:" } else { "Ingest complete:" };
    writeln!(out, "{}", heading)?;
    writeln!(out, "  sheet: {}", result.sheet)?;
    writeln!(out, "  rows_before: {}", result.rows_before)?;
    writeln!(out, "  rows_added: {}", result.rows_added)?;
    writeln!(out, "  rows_after: {}", result.rows_after)?;
    writeln!(out, "  dedupe_skipped: {}", result.dedupe_skipped)?;
    if result.blank_rows_skipped > 0 {
        writeln!(out, "  blank_rows_skipped: {}", result.blank_rows_skipped)?;
    }
    if result.dates_normalized > 0 {
        writeln!(out, "  dates_normalized: {}", result.dates_normalized)?;
    }
    if result.date_formulas_skipped > 0 {
        writeln!(out, "  date_formulas_skipped: {}", result.date_formulas_skipped)?;
    }
    match &result.master_backup {
        Some(path) => writeln!(out, "  master_backup: {}", path.display())?,
        None => writeln!(out, "  master_backup: (none)")?,
    }
    writeln!(out, "  updated_master: {}", result.updated_master.display())?;

    let resolved: Vec<String> = result
        .resolved_map
        .iter()
        .map(|(field, letter)| format!("{} -> {}", field, letter))
        .collect();
    writeln!(out, "  resolved_map: {}", list_or_none(&resolved))?;
    writeln!(out, "  unmapped_monthly_columns: {}", list_or_none(&result.unmapped_monthly_columns))?;

    if !result.unresolved_targets.is_empty() {
        writeln!(out, "  unresolved_targets:")?;
        for (field, tried) in &result.unresolved_targets {
            writeln!(out, "    {} (tried {})", field, tried.join(", "))?;
        }
    }
    Ok(())
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}
