//! The `lotledger` command.
//!
//! Loads a transaction handoff file, allocates every security to tax lots
//! and prints one of the reports below. Each report lives in its own module
//! and writes to any [`Write`] so it can be tested without a terminal.
//!
//! # Usage
//!
//! ```bash
//! lotledger transactions.json lots
//! lotledger transactions.json tree --security VTI
//! lotledger transactions.json balances --format json
//! lotledger transactions.json check --tolerance 0.01
//! ```
//!
//! # Exit codes
//!
//! - `0` - success
//! - `1` - a security failed to allocate, or `check` reported findings
//! - `2` - usage or I/O error

pub mod balances;
pub mod check;
pub mod lots;
pub mod tree;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use lotledger_booking::{allocate_all, AllocatorOptions, BatchOutcome};
use lotledger_core::{group_by_security, Ident, Security};
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::input;

/// Output format for reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output (default)
    #[default]
    Text,
    /// JSON output for tooling integration
    Json,
}

/// Reconstruct tax lots from investment transactions.
#[derive(Parser, Debug)]
#[command(name = "lotledger")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The JSON transaction file to process
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// The report to generate
    #[command(subcommand)]
    pub report: Report,

    /// Only process this security
    #[arg(short, long, global = true)]
    pub security: Option<String>,

    /// Share rounding tolerance (overrides the file's options)
    #[arg(short, long, global = true, value_name = "SHARES")]
    pub tolerance: Option<Decimal>,

    /// Skip the running balance check after every step
    #[arg(long, global = true)]
    pub no_verify_balances: bool,

    /// Output format (text or json)
    #[arg(long, short = 'f', value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available reports.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    /// List every lot, open and closed, in lot-list order
    Lots,
    /// Show lot genealogy, roots first
    Tree,
    /// Show the running open-share balance per account
    Balances,
    /// Audit the allocated lots; exits with 1 when findings exist
    Check,
}

/// Per-security entry of a JSON report.
#[derive(Debug, Serialize)]
pub struct JsonEntry<T: Serialize> {
    /// Security id.
    pub security: Ident,
    /// Report body, absent when allocation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<T>,
    /// Allocation error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Non-fatal allocation warnings.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Main entry point for the `lotledger` command.
pub fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Log to stderr, filtered by `RUST_LOG` or the verbosity flag.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Options from the file, overridden by command-line flags.
pub fn resolve_options(file: Option<AllocatorOptions>, args: &Args) -> AllocatorOptions {
    let mut options = file.unwrap_or_default();
    if let Some(tolerance) = args.tolerance {
        options.tolerance = tolerance;
    }
    if args.no_verify_balances {
        options.verify_balances = false;
    }
    options
}

/// Group transactions into securities, keeping only `filter` when given.
pub fn select_securities(
    transactions: Vec<lotledger_core::InvestmentTransaction>,
    filter: Option<&str>,
) -> Result<Vec<Security>> {
    let mut securities = group_by_security(transactions);
    if let Some(filter) = filter {
        securities.retain(|security| security.id == filter);
        if securities.is_empty() {
            anyhow::bail!("no transactions for security {filter}");
        }
    }
    Ok(securities)
}

fn run(args: &Args) -> Result<ExitCode> {
    let input = input::load(&args.file)?;
    let options = resolve_options(input.options, args);
    let securities = select_securities(input.transactions, args.security.as_deref())?;
    tracing::debug!(
        securities = securities.len(),
        tolerance = %options.tolerance,
        "loaded {}",
        args.file.display()
    );

    let batch = allocate_all(&securities, &options);
    for (security, err) in batch.failures() {
        eprintln!("error: {security}: {err}");
    }

    let mut stdout = io::stdout().lock();
    let clean = match args.report {
        Report::Lots => lots::report(&batch, args.format, &mut stdout)?,
        Report::Tree => tree::report(&batch, args.format, &mut stdout)?,
        Report::Balances => balances::report(&securities, &batch, args.format, &mut stdout)?,
        Report::Check => {
            check::report(&securities, &batch, options.tolerance, args.format, &mut stdout)?
        }
    };
    stdout.flush()?;

    Ok(if batch.is_success() && clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Build one JSON entry per security of `batch`.
pub fn json_entries<'a, T: Serialize>(
    batch: &'a BatchOutcome,
    mut body: impl FnMut(&'a Ident, &'a lotledger_booking::AllocationOutcome) -> T,
) -> Vec<JsonEntry<T>> {
    batch
        .results
        .iter()
        .map(|(security, result)| match result {
            Ok(outcome) => JsonEntry {
                security: security.clone(),
                report: Some(body(security, outcome)),
                error: None,
                warnings: outcome.warnings.iter().map(ToString::to_string).collect(),
            },
            Err(err) => JsonEntry {
                security: security.clone(),
                report: None,
                error: Some(err.to_string()),
                warnings: Vec::new(),
            },
        })
        .collect()
}

/// Write `value` as pretty JSON followed by a newline.
pub fn write_json<W: Write, T: Serialize>(value: &T, writer: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writeln!(writer)?;
    Ok(())
}

/// Write a security heading for text reports.
pub fn write_heading<W: Write>(security: &Ident, writer: &mut W) -> Result<()> {
    writeln!(writer, "{security}")?;
    writeln!(writer, "{}", "=".repeat(60))?;
    Ok(())
}
