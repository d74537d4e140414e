//! Operator command line for the member registry.
//!
//! # Responsibility
//! - Wire config, logging and the core engines for one-shot commands.
//! - Keep output machine-readable (CSV or JSON on stdout).

use clap::{Parser, Subcommand};
use registry_core::{init_from_config, RegistryConfig, RegistryContext, ServiceSlot};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "registry", version, about = "Community member registry tools")]
struct Cli {
    /// TOML config file; defaults apply when omitted.
    #[arg(short, long, env = "REGISTRY_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides `database_path` from the config.
    #[arg(long, env = "REGISTRY_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replace every member with the valid rows of a CSV file.
    Import { file: PathBuf },
    /// Write all members as CSV to a file or stdout.
    Export {
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print collection statistics as JSON.
    Stats,
    /// Resolve a member from a first name and phone number.
    Search { first_name: String, phone: String },
    /// Record attendance for one member and date.
    Attend {
        id: Uuid,
        /// Date key in DD_MM_YYYY form.
        date: String,
        /// Service slot code: 1, 2 or 3.
        slot: String,
    },
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => RegistryConfig::load(path)?,
        None => RegistryConfig::default(),
    };
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    init_from_config(&config.logging)?;

    let context = RegistryContext::open(config)?;

    match cli.command {
        Command::Import { file } => {
            let text = std::fs::read_to_string(&file)?;
            let report = context.reconciliation().import_csv(&text)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Export { out } => {
            let csv = context.reconciliation().export_all()?;
            match out {
                Some(path) => std::fs::write(path, csv)?,
                None => print!("{csv}"),
            }
        }
        Command::Stats => {
            let stats = context.reconciliation().compute_statistics()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Search { first_name, phone } => {
            match context.resolution().search(&first_name, &phone)? {
                Some(member) => println!("{}", serde_json::to_string_pretty(&member)?),
                None => {
                    println!("null");
                    log::info!("event=cli_search module=cli status=ok outcome=not_found");
                }
            }
        }
        Command::Attend { id, date, slot } => {
            let slot = ServiceSlot::parse(slot.trim())
                .ok_or_else(|| format!("invalid service slot `{slot}`; expected 1, 2 or 3"))?;
            let recorded = context.resolution().add_attendance(id, &date, slot)?;
            if !recorded {
                return Err(format!("member not found: {id}").into());
            }
        }
    }

    Ok(())
}
