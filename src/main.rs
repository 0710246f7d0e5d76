//! PhenoTips Worker main executable

pub mod clinvar;
pub mod common;
pub mod err;
pub mod patients;
pub mod ped;
pub mod registry;
pub mod stats;

use clap::{Args, Parser, Subcommand};
use console::{Emoji, Term};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "PhenoTips registry import/export",
    long_about = "This tool exports ClinVar submissions and moves patient records between a PhenoTips registry dump and flat files"
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// ClinVar submission commands.
    Clinvar(Clinvar),
    /// Patient record CSV commands.
    Patients(Patients),
    /// Pedigree (PED) commands.
    Ped(Ped),
    /// Registry statistics.
    Stats(stats::Args),
}

/// Parsing of "clinvar *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Clinvar {
    /// The sub command to run
    #[command(subcommand)]
    command: ClinvarCommands,
}

/// Enum supporting the parsing of "clinvar *" sub commands.
#[derive(Debug, Subcommand)]
enum ClinvarCommands {
    Export(clinvar::Args),
}

/// Parsing of "patients *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Patients {
    /// The sub command to run
    #[command(subcommand)]
    command: PatientsCommands,
}

/// Enum supporting the parsing of "patients *" sub commands.
#[derive(Debug, Subcommand)]
enum PatientsCommands {
    Export(patients::export::Args),
    Import(patients::import::Args),
}

/// Parsing of "ped *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Ped {
    /// The sub command to run
    #[command(subcommand)]
    command: PedCommands,
}

/// Enum supporting the parsing of "ped *" sub commands.
#[derive(Debug, Subcommand)]
enum PedCommands {
    Export(ped::export::Args),
    Import(ped::import::Args),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    // Install collector and go into sub commands.
    let term = Term::stderr();
    tracing::subscriber::with_default(collector, || {
        match &cli.command {
            Commands::Clinvar(clinvar) => match &clinvar.command {
                ClinvarCommands::Export(args) => clinvar::run(&cli.common, args)?,
            },
            Commands::Patients(patients) => match &patients.command {
                PatientsCommands::Export(args) => patients::export::run(&cli.common, args)?,
                PatientsCommands::Import(args) => patients::import::run(&cli.common, args)?,
            },
            Commands::Ped(ped) => match &ped.command {
                PedCommands::Export(args) => ped::export::run(&cli.common, args)?,
                PedCommands::Import(args) => ped::import::run(&cli.common, args)?,
            },
            Commands::Stats(args) => stats::run(&cli.common, args)?,
        }

        Ok::<(), anyhow::Error>(())
    })?;
    term.write_line(&format!("All done. Have a nice day!{}", Emoji(" 😃", "")))?;

    Ok(())
}
