mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::capping::{IssuersArgs, ProformaArgs, SnapshotArgs, StatusArgs};
use commands::regions::RegionsArgs;

/// Issuer-capped weights for Nordic benchmark indices
#[derive(Parser)]
#[command(
    name = "idxcap",
    version,
    about = "Issuer-capped weights for Nordic benchmark indices",
    long_about = "Computes issuer-capped constituent weights for Copenhagen, Helsinki and \
                  Stockholm capped indices with decimal precision. Supports daily 4.5%/7%/40% \
                  capping, quarterly exception capping, issuer snapshots and rebalance \
                  proformas with trade sizes and days to cover."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Constituent status table (daily capping unless --quarterly)
    Status(StatusArgs),
    /// Issuer-level status table
    Issuers(IssuersArgs),
    /// Quarterly rebalance proforma
    Proforma(ProformaArgs),
    /// Compute every table for a snapshot and write them to a directory
    Run(SnapshotArgs),
    /// Show region profiles and capping parameters
    Regions(RegionsArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Status(args) => commands::capping::run_status(args),
        Commands::Issuers(args) => commands::capping::run_issuers(args),
        Commands::Proforma(args) => commands::capping::run_proforma(args),
        Commands::Run(args) => commands::capping::run_snapshot_tables(args),
        Commands::Regions(args) => commands::regions::run_regions(args),
        Commands::Version => {
            println!("idxcap {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
