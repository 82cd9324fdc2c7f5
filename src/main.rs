mod analysis;
mod config;
mod export;
mod manager;
mod selection;
mod slopes;
mod stats;
mod table;
mod trend;
mod types;

use crate::manager::Manager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    work_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rebuild the AMAV tables from the study table.
    Build {
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Choose between linear and exponential growth per phenotype.
    Select {
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Write the yearly trend summary of every phenotype.
    Summarize {
        #[arg(long)]
        input: Option<PathBuf>,
    },

    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.work_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Build { input } => mgr.build_tables(input)?,
        Command::Select { input } => mgr.select_models(input)?,
        Command::Summarize { input } => mgr.summarize(input)?,
        Command::Clean => mgr.clean()?,
    }

    Ok(())
}
