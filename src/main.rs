use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use tether::cli::args::Cli;
use tether::cli::commands;
use tether::config::{Config, Paths};
use tether::engine::SyncEngine;
use tether::features::sync::{ConnectivityFlag, InProcessScheduler};

fn main() {
    init_logging();

    if let Err(e) = run() {
        eprintln!("{}: {:#}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("TETHER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let engine = open_engine(&cli)?;

    let output = commands::execute(&engine, cli.command, cli.output)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn open_engine(cli: &Cli) -> Result<SyncEngine> {
    // The CLI never executes mutations, so connectivity and scheduling are inert
    let connectivity = Arc::new(ConnectivityFlag::new(false));
    let scheduler = Arc::new(InProcessScheduler::new());

    if cli.db.is_none() && cli.config.is_none() {
        return SyncEngine::open_default(connectivity, scheduler)
            .context("Failed to open the default tether database");
    }

    let config = cli
        .config
        .as_deref()
        .map_or_else(Config::load_default_location, Config::load_from_path);

    let db = match &cli.db {
        Some(path) => path.clone(),
        None => {
            let paths = Paths::new()?;
            paths.ensure_dirs()?;
            paths.database
        },
    };

    SyncEngine::open_at(&db, config, connectivity, scheduler)
        .with_context(|| format!("Failed to open database {}", db.display()))
}
