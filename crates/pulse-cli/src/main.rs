use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pulse_cli::commands::{ingest, init, report, run, status};
use pulse_cli::{Cli, Commands, Config};
use pulse_core::SegmentationConfig;

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(pulse_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = pulse_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    match &cli.command {
        Some(Commands::Init { sample }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            init::run(&mut db, *sample)?;
        }
        Some(Commands::Ingest { file }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            ingest::run(&mut db, file.as_deref())?;
        }
        Some(Commands::Run {
            date,
            behavior,
            active_window,
            retention_base,
            retention_target,
            churn_threshold,
            return_churn,
        }) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            let run_config = SegmentationConfig {
                behavior: behavior.clone().unwrap_or_else(|| config.behavior.clone()),
                observation_date: *date,
                active_window: active_window.unwrap_or(config.active_window),
                retention_base_period: retention_base.unwrap_or(config.retention_base_period),
                retention_target_period: retention_target
                    .unwrap_or(config.retention_target_period),
                churn_threshold: churn_threshold.unwrap_or(config.churn_threshold),
                return_churn_period: return_churn.unwrap_or(config.return_churn_period),
            };
            run::run(&mut db, &run_config)?;
        }
        Some(Commands::Report { date, json }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let mut stdout = std::io::stdout().lock();
            report::run(&mut stdout, &db, *date, *json)?;
        }
        Some(Commands::Status) => {
            let config =
                Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
            let mut stdout = std::io::stdout().lock();
            status::run(&mut stdout, &config)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
