use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wl_cli::commands::{import, task, today, util};
use wl_cli::{Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(wl_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = wl_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

/// IANA name of the local timezone, for display only.
fn local_timezone_name() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|err| {
        tracing::debug!(%err, "could not determine local timezone name");
        "local".to_string()
    })
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
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut stdout = std::io::stdout().lock();
    let now = Utc::now();

    match &cli.command {
        Some(Commands::Import { file }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            import::run(&mut stdout, &mut db, file)?;
        }
        Some(Commands::Task { id, at, json }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let now = util::evaluation_time(at.as_deref(), now)?;
            task::run(&mut stdout, &db, id, now, &config.replay_config(), *json)?;
        }
        Some(Commands::Today { at, watch, json }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            if let Some(seconds) = watch {
                today::watch(
                    &mut stdout,
                    &db,
                    &Local,
                    &local_timezone_name(),
                    &config.replay_config(),
                    Duration::from_secs(*seconds),
                    *json,
                )?;
            } else {
                let now = util::evaluation_time(at.as_deref(), now)?;
                today::run(
                    &mut stdout,
                    &db,
                    now,
                    &Local,
                    &local_timezone_name(),
                    &config.replay_config(),
                    *json,
                )?;
            }
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            writeln!(stdout)?;
        }
    }

    Ok(())
}
