//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Task activity-time tracker.
///
/// Reconstructs how long tasks were actively worked on from their
/// status-change audit logs.
#[derive(Debug, Parser)]
#[command(name = "wl", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import tasks and activity logs from a JSON snapshot.
    Import {
        /// Snapshot file: {"tasks": [...], "logs": {"<task id>": [...]}}.
        file: PathBuf,
    },

    /// Show active time and status history for one task.
    Task {
        /// The task ID.
        id: String,

        /// Evaluate at this time instead of now (ISO 8601 or "2 hours ago").
        #[arg(long)]
        at: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show total active time across tasks created today.
    Today {
        /// Evaluate at this time instead of now (ISO 8601 or "2 hours ago").
        #[arg(long)]
        at: Option<String>,

        /// Re-evaluate every SECONDS until interrupted, reusing fetched logs.
        #[arg(long, value_name = "SECONDS", conflicts_with = "at", value_parser = clap::value_parser!(u64).range(1..))]
        watch: Option<u64>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}
