//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Behavioral segmentation over a user event log.
///
/// Classifies every known user as active, retained, returning, and/or
/// churned as of an observation date, and keeps one snapshot row per user
/// per date.
#[derive(Debug, Parser)]
#[command(name = "pulse", version, about, long_about = None)]
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
    /// Create the database schema, optionally seeding demo events.
    Init {
        /// Seed the demo event set if the event log is empty.
        #[arg(long)]
        sample: bool,
    },

    /// Append events from JSON Lines input.
    Ingest {
        /// Read events from this file instead of stdin.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Run segment classification for one observation date.
    Run {
        /// Observation date (YYYY-MM-DD).
        #[arg(long)]
        date: NaiveDate,

        /// Behavior type that counts as activity.
        #[arg(long)]
        behavior: Option<String>,

        /// Lookback, in days, for the active test.
        #[arg(long)]
        active_window: Option<i64>,

        /// Base period, in days, for the retention test.
        #[arg(long)]
        retention_base: Option<i64>,

        /// Target period, in days, for the retention test.
        #[arg(long)]
        retention_target: Option<i64>,

        /// Days of trailing inactivity that count as churn.
        #[arg(long)]
        churn_threshold: Option<i64>,

        /// Days of inactivity required before a reappearance counts as a
        /// return.
        #[arg(long)]
        return_churn: Option<i64>,
    },

    /// Show persisted segment results for a date.
    Report {
        /// Observation date (YYYY-MM-DD).
        #[arg(long)]
        date: NaiveDate,

        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show database path and event-log summary.
    Status,
}
