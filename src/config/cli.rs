use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "meal-count-bot")]
#[command(about = "Daily lunch headcount from team calendars, mailed to the canteen")]
#[command(version)]
pub struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, default_value = "meal-count.toml")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve one day and mail the count
    Run {
        /// Target date (YYYY-MM-DD), defaults to today in the configured timezone
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Print the result without sending email
        #[arg(long)]
        dry_run: bool,
    },
    /// Run every weekday at the configured time until interrupted
    Schedule,
    /// Replay Monday to Friday of a week without sending anything
    Week {
        /// Any date inside the week, defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Only print per-day counts
        #[arg(long)]
        summary: bool,
    },
    /// Manage manual meal counts
    Override {
        #[command(subcommand)]
        action: OverrideCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum OverrideCommand {
    /// Create or replace the count for a date
    Set { date: NaiveDate, count: u32 },
    Get { date: NaiveDate },
    /// Change an existing count
    Update { date: NaiveDate, count: u32 },
    Delete { date: NaiveDate },
    DeleteMany {
        #[arg(required = true, num_args = 1..)]
        dates: Vec<NaiveDate>,
    },
    List,
}
