//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::model::RunMode;
use crate::storage::CreateMode;

/// Output format for commands.
#[derive(ValueEnum, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table (default)
    #[default]
    Table,
    /// JSON (same as --json)
    Json,
}

pub mod commands;

/// fplsync - Fantasy Premier League data synchronizer
#[derive(Parser, Debug)]
#[command(name = "fplsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.fplsync/data/fplsync.db)
    #[arg(long, global = true, env = "FPL_DB")]
    pub db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Output format (table, json)
    #[arg(long, value_enum, global = true, default_value_t)]
    pub format: OutputFormat,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and every synchronized table
    Init {
        /// Drop and recreate existing tables
        #[arg(long)]
        force: bool,
    },

    /// Fetch from the FPL API and synchronize tables
    Run(RunArgs),

    /// Show table sizes and recent runs
    Status {
        /// Number of recent runs to show
        #[arg(short, long, default_value_t = 5)]
        limit: u32,
    },

    /// Describe the synchronized tables
    Tables,

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for `run`.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Which kinds take part: every kind, or reference kinds only
    #[arg(long, value_enum, default_value_t)]
    pub mode: ModeArg,

    /// Restrict to these kinds (comma separated); default is all
    #[arg(long, value_delimiter = ',')]
    pub kinds: Vec<String>,

    /// Table provisioning before reconciling
    #[arg(long = "create", value_enum, default_value_t)]
    pub create_mode: CreateArg,

    /// Use a single transaction for the whole run
    #[arg(long)]
    pub atomic: bool,

    /// Fail and roll back a table if any row fails
    #[arg(long)]
    pub strict: bool,

    /// Reconcile everything, then roll back
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModeArg {
    /// All designated kinds
    #[default]
    Full,
    /// Positions, teams, gameweeks and players only
    Key,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Full => Self::Full,
            ModeArg::Key => Self::KeyEntitiesOnly,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CreateArg {
    /// Create missing tables
    #[default]
    Auto,
    /// Drop and recreate designated tables
    Force,
    /// Require existing tables
    Skip,
}

impl From<CreateArg> for CreateMode {
    fn from(mode: CreateArg) -> Self {
        match mode {
            CreateArg::Auto => Self::Auto,
            CreateArg::Force => Self::Force,
            CreateArg::Skip => Self::Skip,
        }
    }
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}
