//! Command-line argument parsing with clap.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Pulse - query-context coordinator for analytics dashboards.
#[derive(Parser, Debug, Clone)]
#[command(name = "pulse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Coordinator configuration file (JSON). Defaults apply when omitted.
    #[arg(short, long, env = "PULSE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Replay a script of dashboard events and print the resulting state.
    Replay(ReplayArgs),

    /// List the configured time range presets.
    Presets(PresetsArgs),

    /// Print the effective configuration.
    Config,
}

/// Arguments for `replay`.
#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// Script file: widgets and an ordered list of events (JSON).
    pub script: PathBuf,

    /// Canned backend responses (JSON). When given, widgets are refreshed
    /// after every event.
    #[arg(long)]
    pub fixtures: Option<PathBuf>,

    /// Pin the clock to this instant (RFC 3339).
    #[arg(long)]
    pub now: Option<DateTime<Utc>>,

    /// Stop at the first rejected event.
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `presets`.
#[derive(Args, Debug, Clone)]
pub struct PresetsArgs {
    /// Resolve presets against this instant (RFC 3339) instead of now.
    #[arg(long)]
    pub now: Option<DateTime<Utc>>,
}
