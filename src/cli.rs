//! CLI struct definitions for the fleet-shadow command-line interface.
//!
//! Top-level clap types live here; each subsystem owns its own subcommand
//! tree next to its implementation.

use crate::core::config::Backend;
use crate::core::output::OutputFormat;
use crate::plugins::{bays, history, scenario};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "fleet-shadow",
    version = env!("CARGO_PKG_VERSION"),
    about = "Depot digital shadow: bay state, named scenarios, and a bounded, restorable snapshot history."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
    /// Output format: 'text' or 'json'.
    #[clap(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Raise log verbosity on stderr (-v debug, -vv trace). RUST_LOG overrides.
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(clap::Args, Debug)]
pub struct InitCli {
    /// Directory to initialize (defaults to current working directory).
    #[clap(short, long)]
    pub dir: Option<PathBuf>,
    /// Number of bays in the depot.
    #[clap(long)]
    pub bays: Option<u32>,
    /// Snapshots kept before the oldest is evicted.
    #[clap(long)]
    pub capacity: Option<usize>,
    /// Storage backend for the history.
    #[clap(long, value_enum)]
    pub backend: Option<Backend>,
    /// Reject unknown scenario names by default.
    #[clap(long)]
    pub strict: bool,
    /// Rewrite the config of an existing workspace. History is kept.
    #[clap(long)]
    pub force: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create `.fleet-shadow/` with a config and empty history
    #[clap(name = "init", visible_alias = "i")]
    Init(InitCli),

    /// Inspect and change individual bays
    #[clap(name = "bay", visible_alias = "b")]
    Bay(bays::BayCli),

    /// List and apply named scenarios
    #[clap(name = "scenario", visible_alias = "s")]
    Scenario(scenario::ScenarioCli),

    /// Browse snapshots and roll back
    #[clap(name = "history", visible_alias = "h")]
    History(history::HistoryCli),

    /// Summarize the depot, history and storage
    #[clap(name = "status")]
    Status,

    /// Show the storage audit log
    #[clap(name = "audit")]
    Audit {
        #[clap(long, default_value = "20")]
        limit: usize,
    },

    /// Show version information
    #[clap(name = "version")]
    Version,
}
