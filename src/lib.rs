//! fleet-shadow: a depot digital shadow with a restorable history.
//!
//! The shadow keeps the live state of a depot's stabling bays, applies named
//! scenarios to it, and records a snapshot after every change. The newest
//! snapshots (20 by default) are kept, persisted after each change, and any of
//! them can be restored. A restore is recorded as a new snapshot, so the
//! history reads as an audit trail rather than being rewound.
//!
//! # Architecture
//!
//! - [`plugins::bays`]: the State Store (fixed run of bays, no auditing)
//! - [`plugins::scenario`]: the Scenario Applier (name to deterministic changes)
//! - [`plugins::history`]: the History Log (bounded, newest-first, restorable)
//! - [`plugins::persistence`]: the `PersistencePort` seam and its backends
//! - [`plugins::shadow`]: `DepotShadow`, the only entry point that both
//!   mutates and records
//!
//! Shared plumbing (errors, config, SQLite broker, output) lives in [`core`].
//!
//! # Examples
//!
//! ```bash
//! fleet-shadow init --bays 25
//! fleet-shadow scenario apply maintenance
//! fleet-shadow history list
//! fleet-shadow history restore --seq 1
//! ```

pub mod cli;
pub mod core;
pub mod plugins;

use crate::cli::{Cli, Command, InitCli};
use crate::core::config::Config;
use crate::core::error::FleetError;
use crate::core::output::{self, OutputFormat};
use crate::core::workspace::{self, Workspace};
use crate::plugins::bays::SlotStatus;
use crate::plugins::shadow::DepotShadow;
use crate::plugins::{bays, history, scenario};

use clap::Parser;
use colored::Colorize;

pub fn run() -> Result<(), FleetError> {
    run_with(Cli::parse())
}

pub fn run_with(cli: Cli) -> Result<(), FleetError> {
    let format = cli.format;
    match cli.command {
        Command::Version => {
            println!("v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Init(init) => run_init(init, format),
        Command::Audit { limit } => {
            let ws = current_workspace()?;
            run_audit(&ws, limit, format)
        }
        command => {
            let ws = current_workspace()?;
            let config = ws.load_config()?;
            let mut shadow = DepotShadow::open(&config, ws.persistence(&config))?;
            tracing::debug!(root = %ws.root.display(), storage = %shadow.log().storage(), "depot opened");

            let result = run_depot_command(&ws, &mut shadow, command, format);
            if let Some(err) = shadow.log().last_persist_error() {
                eprintln!(
                    "{} change kept in memory only, history was not saved: {}",
                    "warning:".bright_yellow(),
                    err
                );
            }
            result
        }
    }
}

fn current_workspace() -> Result<Workspace, FleetError> {
    let current_dir = std::env::current_dir()?;
    workspace::find_workspace(&current_dir)
}

fn run_depot_command(
    ws: &Workspace,
    shadow: &mut DepotShadow,
    command: Command,
    format: OutputFormat,
) -> Result<(), FleetError> {
    match command {
        Command::Bay(cli) => bays::run_bay_cli(shadow, cli, format),
        Command::Scenario(cli) => scenario::run_scenario_cli(shadow, cli, format),
        Command::History(cli) => history::run_history_cli(shadow, cli, format),
        Command::Status => run_status(ws, shadow, format),
        Command::Init(_) | Command::Audit { .. } | Command::Version => Err(
            FleetError::InvalidArgument("command does not operate on a depot".into()),
        ),
    }
}

fn run_init(init: InitCli, format: OutputFormat) -> Result<(), FleetError> {
    let target_dir = match init.dir {
        Some(d) => d,
        None => std::env::current_dir()?,
    };
    let target_dir = std::fs::canonicalize(&target_dir).map_err(FleetError::IoError)?;
    let ws = Workspace::new(target_dir);

    let mut config = if ws.exists() {
        ws.load_config()?
    } else {
        Config::default()
    };
    if let Some(bays) = init.bays {
        config.bay_count = bays;
    }
    if let Some(capacity) = init.capacity {
        config.history_capacity = capacity;
    }
    if let Some(backend) = init.backend {
        config.backend = backend;
    }
    if init.strict {
        config.strict_scenarios = true;
    }

    let created = ws.init(&config, init.force)?;
    if format.is_json() {
        return output::print_envelope(
            "init",
            if created { "ok" } else { "exists" },
            serde_json::json!({ "root": ws.root.display().to_string(), "config": config }),
        );
    }
    if created {
        println!(
            "{} {} ({} bays, {} snapshots kept, {:?} backend)",
            "initialized".bright_green(),
            ws.dir().display(),
            config.bay_count,
            config.history_capacity,
            config.backend
        );
    } else {
        println!(
            "{} {} already exists; use --force to rewrite its config",
            "skipped".bright_yellow(),
            ws.dir().display()
        );
    }
    Ok(())
}

fn run_status(ws: &Workspace, shadow: &DepotShadow, format: OutputFormat) -> Result<(), FleetError> {
    let state = shadow.state();
    let log = shadow.log();
    let counts: Vec<(SlotStatus, usize)> = SlotStatus::ALL
        .iter()
        .map(|st| (*st, state.count(*st)))
        .collect();
    let occupied = state.bays.iter().filter(|s| s.status.is_occupied()).count();

    if format.is_json() {
        let counts_json: serde_json::Map<String, serde_json::Value> = counts
            .iter()
            .map(|(st, n)| (st.as_str().to_string(), serde_json::json!(n)))
            .collect();
        return output::print_envelope(
            "status",
            "ok",
            serde_json::json!({
                "root": ws.root.display().to_string(),
                "storage": log.storage(),
                "bays": state.bays.len(),
                "occupied": occupied,
                "counts": counts_json,
                "scenario": state.selected_scenario,
                "head_seq": shadow.version(),
                "history_len": log.len(),
                "history_capacity": log.capacity(),
                "fingerprint": state.fingerprint(),
            }),
        );
    }

    println!("{} {}", "Depot:".bright_white(), ws.root.display());
    println!("{} {}", "Storage:".bright_white(), log.storage());
    println!(
        "{} {} total, {} occupied",
        "Bays:".bright_white(),
        state.bays.len(),
        occupied
    );
    for (st, n) in counts.iter().filter(|(_, n)| *n > 0) {
        println!("  {:<22} {}", st.as_str(), n);
    }
    if !state.selected_scenario.is_empty() {
        println!("{} {}", "Scenario:".bright_white(), state.selected_scenario);
    }
    match log.head() {
        Some(head) => println!(
            "{} {}/{} snapshots, head #{} ({})",
            "History:".bright_white(),
            log.len(),
            log.capacity(),
            head.seq(),
            output::compact_line(head.note(), 48)
        ),
        None => println!(
            "{} empty (capacity {})",
            "History:".bright_white(),
            log.capacity()
        ),
    }
    println!("{} {}", "Fingerprint:".bright_white(), &state.fingerprint()[..16]);
    Ok(())
}

fn run_audit(ws: &Workspace, limit: usize, format: OutputFormat) -> Result<(), FleetError> {
    let broker = crate::core::broker::DbBroker::new(&ws.data_root());
    let events = broker.recent_events(limit)?;
    if format.is_json() {
        return output::print_envelope("audit", "ok", serde_json::json!({ "events": events }));
    }
    if events.is_empty() {
        println!("No brokered operations recorded.");
        return Ok(());
    }
    for ev in events {
        let status = if ev.status == "success" {
            ev.status.bright_green()
        } else {
            ev.status.bright_red()
        };
        println!(
            "{}  {:<16} {:<12} {}",
            crate::core::time::format_ts(ev.ts).bright_black(),
            ev.op,
            ev.db_id,
            status
        );
    }
    Ok(())
}
