//! Named scenarios: fixed, deterministic bay changes applied by name.
//!
//! Unknown names are tolerated unless the book is strict: the store is left
//! alone but the request still lands in the history, so a stale selector in a
//! caller shows up in the audit trail instead of failing.

use crate::core::config::ScenarioDef;
use crate::core::error::FleetError;
use crate::core::output::{self, OutputFormat};
use crate::plugins::bays::{SlotStatus, StateStore};
use crate::plugins::history::HistoryLog;
use crate::plugins::shadow::DepotShadow;
use clap::Subcommand;
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BayChange {
    pub bay: u32,
    pub status: SlotStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub changes: Vec<BayChange>,
}

impl Scenario {
    pub fn new(name: &str, description: &str, changes: Vec<BayChange>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            changes,
        }
    }

    /// Check every change first so a bad scenario never half-applies.
    pub fn check(&self, store: &StateStore) -> Result<(), FleetError> {
        for change in &self.changes {
            store.get_slot(change.bay)?;
        }
        Ok(())
    }

    pub fn mutate(&self, store: &mut StateStore) -> Result<(), FleetError> {
        self.check(store)?;
        for change in &self.changes {
            store.set_slot_status(change.bay, change.status)?;
        }
        store.set_label(&self.name);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioOutcome {
    /// Changes applied; holds the new head seq.
    Applied { seq: u64 },
    /// Name not in the book; store untouched, request recorded at `seq`.
    Unknown { seq: u64 },
}

impl ScenarioOutcome {
    pub fn seq(&self) -> u64 {
        match self {
            ScenarioOutcome::Applied { seq } | ScenarioOutcome::Unknown { seq } => *seq,
        }
    }
}

pub fn applied_note(name: &str) -> String {
    format!("Scenario applied: {}", name)
}

pub fn unknown_note(name: &str) -> String {
    format!("Unknown scenario requested: {} (no changes)", name)
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioBook {
    scenarios: BTreeMap<String, Scenario>,
    strict: bool,
}

impl ScenarioBook {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The stock depot drills.
    pub fn builtin() -> Self {
        let mut book = Self::empty();
        book.insert(Scenario::new(
            "maintenance",
            "Bay 3 taken for scheduled maintenance",
            vec![BayChange {
                bay: 3,
                status: SlotStatus::OccupiedMaintenance,
            }],
        ));
        book.insert(Scenario::new(
            "cleaning",
            "Bay 5 closed for deep cleaning",
            vec![BayChange {
                bay: 5,
                status: SlotStatus::Unavailable,
            }],
        ));
        book.insert(Scenario::new(
            "telecom",
            "Bay 7 lost to a telecom fault",
            vec![BayChange {
                bay: 7,
                status: SlotStatus::Unavailable,
            }],
        ));
        book
    }

    /// Builtins overlaid with operator definitions; same name replaces.
    pub fn with_definitions(defs: &[ScenarioDef]) -> Self {
        let mut book = Self::builtin();
        for def in defs {
            let changes = def
                .set
                .iter()
                .map(|c| BayChange {
                    bay: c.bay,
                    status: c.status,
                })
                .collect();
            book.insert(Scenario::new(def.name.trim(), &def.description, changes));
        }
        book
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn insert(&mut self, scenario: Scenario) {
        self.scenarios.insert(scenario.name.clone(), scenario);
    }

    pub fn lookup(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scenarios.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.values()
    }

    /// Apply `name` to `store` and record the result in `log`.
    ///
    /// Errors leave both `store` and `log` untouched: `NotFound` when a change
    /// targets a bay the depot lacks, `UnknownScenario` only in strict mode.
    pub fn apply(
        &self,
        name: &str,
        store: &mut StateStore,
        log: &mut HistoryLog,
    ) -> Result<ScenarioOutcome, FleetError> {
        match self.lookup(name) {
            Some(scenario) => {
                scenario.mutate(store)?;
                let seq = log.append(&applied_note(name), store.state()).seq();
                tracing::info!(scenario = name, seq, "scenario applied");
                Ok(ScenarioOutcome::Applied { seq })
            }
            None if self.strict => Err(FleetError::UnknownScenario(name.to_string())),
            None => {
                let seq = log.append(&unknown_note(name), store.state()).seq();
                tracing::warn!(scenario = name, seq, "unknown scenario recorded as no-op");
                Ok(ScenarioOutcome::Unknown { seq })
            }
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct ScenarioCli {
    #[clap(subcommand)]
    pub command: ScenarioCommand,
}

#[derive(Subcommand, Debug)]
pub enum ScenarioCommand {
    /// List known scenarios and the bays they touch.
    List,
    /// Apply a scenario by name and record it.
    Apply {
        name: String,
        /// Reject unknown names instead of recording them as no-ops.
        #[clap(long)]
        strict: bool,
        /// Refuse unless the newest history entry has this sequence number.
        #[clap(long)]
        expect_seq: Option<u64>,
    },
}

pub fn run_scenario_cli(
    shadow: &mut DepotShadow,
    cli: ScenarioCli,
    format: OutputFormat,
) -> Result<(), FleetError> {
    match cli.command {
        ScenarioCommand::List => {
            let scenarios: Vec<&Scenario> = shadow.scenarios().iter().collect();
            if format.is_json() {
                output::print_envelope(
                    "scenario.list",
                    "ok",
                    serde_json::json!({ "strict": shadow.scenarios().is_strict(), "scenarios": scenarios }),
                )?;
            } else {
                for scenario in scenarios {
                    let changes = scenario
                        .changes
                        .iter()
                        .map(|c| format!("bay {} -> {}", c.bay, c.status))
                        .collect::<Vec<_>>()
                        .join(", ");
                    println!("{:<16} {}", scenario.name.bright_cyan(), changes);
                    if !scenario.description.is_empty() {
                        println!("{:<16} {}", "", scenario.description.bright_black());
                    }
                }
            }
            Ok(())
        }
        ScenarioCommand::Apply {
            name,
            strict,
            expect_seq,
        } => {
            if strict {
                shadow.require_known_scenarios();
            }
            let outcome = shadow.apply_scenario(&name, expect_seq)?;
            let status = match outcome {
                ScenarioOutcome::Applied { .. } => "applied",
                ScenarioOutcome::Unknown { .. } => "unknown",
            };
            if format.is_json() {
                output::print_envelope(
                    "scenario.apply",
                    status,
                    serde_json::json!({ "scenario": name, "seq": outcome.seq() }),
                )?;
            } else {
                match outcome {
                    ScenarioOutcome::Applied { seq } => {
                        println!("{} {} (#{})", "applied".bright_green(), name, seq)
                    }
                    ScenarioOutcome::Unknown { seq } => println!(
                        "{} '{}' is not a known scenario; recorded as a no-op (#{})",
                        "warning:".bright_yellow(),
                        name,
                        seq
                    ),
                }
            }
            Ok(())
        }
    }
}
