//! Bounded snapshot history with point-in-time restore.
//!
//! The log is newest-first and holds at most `capacity` entries; appending past
//! capacity evicts the oldest. Every append is followed by a best-effort save
//! through the injected [`PersistencePort`]. A failed save is logged and kept
//! in [`HistoryLog::last_persist_error`], never returned: the in-memory log is
//! authoritative for the session.

use crate::core::config::DEFAULT_HISTORY_CAPACITY;
use crate::core::error::FleetError;
use crate::core::output::{self, OutputFormat};
use crate::core::time;
use crate::plugins::bays::{self, StateStore, StoreState};
use crate::plugins::persistence::{MemoryPersistence, PersistencePort};
use crate::plugins::shadow::DepotShadow;
use clap::Subcommand;
use colored::Colorize;
use serde::Serialize;

/// Immutable record of the depot at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    seq: u64,
    ts: i64,
    note: String,
    state: StoreState,
}

impl HistoryEntry {
    pub(crate) fn from_parts(seq: u64, ts: i64, note: String, state: StoreState) -> Self {
        Self {
            seq,
            ts,
            note,
            state,
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Epoch milliseconds.
    pub fn ts(&self) -> i64 {
        self.ts
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn state(&self) -> &StoreState {
        &self.state
    }
}

/// Largest sequence number kept as-is: the biggest integer a JSON reader
/// using doubles round-trips exactly.
pub const MAX_SEQ: u64 = (1 << 53) - 1;

pub type Clock = Box<dyn FnMut() -> i64>;

pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
    capacity: usize,
    next_seq: u64,
    port: Box<dyn PersistencePort>,
    clock: Clock,
    last_persist_error: Option<String>,
}

impl HistoryLog {
    /// Load from `port`. Missing, unreadable, or corrupt data yields an empty log.
    pub fn load(port: Box<dyn PersistencePort>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut entries = match port.load() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    storage = %port.describe(),
                    error = %e,
                    "history unreadable, starting empty"
                );
                Vec::new()
            }
        };
        entries.truncate(capacity);

        let mut log = Self {
            entries,
            capacity,
            next_seq: 1,
            port,
            clock: Box::new(time::now_epoch_ms),
            last_persist_error: None,
        };
        match log.entries.first().and_then(|e| e.seq.checked_add(1)) {
            Some(next) => log.next_seq = next,
            None if log.entries.is_empty() => {}
            None => log.renumber(),
        }
        tracing::debug!(entries = log.len(), next_seq = log.next_seq, "history loaded");
        log
    }

    /// Compact sequence numbers to `len..=1`, keeping order.
    fn renumber(&mut self) {
        let len = self.entries.len() as u64;
        for (idx, entry) in self.entries.iter_mut().enumerate() {
            entry.seq = len - idx as u64;
        }
        self.next_seq = len + 1;
        tracing::warn!(entries = len, "history sequence numbers exhausted, renumbered");
    }

    /// Empty log over a private in-memory backend.
    pub fn in_memory(capacity: usize) -> Self {
        Self::load(Box::new(MemoryPersistence::new()), capacity)
    }

    pub fn with_default_capacity(port: Box<dyn PersistencePort>) -> Self {
        Self::load(port, DEFAULT_HISTORY_CAPACITY)
    }

    /// Replace the timestamp source.
    pub fn with_clock(mut self, clock: impl FnMut() -> i64 + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn head(&self) -> Option<&HistoryEntry> {
        self.entries.first()
    }

    /// Sequence number the next append will receive.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn last_persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }

    pub fn storage(&self) -> String {
        self.port.describe()
    }

    /// Newest first. The iterator is cheap to clone and restart.
    pub fn list(&self) -> std::slice::Iter<'_, HistoryEntry> {
        self.entries.iter()
    }

    pub fn get(&self, seq: u64) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.seq == seq)
    }

    /// Record a copy of `state`. Never fails; see the module docs on persistence.
    pub fn append(&mut self, note: &str, state: &StoreState) -> &HistoryEntry {
        if self.next_seq > MAX_SEQ {
            self.renumber();
        }
        let entry = HistoryEntry {
            seq: self.next_seq,
            ts: (self.clock)(),
            note: note.to_string(),
            state: state.clone(),
        };
        self.next_seq = self.next_seq.checked_add(1).unwrap_or(u64::MAX);
        self.entries.insert(0, entry);
        while self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop() {
                tracing::debug!(seq = evicted.seq, "history entry evicted");
            }
        }
        tracing::debug!(seq = self.entries[0].seq, note, "history appended");

        if let Err(e) = self.save() {
            tracing::warn!(storage = %self.port.describe(), error = %e, "history not persisted");
            self.last_persist_error = Some(e.to_string());
        } else {
            self.last_persist_error = None;
        }
        &self.entries[0]
    }

    /// Put `store` back to entry `seq` and record the rollback as a new entry.
    pub fn restore(
        &mut self,
        seq: u64,
        store: &mut StateStore,
    ) -> Result<&HistoryEntry, FleetError> {
        let entry = self.get(seq).ok_or_else(|| {
            FleetError::NotFound(format!("history entry #{} (evicted or never recorded)", seq))
        })?;
        let state = entry.state.clone();
        let note = format!("Rollback to {}", time::format_ts(entry.ts));

        store.replace(state)?;
        tracing::info!(seq, "restored snapshot");
        Ok(self.append(&note, store.state()))
    }

    /// Write the whole log through the port.
    pub fn save(&self) -> Result<(), FleetError> {
        self.port.save(&self.entries)
    }
}

#[derive(clap::Args, Debug)]
pub struct HistoryCli {
    #[clap(subcommand)]
    pub command: HistoryCommand,
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    /// List recorded snapshots, newest first.
    List {
        #[clap(long)]
        limit: Option<usize>,
    },
    /// Show one snapshot in full.
    Show {
        #[clap(long)]
        seq: u64,
    },
    /// Roll the depot back to a snapshot. The rollback is itself recorded.
    Restore {
        #[clap(long)]
        seq: u64,
        /// Refuse unless the newest history entry has this sequence number.
        #[clap(long)]
        expect_seq: Option<u64>,
    },
}

fn entry_json(entry: &HistoryEntry) -> serde_json::Value {
    serde_json::json!({
        "seq": entry.seq(),
        "ts": entry.ts(),
        "note": entry.note(),
        "fingerprint": entry.state().fingerprint(),
        "state": entry.state(),
    })
}

pub fn run_history_cli(
    shadow: &mut DepotShadow,
    cli: HistoryCli,
    format: OutputFormat,
) -> Result<(), FleetError> {
    match cli.command {
        HistoryCommand::List { limit } => {
            let log = shadow.log();
            let limit = limit.unwrap_or(log.capacity());
            if format.is_json() {
                let entries: Vec<serde_json::Value> = log.list().take(limit).map(entry_json).collect();
                output::print_envelope(
                    "history.list",
                    "ok",
                    serde_json::json!({ "capacity": log.capacity(), "entries": entries }),
                )?;
            } else if log.is_empty() {
                println!("No history recorded yet.");
            } else {
                for entry in log.list().take(limit) {
                    println!(
                        "{:>5}  {}  {}",
                        format!("#{}", entry.seq()).bright_cyan(),
                        time::format_ts(entry.ts()).bright_black(),
                        output::compact_line(entry.note(), 72)
                    );
                }
            }
            Ok(())
        }
        HistoryCommand::Show { seq } => {
            let entry = shadow
                .log()
                .get(seq)
                .ok_or_else(|| FleetError::NotFound(format!("history entry #{}", seq)))?;
            if format.is_json() {
                output::print_envelope("history.show", "ok", entry_json(entry))?;
            } else {
                println!("{} #{}", "Snapshot".bright_white(), entry.seq());
                println!("Recorded: {}", time::format_ts(entry.ts()));
                println!("Note: {}", entry.note());
                if !entry.state().selected_scenario.is_empty() {
                    println!("Scenario: {}", entry.state().selected_scenario);
                }
                println!("{}", bays::render_bays(entry.state()));
            }
            Ok(())
        }
        HistoryCommand::Restore { seq, expect_seq } => {
            let entry = shadow.restore(seq, expect_seq)?;
            if format.is_json() {
                output::print_envelope("history.restore", "ok", entry_json(entry))?;
            } else {
                println!(
                    "{} #{} -> #{} {}",
                    "restored".bright_green(),
                    seq,
                    entry.seq(),
                    entry.note()
                );
            }
            Ok(())
        }
    }
}
