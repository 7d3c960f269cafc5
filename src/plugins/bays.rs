//! Depot bay state: the live, mutable half of the shadow.
//!
//! A [`StateStore`] owns a fixed-length run of [`Slot`]s with ids `1..=N`.
//! Nothing in this module writes history; recording is the caller's job
//! (see [`crate::plugins::shadow::DepotShadow`]).

use crate::core::error::FleetError;
use crate::core::output::{self, OutputFormat};
use crate::plugins::shadow::DepotShadow;
use clap::Subcommand;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlotStatus {
    #[default]
    Empty,
    OccupiedActive,
    OccupiedMaintenance,
    OccupiedCleaning,
    Unavailable,
}

impl SlotStatus {
    pub const ALL: [SlotStatus; 5] = [
        SlotStatus::Empty,
        SlotStatus::OccupiedActive,
        SlotStatus::OccupiedMaintenance,
        SlotStatus::OccupiedCleaning,
        SlotStatus::Unavailable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Empty => "empty",
            SlotStatus::OccupiedActive => "occupied-active",
            SlotStatus::OccupiedMaintenance => "occupied-maintenance",
            SlotStatus::OccupiedCleaning => "occupied-cleaning",
            SlotStatus::Unavailable => "unavailable",
        }
    }

    /// One-letter glyph for grid rendering.
    pub fn glyph(&self) -> char {
        match self {
            SlotStatus::Empty => '.',
            SlotStatus::OccupiedActive => 'A',
            SlotStatus::OccupiedMaintenance => 'M',
            SlotStatus::OccupiedCleaning => 'C',
            SlotStatus::Unavailable => 'X',
        }
    }

    pub fn is_occupied(&self) -> bool {
        matches!(
            self,
            SlotStatus::OccupiedActive
                | SlotStatus::OccupiedMaintenance
                | SlotStatus::OccupiedCleaning
        )
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotStatus {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        SlotStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == needle)
            .ok_or_else(|| {
                FleetError::InvalidArgument(format!(
                    "unknown bay status '{}' (expected one of: {})",
                    s,
                    SlotStatus::ALL.map(|st| st.as_str()).join(", ")
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: u32,
    pub status: SlotStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train_id: Option<String>,
}

impl Slot {
    pub fn empty(id: u32) -> Self {
        Self {
            id,
            status: SlotStatus::Empty,
            train_id: None,
        }
    }
}

/// The aggregate captured by every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreState {
    #[serde(rename = "depotBays")]
    pub bays: Vec<Slot>,
    #[serde(default)]
    pub selected_scenario: String,
}

impl StoreState {
    /// sha-256 over the canonical JSON form; equal states hash equal.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        format!("{:x}", hasher.finalize())
    }

    pub fn count(&self, status: SlotStatus) -> usize {
        self.bays.iter().filter(|s| s.status == status).count()
    }

    /// Ids must be exactly `1..=len` in order.
    pub fn check_ids(&self) -> Result<(), FleetError> {
        if self.bays.is_empty() {
            return Err(FleetError::InvalidArgument("state has no bays".into()));
        }
        for (idx, slot) in self.bays.iter().enumerate() {
            let expected = idx as u32 + 1;
            if slot.id != expected {
                return Err(FleetError::InvalidArgument(format!(
                    "bay at position {} has id {}, expected {}",
                    idx, slot.id, expected
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateStore {
    state: StoreState,
}

impl StateStore {
    /// `slot_count` bays, all empty, no active scenario.
    pub fn initialize(slot_count: u32) -> Result<Self, FleetError> {
        if slot_count == 0 {
            return Err(FleetError::InvalidArgument(
                "slot count must be at least 1".into(),
            ));
        }
        Ok(Self {
            state: StoreState {
                bays: (1..=slot_count).map(Slot::empty).collect(),
                selected_scenario: String::new(),
            },
        })
    }

    pub fn from_state(state: StoreState) -> Result<Self, FleetError> {
        state.check_ids()?;
        Ok(Self { state })
    }

    pub fn state(&self) -> &StoreState {
        &self.state
    }

    /// Independent copy of the current state.
    pub fn snapshot(&self) -> StoreState {
        self.state.clone()
    }

    pub fn len(&self) -> usize {
        self.state.bays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.bays.is_empty()
    }

    pub fn label(&self) -> &str {
        &self.state.selected_scenario
    }

    pub fn set_label(&mut self, label: &str) {
        self.state.selected_scenario = label.to_string();
    }

    fn index_of(&self, id: u32) -> Result<usize, FleetError> {
        if id == 0 || id as usize > self.state.bays.len() {
            return Err(FleetError::NotFound(format!(
                "bay {} (depot has bays 1..={})",
                id,
                self.state.bays.len()
            )));
        }
        Ok(id as usize - 1)
    }

    pub fn get_slot(&self, id: u32) -> Result<&Slot, FleetError> {
        let idx = self.index_of(id)?;
        Ok(&self.state.bays[idx])
    }

    /// Emptying a bay also releases its train.
    pub fn set_slot_status(&mut self, id: u32, status: SlotStatus) -> Result<(), FleetError> {
        let idx = self.index_of(id)?;
        let slot = &mut self.state.bays[idx];
        slot.status = status;
        if status == SlotStatus::Empty {
            slot.train_id = None;
        }
        Ok(())
    }

    pub fn assign_train(&mut self, id: u32, train_id: Option<&str>) -> Result<(), FleetError> {
        let idx = self.index_of(id)?;
        let train_id = train_id.map(str::trim).filter(|t| !t.is_empty());
        self.state.bays[idx].train_id = train_id.map(str::to_string);
        Ok(())
    }

    pub fn reset_all(&mut self, status: SlotStatus) {
        for slot in &mut self.state.bays {
            slot.status = status;
            if status == SlotStatus::Empty {
                slot.train_id = None;
            }
        }
    }

    /// Swap in a whole state. The bay count is fixed for the life of the store.
    pub(crate) fn replace(&mut self, state: StoreState) -> Result<(), FleetError> {
        if state.bays.len() != self.state.bays.len() {
            return Err(FleetError::InvalidArgument(format!(
                "snapshot has {} bays but the depot has {}",
                state.bays.len(),
                self.state.bays.len()
            )));
        }
        state.check_ids()?;
        self.state = state;
        Ok(())
    }
}

#[derive(clap::Args, Debug)]
pub struct BayCli {
    #[clap(subcommand)]
    pub command: BayCommand,
}

#[derive(Subcommand, Debug)]
pub enum BayCommand {
    /// Show every bay as a grid.
    Show,
    /// Show a single bay.
    Get {
        #[clap(long)]
        id: u32,
    },
    /// Set the status of a bay.
    Set {
        #[clap(long)]
        id: u32,
        /// empty | occupied-active | occupied-maintenance | occupied-cleaning | unavailable
        #[clap(long)]
        status: String,
        /// Refuse unless the newest history entry has this sequence number.
        #[clap(long)]
        expect_seq: Option<u64>,
    },
    /// Put a train in a bay, or release it when --train is omitted.
    Assign {
        #[clap(long)]
        id: u32,
        #[clap(long)]
        train: Option<String>,
        #[clap(long)]
        expect_seq: Option<u64>,
    },
    /// Set every bay to one status.
    Reset {
        #[clap(long, default_value = "empty")]
        status: String,
        #[clap(long)]
        expect_seq: Option<u64>,
    },
}

pub fn render_bays(state: &StoreState) -> String {
    let cells: Vec<(u32, char)> = state.bays.iter().map(|s| (s.id, s.status.glyph())).collect();
    output::bay_grid(&cells, 10)
}

fn print_recorded(cmd: &str, shadow: &DepotShadow, format: OutputFormat) -> Result<(), FleetError> {
    let head = shadow
        .log()
        .head()
        .ok_or_else(|| FleetError::NotFound("history head".into()))?;
    if format.is_json() {
        output::print_envelope(
            cmd,
            "ok",
            serde_json::json!({ "seq": head.seq(), "note": head.note(), "state": head.state() }),
        )?;
    } else {
        println!("{} #{} {}", "recorded".bright_green(), head.seq(), head.note());
    }
    Ok(())
}

pub fn run_bay_cli(
    shadow: &mut DepotShadow,
    cli: BayCli,
    format: OutputFormat,
) -> Result<(), FleetError> {
    match cli.command {
        BayCommand::Show => {
            let state = shadow.state();
            if format.is_json() {
                output::print_envelope("bay.show", "ok", serde_json::json!({ "state": state }))?;
            } else {
                if !state.selected_scenario.is_empty() {
                    println!("{} {}", "Scenario:".bright_white(), state.selected_scenario);
                }
                println!("{}", render_bays(state));
                println!(
                    "{}",
                    "legend: . empty  A active  M maintenance  C cleaning  X unavailable".bright_black()
                );
            }
            Ok(())
        }
        BayCommand::Get { id } => {
            let slot = shadow.store().get_slot(id)?;
            if format.is_json() {
                output::print_envelope("bay.get", "ok", serde_json::json!({ "bay": slot }))?;
            } else {
                match &slot.train_id {
                    Some(train) => println!("bay {}: {} ({})", slot.id, slot.status, train),
                    None => println!("bay {}: {}", slot.id, slot.status),
                }
            }
            Ok(())
        }
        BayCommand::Set {
            id,
            status,
            expect_seq,
        } => {
            let status: SlotStatus = status.parse()?;
            shadow.set_bay_status(id, status, expect_seq)?;
            print_recorded("bay.set", shadow, format)
        }
        BayCommand::Assign {
            id,
            train,
            expect_seq,
        } => {
            shadow.assign_train(id, train.as_deref(), expect_seq)?;
            print_recorded("bay.assign", shadow, format)
        }
        BayCommand::Reset { status, expect_seq } => {
            let status: SlotStatus = status.parse()?;
            shadow.reset_all(status, expect_seq)?;
            print_recorded("bay.reset", shadow, format)
        }
    }
}
