//! Depot digital shadow: the one place that both mutates bays and records it.
//!
//! The store is only reachable mutably from here, and every mutating call
//! records: bay edits go through [`DepotShadow::apply_and_record`], scenarios
//! through [`ScenarioBook::apply`] and rollbacks through
//! [`HistoryLog::restore`], each of which appends on success and leaves store
//! and log untouched on error. Each call may carry an expected head sequence
//! number; a mismatch means someone else recorded in between and the call is
//! refused.

use crate::core::config::Config;
use crate::core::error::FleetError;
use crate::plugins::bays::{SlotStatus, StateStore, StoreState};
use crate::plugins::history::{HistoryEntry, HistoryLog};
use crate::plugins::persistence::PersistencePort;
use crate::plugins::scenario::{ScenarioBook, ScenarioOutcome};

pub struct DepotShadow {
    store: StateStore,
    log: HistoryLog,
    scenarios: ScenarioBook,
}

impl DepotShadow {
    /// Fresh session: every bay empty, history as loaded.
    pub fn new(bay_count: u32, log: HistoryLog, scenarios: ScenarioBook) -> Result<Self, FleetError> {
        Ok(Self {
            store: StateStore::initialize(bay_count)?,
            log,
            scenarios,
        })
    }

    /// Continue from the newest snapshot when it fits `bay_count`, else start fresh.
    pub fn resume(bay_count: u32, log: HistoryLog, scenarios: ScenarioBook) -> Result<Self, FleetError> {
        let resumed = log
            .head()
            .filter(|head| head.state().bays.len() == bay_count as usize)
            .map(|head| StateStore::from_state(head.state().clone()))
            .transpose()?;
        match resumed {
            Some(store) => Ok(Self {
                store,
                log,
                scenarios,
            }),
            None => {
                if log.head().is_some() {
                    tracing::warn!(
                        bay_count,
                        "newest snapshot does not match the configured bay count, starting fresh"
                    );
                }
                Self::new(bay_count, log, scenarios)
            }
        }
    }

    /// Wire up a shadow from config and a storage backend.
    pub fn open(config: &Config, port: Box<dyn PersistencePort>) -> Result<Self, FleetError> {
        config.validate()?;
        let log = HistoryLog::load(port, config.history_capacity);
        let scenarios =
            ScenarioBook::with_definitions(&config.scenarios).strict(config.strict_scenarios);
        if config.resume {
            Self::resume(config.bay_count, log, scenarios)
        } else {
            Self::new(config.bay_count, log, scenarios)
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn state(&self) -> &StoreState {
        self.store.state()
    }

    pub fn log(&self) -> &HistoryLog {
        &self.log
    }

    pub fn scenarios(&self) -> &ScenarioBook {
        &self.scenarios
    }

    /// Reject unknown scenario names from now on instead of recording no-ops.
    pub fn require_known_scenarios(&mut self) {
        self.scenarios = std::mem::take(&mut self.scenarios).strict(true);
    }

    /// Head sequence number, `None` before anything was recorded.
    pub fn version(&self) -> Option<u64> {
        self.log.head().map(HistoryEntry::seq)
    }

    fn check_version(&self, expected: Option<u64>) -> Result<(), FleetError> {
        let Some(expected) = expected else {
            return Ok(());
        };
        match self.version() {
            Some(found) if found == expected => Ok(()),
            found => Err(FleetError::VersionConflict {
                expected,
                found: found
                    .map(|s| format!("#{}", s))
                    .unwrap_or_else(|| "an empty history".to_string()),
            }),
        }
    }

    /// Run `mutation` against the store and record `note`.
    ///
    /// If the mutation fails the store is restored to its prior state and
    /// nothing is recorded.
    pub fn apply_and_record<F>(
        &mut self,
        note: &str,
        expected: Option<u64>,
        mutation: F,
    ) -> Result<&HistoryEntry, FleetError>
    where
        F: FnOnce(&mut StateStore) -> Result<(), FleetError>,
    {
        self.check_version(expected)?;
        let before = self.store.clone();
        if let Err(e) = mutation(&mut self.store) {
            self.store = before;
            return Err(e);
        }
        Ok(self.log.append(note, self.store.state()))
    }

    pub fn apply_scenario(
        &mut self,
        name: &str,
        expected: Option<u64>,
    ) -> Result<ScenarioOutcome, FleetError> {
        self.check_version(expected)?;
        self.scenarios.apply(name, &mut self.store, &mut self.log)
    }

    pub fn set_bay_status(
        &mut self,
        id: u32,
        status: SlotStatus,
        expected: Option<u64>,
    ) -> Result<&HistoryEntry, FleetError> {
        let note = format!("Bay {} set to {}", id, status);
        self.apply_and_record(&note, expected, |store| store.set_slot_status(id, status))
    }

    pub fn assign_train(
        &mut self,
        id: u32,
        train_id: Option<&str>,
        expected: Option<u64>,
    ) -> Result<&HistoryEntry, FleetError> {
        let note = match train_id {
            Some(train) => format!("Train {} assigned to bay {}", train, id),
            None => format!("Train released from bay {}", id),
        };
        self.apply_and_record(&note, expected, |store| store.assign_train(id, train_id))
    }

    pub fn reset_all(
        &mut self,
        status: SlotStatus,
        expected: Option<u64>,
    ) -> Result<&HistoryEntry, FleetError> {
        let note = format!("All bays reset to {}", status);
        self.apply_and_record(&note, expected, |store| {
            store.reset_all(status);
            store.set_label("");
            Ok(())
        })
    }

    pub fn restore(&mut self, seq: u64, expected: Option<u64>) -> Result<&HistoryEntry, FleetError> {
        self.check_version(expected)?;
        self.log.restore(seq, &mut self.store)
    }

    /// Flush the log explicitly, surfacing any storage error.
    pub fn save(&self) -> Result<(), FleetError> {
        self.log.save()
    }
}
