//! Data-directory configuration loaded from `.fleet-shadow/config.toml`.
//!
//! A missing file is not an error: every field has a default, so a freshly
//! created directory behaves like the stock 25-bay depot.

use crate::core::error::FleetError;
use crate::core::schemas;
use crate::plugins::bays::SlotStatus;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_BAY_COUNT: u32 = 25;
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bay_count: u32,
    pub history_capacity: usize,
    pub backend: Backend,
    pub strict_scenarios: bool,
    /// Start each session from the newest snapshot instead of an all-empty depot.
    pub resume: bool,
    #[serde(rename = "scenario")]
    pub scenarios: Vec<ScenarioDef>,
}

/// Operator-defined scenario from a `[[scenario]]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub set: Vec<BayChangeDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayChangeDef {
    pub bay: u32,
    pub status: SlotStatus,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bay_count: DEFAULT_BAY_COUNT,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            backend: Backend::default(),
            strict_scenarios: false,
            resume: true,
            scenarios: Vec::new(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), FleetError> {
        if self.bay_count == 0 {
            return Err(FleetError::Config("bay_count must be at least 1".into()));
        }
        if self.history_capacity == 0 {
            return Err(FleetError::Config(
                "history_capacity must be at least 1".into(),
            ));
        }
        for def in &self.scenarios {
            if def.name.trim().is_empty() {
                return Err(FleetError::Config("scenario name must not be empty".into()));
            }
            if let Some(change) = def.set.iter().find(|c| c.bay == 0 || c.bay > self.bay_count) {
                return Err(FleetError::Config(format!(
                    "scenario '{}' targets bay {} outside 1..={}",
                    def.name, change.bay, self.bay_count
                )));
            }
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, FleetError> {
        toml::to_string_pretty(self).map_err(|e| FleetError::Config(e.to_string()))
    }
}

/// Load config from `<dir>/config.toml`, where `dir` is the `.fleet-shadow` directory.
pub fn load_config(dir: &Path) -> Result<Config, FleetError> {
    let config_path = dir.join(schemas::CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&config_path).map_err(FleetError::IoError)?;
    let config: Config =
        toml::from_str(&content).map_err(|e| FleetError::Config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

pub fn write_config(dir: &Path, config: &Config) -> Result<(), FleetError> {
    config.validate()?;
    fs::create_dir_all(dir).map_err(FleetError::IoError)?;
    fs::write(dir.join(schemas::CONFIG_FILE_NAME), config.to_toml()?)
        .map_err(FleetError::IoError)
}
