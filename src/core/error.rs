use rusqlite;
use std::env;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] env::VarError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),
    #[error("Version conflict: expected head #{expected}, found {found}")]
    VersionConflict { expected: u64, found: String },
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
    #[error("Config error: {0}")]
    Config(String),
}

impl FleetError {
    /// True for errors raised by a storage backend rather than by the caller.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            FleetError::PersistenceFailure(_)
                | FleetError::RusqliteError(_)
                | FleetError::IoError(_)
                | FleetError::JsonError(_)
        )
    }
}
