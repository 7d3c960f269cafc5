//! Workspace handle: where a depot's config and history live on disk.
//!
//! Layout under the project root:
//!
//! ```text
//! .fleet-shadow/
//!   config.toml
//!   data/
//!     history.db | depot-history.json
//!     broker.events.jsonl
//! ```

use crate::core::config::{self, Backend, Config};
use crate::core::db;
use crate::core::error::FleetError;
use crate::core::schemas;
use crate::plugins::persistence::{JsonFilePersistence, PersistencePort, SqlitePersistence};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Env var that pins the project root instead of walking up from the cwd.
pub const ROOT_ENV_VAR: &str = "FLEET_SHADOW_DIR";

#[derive(Debug, Clone)]
pub struct Workspace {
    /// Directory containing `.fleet-shadow/`.
    pub root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn dir(&self) -> PathBuf {
        self.root.join(schemas::DATA_DIR_NAME)
    }

    pub fn data_root(&self) -> PathBuf {
        self.dir().join("data")
    }

    pub fn exists(&self) -> bool {
        self.dir().is_dir()
    }

    pub fn load_config(&self) -> Result<Config, FleetError> {
        config::load_config(&self.dir())
    }

    /// Persistence backend selected by the config.
    pub fn persistence(&self, config: &Config) -> Box<dyn PersistencePort> {
        match config.backend {
            Backend::Sqlite => Box::new(SqlitePersistence::new(&self.data_root())),
            Backend::Json => Box::new(JsonFilePersistence::new(
                self.data_root().join(schemas::HISTORY_JSON_NAME),
            )),
        }
    }

    /// Create the directory layout, write `config`, and initialize storage.
    ///
    /// An existing workspace is left alone unless `force` is set, in which case
    /// its config is rewritten. History is never wiped.
    pub fn init(&self, config: &Config, force: bool) -> Result<bool, FleetError> {
        if self.exists() && !force {
            return Ok(false);
        }
        fs::create_dir_all(self.data_root()).map_err(FleetError::IoError)?;
        config::write_config(&self.dir(), config)?;
        if config.backend == Backend::Sqlite {
            db::initialize_history_db(&self.data_root())?;
        }
        tracing::info!(root = %self.root.display(), "workspace initialized");
        Ok(true)
    }
}

/// Resolve the workspace: `FLEET_SHADOW_DIR` if set, otherwise the nearest
/// ancestor of `start_dir` containing `.fleet-shadow/`.
pub fn find_workspace(start_dir: &Path) -> Result<Workspace, FleetError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(dir) if !dir.trim().is_empty() => return Ok(Workspace::new(dir)),
        Ok(_) | Err(env::VarError::NotPresent) => {}
        Err(e) => return Err(FleetError::EnvVarError(e)),
    }

    let mut current_dir = PathBuf::from(start_dir);
    loop {
        if current_dir.join(schemas::DATA_DIR_NAME).is_dir() {
            return Ok(Workspace::new(current_dir));
        }
        if !current_dir.pop() {
            return Err(FleetError::NotFound(
                "'.fleet-shadow' directory not found in current or parent directories. Run `fleet-shadow init` first.".to_string(),
            ));
        }
    }
}
