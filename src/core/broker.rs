use crate::core::db;
use crate::core::error;
use crate::core::schemas;
use crate::core::time;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The DB Broker is the single doorway to the history database.
/// Every operation is serialized in-process and leaves one audit line.
pub struct DbBroker {
    audit_log_path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerEvent {
    pub ts: i64,
    pub event_id: String,
    pub actor: String,
    pub intent_ref: Option<String>,
    pub op: String,
    pub db_id: String,
    pub status: String,
}

impl DbBroker {
    pub fn new(root: &Path) -> Self {
        Self {
            audit_log_path: root.join(schemas::BROKER_EVENTS_NAME),
        }
    }

    pub fn audit_log_path(&self) -> &Path {
        &self.audit_log_path
    }

    /// Execute a closure with a serialized connection to the specified DB.
    pub fn with_conn<F, R>(
        &self,
        db_path: &Path,
        actor: &str,
        intent_ref: Option<&str>,
        op_name: &str,
        f: F,
    ) -> Result<R, error::FleetError>
    where
        F: FnOnce(&Connection) -> Result<R, error::FleetError>,
    {
        static DB_LOCK: Mutex<()> = Mutex::new(());
        let _lock = DB_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let db_id = db_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let conn = db::db_connect(&db_path.to_string_lossy())?;

        let result = f(&conn);

        let status = if result.is_ok() { "success" } else { "error" };
        if let Err(e) = self.log_event(actor, intent_ref, op_name, &db_id, status) {
            tracing::warn!(
                audit_log = %self.audit_log_path.display(),
                op = op_name,
                error = %e,
                "audit event not written"
            );
        }

        result
    }

    fn log_event(
        &self,
        actor: &str,
        intent_ref: Option<&str>,
        op: &str,
        db_id: &str,
        status: &str,
    ) -> Result<(), error::FleetError> {
        let ev = BrokerEvent {
            ts: time::now_epoch_ms(),
            event_id: time::new_event_id(),
            actor: actor.to_string(),
            intent_ref: intent_ref.map(|s| s.to_string()),
            op: op.to_string(),
            db_id: db_id.to_string(),
            status: status.to_string(),
        };

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)
            .map_err(error::FleetError::IoError)?;

        writeln!(f, "{}", serde_json::to_string(&ev)?).map_err(error::FleetError::IoError)?;
        Ok(())
    }

    /// Most recent `limit` audit events, oldest first. Unparseable lines are skipped.
    pub fn recent_events(&self, limit: usize) -> Result<Vec<BrokerEvent>, error::FleetError> {
        if !self.audit_log_path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.audit_log_path)?;
        let events: Vec<BrokerEvent> = content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        let skip = events.len().saturating_sub(limit);
        Ok(events.into_iter().skip(skip).collect())
    }
}
