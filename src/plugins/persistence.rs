//! Durable storage for the history log.
//!
//! The log is stored as a single value under the key `depot-history`: a JSON
//! array, newest first, where each element looks like
//!
//! ```json
//! { "ts": 1709280900000, "seq": 7,
//!   "state": { "depotBays": [{ "id": 1, "status": "empty" }],
//!              "selectedScenario": "maintenance",
//!              "note": "Scenario applied: maintenance" } }
//! ```
//!
//! `seq` is optional on read; logs written without it are numbered by
//! position. Unknown fields are ignored.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::FleetError;
use crate::core::schemas;
use crate::core::time;
use crate::plugins::bays::StoreState;
use crate::plugins::history::{HistoryEntry, MAX_SEQ};
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Storage seam for [`crate::plugins::history::HistoryLog`].
///
/// Backends only move an opaque payload; the wire format lives in
/// [`encode_log`] / [`decode_log`].
pub trait PersistencePort {
    /// `None` when nothing has been stored yet.
    fn read_raw(&self) -> Result<Option<String>, FleetError>;

    fn write_raw(&self, payload: &str) -> Result<(), FleetError>;

    /// Human-readable location, for logs and `status`.
    fn describe(&self) -> String;

    fn load(&self) -> Result<Vec<HistoryEntry>, FleetError> {
        match self.read_raw()? {
            Some(payload) => decode_log(&payload),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, entries: &[HistoryEntry]) -> Result<(), FleetError> {
        self.write_raw(&encode_log(entries)?)
    }
}

#[derive(Serialize, Deserialize)]
struct WireEntry {
    ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    seq: Option<u64>,
    state: WireState,
}

#[derive(Serialize, Deserialize)]
struct WireState {
    #[serde(flatten)]
    snapshot: StoreState,
    #[serde(default)]
    note: String,
}

pub fn encode_log(entries: &[HistoryEntry]) -> Result<String, FleetError> {
    let wire: Vec<WireEntry> = entries
        .iter()
        .map(|e| WireEntry {
            ts: e.ts(),
            seq: Some(e.seq()),
            state: WireState {
                snapshot: e.state().clone(),
                note: e.note().to_string(),
            },
        })
        .collect();
    Ok(serde_json::to_string(&wire)?)
}

/// Parse a stored payload, newest first.
///
/// Sequence numbers are kept only when every entry has one in
/// `1..=MAX_SEQ` and they strictly decrease; otherwise the whole log is
/// renumbered `len..=1`.
pub fn decode_log(payload: &str) -> Result<Vec<HistoryEntry>, FleetError> {
    let wire: Vec<WireEntry> = serde_json::from_str(payload)
        .map_err(|e| FleetError::PersistenceFailure(format!("corrupt history payload: {}", e)))?;

    for (idx, entry) in wire.iter().enumerate() {
        entry.state.snapshot.check_ids().map_err(|e| {
            FleetError::PersistenceFailure(format!("corrupt snapshot at position {}: {}", idx, e))
        })?;
    }

    let seqs_usable = wire
        .iter()
        .all(|e| e.seq.is_some_and(|s| (1..=MAX_SEQ).contains(&s)))
        && wire.windows(2).all(|w| w[0].seq > w[1].seq);
    let len = wire.len() as u64;

    Ok(wire
        .into_iter()
        .enumerate()
        .map(|(idx, e)| {
            let seq = match (seqs_usable, e.seq) {
                (true, Some(seq)) => seq,
                _ => len - idx as u64,
            };
            HistoryEntry::from_parts(seq, e.ts, e.state.note, e.state.snapshot)
        })
        .collect())
}

/// History stored as one row of a key-value table in `history.db`.
pub struct SqlitePersistence {
    root: PathBuf,
}

impl SqlitePersistence {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn broker(&self) -> DbBroker {
        DbBroker::new(&self.root)
    }
}

impl PersistencePort for SqlitePersistence {
    fn read_raw(&self) -> Result<Option<String>, FleetError> {
        let db_path = db::history_db_path(&self.root);
        if !db_path.exists() {
            return Ok(None);
        }
        self.broker()
            .with_conn(&db_path, "fleet-shadow", None, "history.load", |conn| {
                conn.execute(schemas::KV_DB_SCHEMA, [])?;
                let value = conn
                    .query_row(
                        "SELECT value FROM kv WHERE key = ?1",
                        params![schemas::HISTORY_KEY],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?;
                Ok(value)
            })
    }

    fn write_raw(&self, payload: &str) -> Result<(), FleetError> {
        fs::create_dir_all(&self.root)?;
        let db_path = db::history_db_path(&self.root);
        self.broker()
            .with_conn(&db_path, "fleet-shadow", None, "history.save", |conn| {
                conn.execute(schemas::KV_DB_SCHEMA, [])?;
                conn.execute(
                    "INSERT INTO kv(key, value, updated_at) VALUES(?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    params![schemas::HISTORY_KEY, payload, time::now_epoch_ms()],
                )?;
                Ok(())
            })
    }

    fn describe(&self) -> String {
        format!(
            "sqlite:{}#{}",
            db::history_db_path(&self.root).display(),
            schemas::HISTORY_KEY
        )
    }
}

/// History stored as a standalone JSON file, replaced atomically on save.
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistencePort for JsonFilePersistence {
    fn read_raw(&self) -> Result<Option<String>, FleetError> {
        if !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&self.path)?))
    }

    fn write_raw(&self, payload: &str) -> Result<(), FleetError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

/// In-process slot for tests and embedding. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    slot: Rc<RefCell<Option<String>>>,
    fail_writes: Rc<Cell<bool>>,
    writes: Rc<Cell<usize>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the slot, e.g. with a corrupt payload.
    pub fn with_raw(payload: &str) -> Self {
        let mem = Self::default();
        *mem.slot.borrow_mut() = Some(payload.to_string());
        mem
    }

    pub fn raw(&self) -> Option<String> {
        self.slot.borrow().clone()
    }

    /// Make every subsequent write fail, as a full or disabled store would.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    pub fn write_count(&self) -> usize {
        self.writes.get()
    }
}

impl PersistencePort for MemoryPersistence {
    fn read_raw(&self) -> Result<Option<String>, FleetError> {
        Ok(self.slot.borrow().clone())
    }

    fn write_raw(&self, payload: &str) -> Result<(), FleetError> {
        if self.fail_writes.get() {
            return Err(FleetError::PersistenceFailure(
                "storage quota exceeded".into(),
            ));
        }
        *self.slot.borrow_mut() = Some(payload.to_string());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
