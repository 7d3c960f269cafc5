use crate::core::broker::DbBroker;
use crate::core::error;
use crate::core::schemas;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

pub fn db_connect(db_path: &str) -> Result<Connection, error::FleetError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(error::FleetError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(error::FleetError::RusqliteError)?;
    Ok(conn)
}

pub fn history_db_path(root: &Path) -> PathBuf {
    root.join(schemas::HISTORY_DB_NAME)
}

pub fn initialize_history_db(root: &Path) -> Result<(), error::FleetError> {
    fs::create_dir_all(root).map_err(error::FleetError::IoError)?;
    let broker = DbBroker::new(root);
    let db_path = history_db_path(root);

    broker.with_conn(&db_path, "fleet-shadow", None, "history.init", |conn| {
        conn.execute(schemas::KV_DB_SCHEMA, [])?;
        Ok(())
    })
}
