//! Database and file names for the on-disk data directory.
//!
//! All durable state lives under `<root>/.fleet-shadow/data/`:
//! 1. history.db: key-value slot holding the serialized snapshot history.
//! 2. depot-history.json: the same payload when the JSON file backend is selected.
//! 3. broker.events.jsonl: append-only audit of every brokered database operation.

pub const DATA_DIR_NAME: &str = ".fleet-shadow";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Storage key for the serialized history log.
pub const HISTORY_KEY: &str = "depot-history";

pub const HISTORY_DB_NAME: &str = "history.db";
pub const HISTORY_JSON_NAME: &str = "depot-history.json";
pub const BROKER_EVENTS_NAME: &str = "broker.events.jsonl";

pub const KV_DB_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS kv (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
";
