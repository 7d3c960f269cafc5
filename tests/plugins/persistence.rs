use fleet_shadow::core::schemas;
use fleet_shadow::plugins::bays::{SlotStatus, StateStore};
use fleet_shadow::plugins::history::HistoryLog;
use fleet_shadow::plugins::persistence::{
    JsonFilePersistence, MemoryPersistence, PersistencePort, SqlitePersistence, decode_log,
};

fn fill(log: &mut HistoryLog, n: u32) -> StateStore {
    let mut store = StateStore::initialize(6).unwrap();
    for i in 1..=n {
        store
            .set_slot_status(i % 6 + 1, SlotStatus::OccupiedActive)
            .unwrap();
        let train = format!("TS-{:02}", i);
        store.assign_train(i % 6 + 1, Some(train.as_str())).unwrap();
        log.append(&format!("step {}", i), store.state());
    }
    store
}

fn assert_same_log(a: &HistoryLog, b: &HistoryLog) {
    let a: Vec<_> = a.list().collect();
    let b: Vec<_> = b.list().collect();
    assert_eq!(a, b);
}

#[test]
fn test_corrupt_json_file_loads_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join(schemas::HISTORY_JSON_NAME);
    std::fs::write(&path, "[{\"ts\": 1, \"state\": ").unwrap();

    let mut log = HistoryLog::load(Box::new(JsonFilePersistence::new(&path)), 20);
    assert!(log.is_empty());

    let store = StateStore::initialize(2).unwrap();
    log.append("fresh start", store.state());
    let reloaded = HistoryLog::load(Box::new(JsonFilePersistence::new(&path)), 20);
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.head().unwrap().note(), "fresh start");
}

#[test]
fn test_json_file_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nested").join(schemas::HISTORY_JSON_NAME);
    let mut log = HistoryLog::load(Box::new(JsonFilePersistence::new(&path)), 20);
    fill(&mut log, 7);

    assert!(path.exists());
    assert!(!path.with_extension("json.tmp").exists());
    let reloaded = HistoryLog::load(Box::new(JsonFilePersistence::new(&path)), 20);
    assert_same_log(&log, &reloaded);
    assert_eq!(reloaded.next_seq(), 8);
}

#[test]
fn test_sqlite_round_trip_with_default_capacity() {
    let tmp = tempfile::tempdir().unwrap();
    let mut log = HistoryLog::with_default_capacity(Box::new(SqlitePersistence::new(tmp.path())));
    assert_eq!(log.capacity(), 20);
    assert!(log.is_empty());
    fill(&mut log, 23);
    assert_eq!(log.len(), 20);

    let reloaded =
        HistoryLog::with_default_capacity(Box::new(SqlitePersistence::new(tmp.path())));
    assert_same_log(&log, &reloaded);
    assert_eq!(reloaded.head().unwrap().note(), "step 23");
    assert_eq!(reloaded.list().last().unwrap().note(), "step 4");
    assert!(reloaded.storage().starts_with("sqlite:"));
    assert!(reloaded.storage().ends_with(schemas::HISTORY_KEY));
}

#[test]
fn test_sqlite_missing_db_is_empty_and_not_created() {
    let tmp = tempfile::tempdir().unwrap();
    let port = SqlitePersistence::new(tmp.path());
    assert!(port.read_raw().unwrap().is_none());
    assert!(!tmp.path().join(schemas::HISTORY_DB_NAME).exists());
}

#[test]
fn test_sqlite_corrupt_value_loads_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let port = SqlitePersistence::new(tmp.path());
    port.write_raw("definitely not a history").unwrap();

    let log = HistoryLog::load(Box::new(SqlitePersistence::new(tmp.path())), 20);
    assert!(log.is_empty());
    assert_eq!(log.next_seq(), 1);
}

#[test]
fn test_stored_payload_is_newest_first_wire_layout() {
    let mem = MemoryPersistence::new();
    let mut log = HistoryLog::load(Box::new(mem.clone()), 20).with_clock({
        let mut now = 1_700_000_000_000;
        move || {
            now += 500;
            now
        }
    });
    let mut store = StateStore::initialize(3).unwrap();
    log.append("first", store.state());
    store.set_slot_status(2, SlotStatus::OccupiedCleaning).unwrap();
    store.set_label("cleaning");
    log.append("second", store.state());

    let raw: serde_json::Value = serde_json::from_str(&mem.raw().unwrap()).unwrap();
    let arr = raw.as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["ts"], 1_700_000_001_000i64);
    assert_eq!(arr[0]["state"]["note"], "second");
    assert_eq!(arr[0]["state"]["selectedScenario"], "cleaning");
    assert_eq!(arr[0]["state"]["depotBays"][1]["status"], "occupied-cleaning");
    assert!(arr[0]["state"]["depotBays"][1].get("trainId").is_none());
    assert_eq!(arr[1]["state"]["note"], "first");
    assert_eq!(arr[1]["ts"], 1_700_000_000_500i64);
}

#[test]
fn test_external_payload_without_seq_is_accepted() {
    let payload = r#"[
        {"ts": 1709280960000, "state": {"depotBays": [
            {"id": 1, "status": "occupied-active", "trainId": "TS-21"},
            {"id": 2, "status": "empty"}
        ], "selectedScenario": "", "note": "Train TS-21 assigned to bay 1"}},
        {"ts": 1709280900000, "state": {"depotBays": [
            {"id": 1, "status": "empty"},
            {"id": 2, "status": "empty"}
        ], "selectedScenario": ""}}
    ]"#;
    let mem = MemoryPersistence::with_raw(payload);
    let mut log = HistoryLog::load(Box::new(mem.clone()), 20);
    assert_eq!(log.len(), 2);
    assert_eq!(log.head().unwrap().seq(), 2);
    assert_eq!(
        log.head().unwrap().state().bays[0].train_id.as_deref(),
        Some("TS-21")
    );

    let mut store = StateStore::initialize(2).unwrap();
    log.restore(1, &mut store).unwrap();
    assert_eq!(log.head().unwrap().seq(), 3);
    assert_eq!(log.head().unwrap().note(), "Rollback to 2024-03-01 08:15:00 UTC");

    let rewritten = decode_log(&mem.raw().unwrap()).unwrap();
    let seqs: Vec<u64> = rewritten.iter().map(|e| e.seq()).collect();
    assert_eq!(seqs, vec![3, 2, 1]);
}
