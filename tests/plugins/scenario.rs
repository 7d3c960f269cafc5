use fleet_shadow::core::error::FleetError;
use fleet_shadow::plugins::bays::{SlotStatus, StateStore};
use fleet_shadow::plugins::history::HistoryLog;
use fleet_shadow::plugins::scenario::{ScenarioBook, ScenarioOutcome};

fn setup() -> (StateStore, HistoryLog, ScenarioBook) {
    (
        StateStore::initialize(25).unwrap(),
        HistoryLog::in_memory(20),
        ScenarioBook::builtin(),
    )
}

#[test]
fn test_maintenance_scenario_on_fresh_depot() {
    let (mut store, mut log, book) = setup();

    let outcome = book.apply("maintenance", &mut store, &mut log).unwrap();
    assert_eq!(outcome, ScenarioOutcome::Applied { seq: 1 });

    assert_eq!(store.get_slot(3).unwrap().status, SlotStatus::OccupiedMaintenance);
    assert_eq!(store.state().count(SlotStatus::Empty), 24);
    assert_eq!(store.label(), "maintenance");

    assert_eq!(log.len(), 1);
    let head = log.head().unwrap();
    assert_eq!(head.note(), "Scenario applied: maintenance");
    assert_eq!(head.state(), store.state());
}

#[test]
fn test_each_builtin_touches_its_bay() {
    let cases = [
        ("maintenance", 3, SlotStatus::OccupiedMaintenance),
        ("cleaning", 5, SlotStatus::Unavailable),
        ("telecom", 7, SlotStatus::Unavailable),
    ];
    for (name, bay, status) in cases {
        let (mut store, mut log, book) = setup();
        book.apply(name, &mut store, &mut log).unwrap();
        assert_eq!(store.get_slot(bay).unwrap().status, status, "{}", name);
        let changed = store
            .state()
            .bays
            .iter()
            .filter(|s| s.status != SlotStatus::Empty)
            .count();
        assert_eq!(changed, 1, "{} should change exactly one bay", name);
    }
}

#[test]
fn test_apply_is_deterministic_and_repeatable() {
    let (mut store, mut log, book) = setup();
    book.apply("cleaning", &mut store, &mut log).unwrap();
    let once = store.state().clone();
    book.apply("cleaning", &mut store, &mut log).unwrap();
    assert_eq!(store.state(), &once);
    assert_eq!(log.len(), 2);
}

#[test]
fn test_unknown_scenario_is_recorded_no_op() {
    let (mut store, mut log, book) = setup();
    let before = store.clone();

    let outcome = book
        .apply("unknown-scenario-xyz", &mut store, &mut log)
        .unwrap();
    assert_eq!(outcome, ScenarioOutcome::Unknown { seq: 1 });
    assert_eq!(store, before);

    assert_eq!(log.len(), 1);
    let head = log.head().unwrap();
    assert!(head.note().contains("unknown-scenario-xyz"));
    assert_eq!(head.state(), before.state());
}

#[test]
fn test_strict_book_rejects_unknown_without_recording() {
    let (mut store, mut log, _) = setup();
    let book = ScenarioBook::builtin().strict(true);
    assert!(book.is_strict());

    let err = book
        .apply("unknown-scenario-xyz", &mut store, &mut log)
        .unwrap_err();
    assert!(matches!(err, FleetError::UnknownScenario(ref n) if n == "unknown-scenario-xyz"));
    assert!(log.is_empty());
    assert_eq!(store, StateStore::initialize(25).unwrap());

    assert!(book.apply("telecom", &mut store, &mut log).is_ok());
    assert_eq!(log.len(), 1);
}

#[test]
fn test_scenarios_compose_and_roll_back() {
    let (mut store, mut log, book) = setup();
    let maint = book.apply("maintenance", &mut store, &mut log).unwrap().seq();
    book.apply("telecom", &mut store, &mut log).unwrap();
    assert_eq!(store.get_slot(3).unwrap().status, SlotStatus::OccupiedMaintenance);
    assert_eq!(store.get_slot(7).unwrap().status, SlotStatus::Unavailable);
    assert_eq!(store.label(), "telecom");

    log.restore(maint, &mut store).unwrap();
    assert_eq!(store.get_slot(7).unwrap().status, SlotStatus::Empty);
    assert_eq!(store.label(), "maintenance");
    assert_eq!(log.len(), 3);
}
