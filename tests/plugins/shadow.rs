use fleet_shadow::core::config::{BayChangeDef, Config, ScenarioDef};
use fleet_shadow::core::error::FleetError;
use fleet_shadow::plugins::bays::SlotStatus;
use fleet_shadow::plugins::history::HistoryLog;
use fleet_shadow::plugins::persistence::MemoryPersistence;
use fleet_shadow::plugins::scenario::{ScenarioBook, ScenarioOutcome};
use fleet_shadow::plugins::shadow::DepotShadow;

fn fresh(bays: u32) -> DepotShadow {
    DepotShadow::new(bays, HistoryLog::in_memory(20), ScenarioBook::builtin()).unwrap()
}

#[test]
fn test_failed_mutation_rolls_back_and_records_nothing() {
    let mut shadow = fresh(5);
    shadow.set_bay_status(1, SlotStatus::OccupiedActive, None).unwrap();
    let before = shadow.state().clone();

    let err = shadow
        .apply_and_record("two bays", None, |store| {
            store.set_slot_status(2, SlotStatus::Unavailable)?;
            store.set_slot_status(42, SlotStatus::Unavailable)
        })
        .unwrap_err();
    assert!(matches!(err, FleetError::NotFound(_)));
    assert_eq!(shadow.state(), &before);
    assert_eq!(shadow.log().len(), 1);
    assert_eq!(shadow.version(), Some(1));
}

#[test]
fn test_every_mutation_is_recorded_with_matching_snapshot() {
    let mut shadow = fresh(8);
    shadow.set_bay_status(4, SlotStatus::OccupiedCleaning, None).unwrap();
    shadow.assign_train(4, Some("TS-30"), None).unwrap();
    shadow.apply_scenario("maintenance", None).unwrap();
    shadow.assign_train(4, None, None).unwrap();

    assert_eq!(shadow.log().len(), 4);
    assert_eq!(shadow.log().head().unwrap().state(), shadow.state());
    let notes: Vec<&str> = shadow.log().list().map(|e| e.note()).collect();
    assert_eq!(
        notes,
        vec![
            "Train released from bay 4",
            "Scenario applied: maintenance",
            "Train TS-30 assigned to bay 4",
            "Bay 4 set to occupied-cleaning",
        ]
    );
}

#[test]
fn test_stale_version_is_refused() {
    let mut shadow = fresh(5);
    let v1 = shadow.set_bay_status(1, SlotStatus::OccupiedActive, None).unwrap().seq();
    shadow.set_bay_status(2, SlotStatus::OccupiedActive, Some(v1)).unwrap();

    let err = shadow
        .set_bay_status(3, SlotStatus::OccupiedActive, Some(v1))
        .unwrap_err();
    match err {
        FleetError::VersionConflict { expected, found } => {
            assert_eq!(expected, 1);
            assert_eq!(found, "#2");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(shadow.store().get_slot(3).unwrap().status, SlotStatus::Empty);
    assert_eq!(shadow.log().len(), 2);

    assert!(shadow.apply_scenario("cleaning", Some(1)).is_err());
    assert!(shadow.restore(1, Some(1)).is_err());
    assert_eq!(shadow.log().len(), 2);
    assert!(shadow.restore(1, Some(2)).is_ok());
}

#[test]
fn test_restore_through_shadow() {
    let mut shadow = fresh(25);
    shadow.apply_scenario("maintenance", None).unwrap();
    let target = shadow.version().unwrap();
    shadow.apply_scenario("telecom", None).unwrap();
    let expected = shadow.log().get(target).unwrap().state().clone();

    let entry = shadow.restore(target, None).unwrap();
    assert!(entry.note().starts_with("Rollback to "));
    assert_eq!(shadow.state(), &expected);
    assert_eq!(shadow.version(), Some(3));
}

#[test]
fn test_open_resumes_from_newest_snapshot() {
    let mem = MemoryPersistence::new();
    let config = Config {
        bay_count: 6,
        ..Config::default()
    };
    {
        let mut shadow = DepotShadow::open(&config, Box::new(mem.clone())).unwrap();
        shadow.set_bay_status(6, SlotStatus::Unavailable, None).unwrap();
        shadow.apply_scenario("maintenance", None).unwrap();
    }

    let shadow = DepotShadow::open(&config, Box::new(mem.clone())).unwrap();
    assert_eq!(shadow.version(), Some(2));
    assert_eq!(shadow.store().get_slot(6).unwrap().status, SlotStatus::Unavailable);
    assert_eq!(shadow.store().get_slot(3).unwrap().status, SlotStatus::OccupiedMaintenance);
    assert_eq!(shadow.store().label(), "maintenance");

    let no_resume = Config {
        resume: false,
        ..config.clone()
    };
    let shadow = DepotShadow::open(&no_resume, Box::new(mem.clone())).unwrap();
    assert_eq!(shadow.state().count(SlotStatus::Empty), 6);
    assert_eq!(shadow.log().len(), 2);
}

#[test]
fn test_open_with_resized_depot_starts_fresh() {
    let mem = MemoryPersistence::new();
    let small = Config {
        bay_count: 4,
        ..Config::default()
    };
    {
        let mut shadow = DepotShadow::open(&small, Box::new(mem.clone())).unwrap();
        shadow.reset_all(SlotStatus::Unavailable, None).unwrap();
    }

    let large = Config {
        bay_count: 10,
        ..Config::default()
    };
    let mut shadow = DepotShadow::open(&large, Box::new(mem.clone())).unwrap();
    assert_eq!(shadow.store().len(), 10);
    assert_eq!(shadow.state().count(SlotStatus::Empty), 10);
    assert!(matches!(
        shadow.restore(1, None),
        Err(FleetError::InvalidArgument(_))
    ));
}

#[test]
fn test_open_uses_configured_scenarios_and_strictness() {
    let config = Config {
        bay_count: 12,
        strict_scenarios: true,
        scenarios: vec![ScenarioDef {
            name: "power-outage".into(),
            description: "East shed feeder trip".into(),
            set: vec![
                BayChangeDef {
                    bay: 11,
                    status: SlotStatus::Unavailable,
                },
                BayChangeDef {
                    bay: 12,
                    status: SlotStatus::Unavailable,
                },
            ],
        }],
        ..Config::default()
    };
    let mut shadow = DepotShadow::open(&config, Box::new(MemoryPersistence::new())).unwrap();
    assert!(shadow.scenarios().is_strict());

    let outcome = shadow.apply_scenario("power-outage", None).unwrap();
    assert_eq!(outcome, ScenarioOutcome::Applied { seq: 1 });
    assert_eq!(shadow.state().count(SlotStatus::Unavailable), 2);

    assert!(matches!(
        shadow.apply_scenario("flood", None),
        Err(FleetError::UnknownScenario(_))
    ));
    assert_eq!(shadow.log().len(), 1);
}

#[test]
fn test_open_rejects_invalid_config() {
    let config = Config {
        history_capacity: 0,
        ..Config::default()
    };
    assert!(matches!(
        DepotShadow::open(&config, Box::new(MemoryPersistence::new())),
        Err(FleetError::Config(_))
    ));
}

#[test]
fn test_storage_failure_keeps_session_state() {
    let mem = MemoryPersistence::new();
    let mut shadow = DepotShadow::open(&Config::default(), Box::new(mem.clone())).unwrap();
    mem.set_fail_writes(true);

    shadow.apply_scenario("cleaning", None).unwrap();
    assert_eq!(shadow.version(), Some(1));
    assert!(shadow.log().last_persist_error().is_some());
    assert!(mem.raw().is_none());
    assert!(matches!(shadow.save(), Err(FleetError::PersistenceFailure(_))));

    mem.set_fail_writes(false);
    shadow.save().unwrap();
    assert!(mem.raw().unwrap().contains("Scenario applied: cleaning"));
}

#[test]
fn test_requiring_known_scenarios_switches_book_to_strict() {
    let mut shadow = fresh(10);
    assert!(!shadow.scenarios().is_strict());
    shadow.apply_scenario("flood", None).unwrap();
    assert_eq!(shadow.log().len(), 1);

    shadow.require_known_scenarios();
    assert!(shadow.scenarios().is_strict());
    assert!(shadow.scenarios().lookup("cleaning").is_some());
    assert!(matches!(
        shadow.apply_scenario("flood", None),
        Err(FleetError::UnknownScenario(_))
    ));
    assert_eq!(shadow.log().len(), 1);
    assert!(shadow.apply_scenario("cleaning", None).is_ok());
}
