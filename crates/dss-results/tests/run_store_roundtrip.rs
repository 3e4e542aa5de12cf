use chrono::NaiveDate;
use dss_results::*;

fn manifest(run_id: &str, scenario: &str, timestamp: &str) -> RunManifest {
    RunManifest {
        run_id: run_id.to_string(),
        scenario: scenario.to_string(),
        timestamp: timestamp.to_string(),
        steps: 2,
        time_step_s: 60.0,
        engine: "memory".to_string(),
        keys: vec!["Storage.battery1.%stored".to_string()],
    }
}

fn records() -> Vec<StepRecord> {
    let t0 = NaiveDate::from_ymd_opt(2019, 1, 1)
        .unwrap()
        .and_hms_opt(0, 1, 0)
        .unwrap();
    vec![
        StepRecord {
            step: 0,
            time: t0,
            values: vec![RecordedValue::new("Storage.battery1.%stored", 50.0)],
        },
        StepRecord {
            step: 1,
            time: t0 + chrono::Duration::minutes(1),
            values: vec![RecordedValue::new("Storage.battery1.%stored", 50.16)],
        },
    ]
}

fn fresh_store(name: &str) -> RunStore {
    let dir = std::env::temp_dir().join(name);
    let _ = std::fs::remove_dir_all(&dir);
    RunStore::new(dir).unwrap()
}

#[test]
fn save_and_load_run() {
    let store = fresh_store("dss_results_roundtrip");
    let m = manifest("abc123", "ieee13-battery", "2026-01-01T00:00:00Z");
    assert!(!store.has_run("abc123"));
    store.save_run(&m, &records()).unwrap();
    assert!(store.has_run("abc123"));

    assert_eq!(store.load_manifest("abc123").unwrap(), m);
    let loaded = store.load_timeseries("abc123").unwrap();
    assert_eq!(loaded, records());
    assert_eq!(loaded[1].get("Storage.battery1.%stored"), Some(50.16));
}

#[test]
fn list_and_delete_runs() {
    let store = fresh_store("dss_results_list");
    store
        .save_run(&manifest("r2", "a", "2026-01-02T00:00:00Z"), &records())
        .unwrap();
    store
        .save_run(&manifest("r1", "a", "2026-01-01T00:00:00Z"), &records())
        .unwrap();
    store
        .save_run(&manifest("r3", "b", "2026-01-03T00:00:00Z"), &records())
        .unwrap();

    let runs: Vec<String> = store
        .list_runs("a")
        .unwrap()
        .into_iter()
        .map(|m| m.run_id)
        .collect();
    assert_eq!(runs, ["r1", "r2"]);

    store.delete_run("r1").unwrap();
    assert!(!store.has_run("r1"));
    assert_eq!(store.list_runs("a").unwrap().len(), 1);
    // Deleting twice is fine.
    store.delete_run("r1").unwrap();
}

#[test]
fn missing_run_is_reported() {
    let store = fresh_store("dss_results_missing");
    assert!(matches!(
        store.load_manifest("nope"),
        Err(ResultsError::RunNotFound { .. })
    ));
    assert!(matches!(
        store.load_timeseries("nope"),
        Err(ResultsError::RunNotFound { .. })
    ));
}

#[test]
fn store_next_to_scenario() {
    let dir = std::env::temp_dir().join("dss_results_scenario_dir");
    std::fs::create_dir_all(&dir).unwrap();
    let store = RunStore::for_scenario(&dir.join("battery.yaml")).unwrap();
    assert_eq!(store.root_dir(), dir.join(".dsstap").join("runs"));
    assert!(store.root_dir().is_dir());
}
