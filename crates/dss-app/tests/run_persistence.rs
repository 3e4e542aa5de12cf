use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use dss_app::{
    AppError, RunOptions, RunRequest, RunStage, ensure_run, ensure_run_with_progress,
    extract_series, list_runs, load_run,
};

fn demo_scenario() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/ieee13/battery_memory.yaml")
}

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 1, 1)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

/// A short copy of the battery demo in its own directory, starting at
/// `start` with 10-minute steps.
fn scenario_copy(tag: &str, start: NaiveDateTime, steps: usize) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("dss_app_{tag}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();

    let mut scenario = dss_scenario::load_yaml(&demo_scenario()).unwrap();
    scenario.start_time = start;
    scenario.time_step_s = 600.0;
    scenario.steps = steps;
    let path = dir.join("scenario.yaml");
    dss_scenario::save_yaml(&path, &scenario).unwrap();
    path
}

fn request(path: &Path, use_cache: bool) -> RunRequest<'_> {
    RunRequest {
        scenario_path: path,
        options: RunOptions { use_cache },
    }
}

#[test]
fn charging_run_records_every_step() {
    let path = scenario_copy("charge", at(9, 0), 6);
    let response = ensure_run(&request(&path, false)).expect("run failed");
    assert!(!response.loaded_from_cache);
    assert_eq!(response.manifest.steps, 6);
    assert_eq!(response.manifest.engine, "memory");
    assert!(
        response
            .manifest
            .keys
            .contains(&"Storage.battery1.%stored".to_string())
    );
    assert!(
        response
            .manifest
            .keys
            .contains(&"bus.671.voltage_avg_pu".to_string())
    );

    let (_manifest, records) = load_run(&path, &response.run_id).unwrap();
    assert_eq!(records.len(), 6);
    assert_eq!(records[0].time, at(9, 0));
    assert_eq!(records[5].time, at(9, 50));

    // 1 kW into a 10 kWh unit at 95% for 10 minutes per step.
    let soc: Vec<f64> = records
        .iter()
        .map(|r| r.get("Storage.battery1.%stored").unwrap())
        .collect();
    let per_step = 1.0 * (600.0 / 3600.0) * 0.95 / 10.0 * 100.0;
    assert!((soc[0] - (50.0 + per_step)).abs() < 1e-9, "soc {soc:?}");
    assert!(soc.windows(2).all(|w| w[1] > w[0]));

    let p = records[0].get("Storage.battery1.power_total.p").unwrap();
    assert!((p - 1.0).abs() < 1e-9);
    assert!(records[0].get("circuit.circuit_power.p").is_some());
}

#[test]
fn discharge_lowers_state_of_charge() {
    let path = scenario_copy("discharge", at(17, 0), 3);
    let response = ensure_run(&request(&path, false)).unwrap();
    let (_manifest, records) = load_run(&path, &response.run_id).unwrap();

    let p = records[0].get("Storage.battery1.power_total.p").unwrap();
    assert!((p + 3.0).abs() < 1e-9);
    let soc = records[2].get("Storage.battery1.%stored").unwrap();
    assert!(soc < 50.0);
}

#[test]
fn second_run_is_served_from_cache() {
    let path = scenario_copy("cache", at(9, 0), 2);
    let first = ensure_run(&request(&path, true)).unwrap();
    let second = ensure_run(&request(&path, true)).unwrap();
    assert!(!first.loaded_from_cache);
    assert!(second.loaded_from_cache);
    assert_eq!(first.run_id, second.run_id);

    let forced = ensure_run(&request(&path, false)).unwrap();
    assert!(!forced.loaded_from_cache);
    assert_eq!(forced.run_id, first.run_id);

    let runs = list_runs(&path).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].scenario, "ieee13-battery");
}

#[test]
fn progress_reports_stages_and_steps() {
    let path = scenario_copy("progress", at(9, 0), 4);
    let mut events = Vec::new();
    let response =
        ensure_run_with_progress(&request(&path, false), Some(&mut |e| events.push(e))).unwrap();

    assert!(events.iter().any(|e| e.stage == RunStage::CompilingCircuit));
    let last_step = events
        .iter()
        .filter(|e| e.stage == RunStage::Stepping)
        .filter_map(|e| e.step)
        .max();
    assert_eq!(last_step, Some(4));
    let done = events.last().unwrap();
    assert_eq!(done.stage, RunStage::Completed);
    assert_eq!(done.fraction_complete(), 1.0);
    assert_eq!(response.timing.steps, 4);
}

#[test]
fn series_extraction() {
    let path = scenario_copy("series", at(9, 0), 3);
    let response = ensure_run(&request(&path, false)).unwrap();

    let series = extract_series(&path, &response.run_id, "bus.671.voltage_avg_pu").unwrap();
    assert_eq!(series.len(), 3);
    assert_eq!(series[1].0, at(9, 10));
    assert!(series.iter().all(|(_, v)| *v > 0.9 && *v < 1.1));

    assert!(extract_series(&path, &response.run_id, "bus.999.voltage_avg_pu").is_err());
    assert!(matches!(
        load_run(&path, "no-such-run"),
        Err(AppError::RunNotFound(_))
    ));
}
