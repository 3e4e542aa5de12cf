//! Run execution and caching service.

use std::path::Path;
use std::time::Instant;

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use dss_results::{RunManifest, RunStore, StepRecord};
use dss_scenario::Scenario;
use tracing::{debug, info};

use crate::engine::{self, DynCircuit};
use crate::error::AppResult;
use crate::progress::{RunProgressEvent, RunStage};
use crate::record;
use crate::scenario_service;

/// Options for running scenarios.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub use_cache: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { use_cache: true }
    }
}

/// Request to execute a run.
pub struct RunRequest<'a> {
    pub scenario_path: &'a Path,
    pub options: RunOptions,
}

/// Concise timing summary for a run.
#[derive(Debug, Clone, Default)]
pub struct RunTimingSummary {
    pub compile_time_s: f64,
    pub step_time_s: f64,
    pub record_time_s: f64,
    pub save_time_s: f64,
    pub load_cache_time_s: f64,
    pub total_time_s: f64,
    pub steps: usize,
}

/// Response from a run execution.
#[derive(Debug, Clone)]
pub struct RunResponse {
    pub run_id: String,
    pub manifest: RunManifest,
    pub loaded_from_cache: bool,
    pub timing: RunTimingSummary,
}

struct Progress<'a, 'b> {
    cb: Option<&'a mut (dyn FnMut(RunProgressEvent) + 'b)>,
    started: Instant,
    total_steps: usize,
}

impl Progress<'_, '_> {
    fn emit(&mut self, stage: RunStage, message: &str) {
        if let Some(cb) = self.cb.as_deref_mut() {
            cb(RunProgressEvent::stage(
                stage,
                self.started.elapsed().as_secs_f64(),
                Some(message.to_string()),
                self.total_steps,
            ));
        }
    }

    fn emit_step(&mut self, step: usize) {
        if let Some(cb) = self.cb.as_deref_mut() {
            let mut event = RunProgressEvent::stage(
                RunStage::Stepping,
                self.started.elapsed().as_secs_f64(),
                None,
                self.total_steps,
            );
            event.step = Some(step);
            cb(event);
        }
    }
}

/// Simulated time of step `k`: the start time plus `k` steps.
pub fn step_time(scenario: &Scenario, k: usize) -> NaiveDateTime {
    let offset_ms = (k as f64 * scenario.time_step_s * 1000.0).round() as i64;
    scenario.start_time + TimeDelta::milliseconds(offset_ms)
}

fn hour_of(time: NaiveDateTime) -> f64 {
    f64::from(time.num_seconds_from_midnight()) / 3600.0
}

/// Execute or load a run based on request.
pub fn ensure_run(request: &RunRequest) -> AppResult<RunResponse> {
    ensure_run_with_progress(request, None)
}

/// Execute or load a run and stream progress events.
pub fn ensure_run_with_progress(
    request: &RunRequest,
    progress_cb: Option<&mut dyn FnMut(RunProgressEvent)>,
) -> AppResult<RunResponse> {
    let started = Instant::now();
    let mut timing = RunTimingSummary::default();
    let mut progress = Progress {
        cb: progress_cb,
        started,
        total_steps: 0,
    };

    progress.emit(RunStage::LoadingScenario, "Loading scenario");
    let scenario = scenario_service::load_scenario(request.scenario_path)?;
    scenario_service::validate_scenario(&scenario)?;
    progress.total_steps = scenario.steps;

    progress.emit(RunStage::CheckingCache, "Checking run cache");
    let run_id = dss_results::compute_run_id(&scenario, scenario.engine.tag());
    let store = RunStore::for_scenario(request.scenario_path)?;

    if request.options.use_cache && store.has_run(&run_id) {
        progress.emit(RunStage::LoadingCachedResult, "Loading cached run");
        let load_started = Instant::now();
        let manifest = store.load_manifest(&run_id)?;
        timing.load_cache_time_s = load_started.elapsed().as_secs_f64();
        timing.steps = manifest.steps;
        timing.total_time_s = started.elapsed().as_secs_f64();
        info!(run_id = %run_id, "loaded cached run");
        progress.emit(RunStage::Completed, "Loaded cached run");
        return Ok(RunResponse {
            run_id,
            manifest,
            loaded_from_cache: true,
            timing,
        });
    }

    progress.emit(RunStage::CompilingCircuit, "Compiling circuit");
    let compile_started = Instant::now();
    let mut circuit = engine::open_circuit(&scenario)?;
    timing.compile_time_s = compile_started.elapsed().as_secs_f64();

    let records = execute_steps(&scenario, &mut circuit, &mut progress, &mut timing)?;

    progress.emit(RunStage::SavingResults, "Saving results");
    let save_started = Instant::now();
    let manifest = RunManifest {
        run_id: run_id.clone(),
        scenario: scenario.name.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        steps: scenario.steps,
        time_step_s: scenario.time_step_s,
        engine: scenario.engine.tag().to_string(),
        keys: records
            .first()
            .map(|r| r.values.iter().map(|v| v.key.clone()).collect())
            .unwrap_or_default(),
    };
    store.save_run(&manifest, &records)?;
    timing.save_time_s = save_started.elapsed().as_secs_f64();
    timing.total_time_s = started.elapsed().as_secs_f64();

    info!(
        run_id = %run_id,
        steps = scenario.steps,
        total_s = timing.total_time_s,
        "run completed"
    );
    progress.emit(RunStage::Completed, "Run completed");

    Ok(RunResponse {
        run_id,
        manifest,
        loaded_from_cache: false,
        timing,
    })
}

/// The step loop: apply the schedules, solve, record.
fn execute_steps(
    scenario: &Scenario,
    circuit: &mut DynCircuit,
    progress: &mut Progress<'_, '_>,
    timing: &mut RunTimingSummary,
) -> AppResult<Vec<StepRecord>> {
    let report_every = (scenario.steps / 100).max(1);
    let mut records = Vec::with_capacity(scenario.steps);

    for k in 0..scenario.steps {
        let time = step_time(scenario, k);
        let hour = hour_of(time);

        let step_started = Instant::now();
        for schedule in &scenario.schedules {
            if let Some(point) = schedule.setpoint_at(hour) {
                circuit.set_power(
                    &schedule.element,
                    point.p_kw,
                    point.q_kvar,
                    &schedule.class,
                    schedule.rated_kw,
                )?;
            }
        }
        circuit.run_dss(scenario.no_controls)?;
        timing.step_time_s += step_started.elapsed().as_secs_f64();

        let record_started = Instant::now();
        let values = record::sample_all(circuit, &scenario.record)?;
        timing.record_time_s += record_started.elapsed().as_secs_f64();
        debug!(step = k, %time, values = values.len(), "step recorded");

        records.push(StepRecord {
            step: k,
            time,
            values,
        });
        timing.steps = k + 1;
        if (k + 1) % report_every == 0 || k + 1 == scenario.steps {
            progress.emit_step(k + 1);
        }
    }
    Ok(records)
}

/// Stored runs of a scenario, most recent first.
pub fn list_runs(scenario_path: &Path) -> AppResult<Vec<RunManifest>> {
    let scenario = scenario_service::load_scenario(scenario_path)?;
    let store = RunStore::for_scenario(scenario_path)?;
    let mut runs = store.list_runs(&scenario.name)?;
    runs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(runs)
}

/// Load a specific run.
pub fn load_run(scenario_path: &Path, run_id: &str) -> AppResult<(RunManifest, Vec<StepRecord>)> {
    let store = RunStore::for_scenario(scenario_path)?;
    let manifest = store.load_manifest(run_id)?;
    let records = store.load_timeseries(run_id)?;
    Ok((manifest, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use dss_scenario::EngineDef;

    fn scenario() -> Scenario {
        Scenario {
            version: 1,
            name: "t".to_string(),
            engine: EngineDef::Memory,
            redirects: vec!["snapshot.json".into()],
            time_step_s: 900.0,
            start_time: NaiveDate::from_ymd_opt(2019, 1, 1)
                .unwrap()
                .and_hms_opt(23, 0, 0)
                .unwrap(),
            steps: 8,
            commands: vec![],
            no_controls: false,
            schedules: vec![],
            record: vec![],
        }
    }

    #[test]
    fn step_times_advance_by_the_step() {
        let s = scenario();
        assert_eq!(step_time(&s, 0), s.start_time);
        assert_eq!(
            step_time(&s, 5),
            NaiveDate::from_ymd_opt(2019, 1, 2)
                .unwrap()
                .and_hms_opt(0, 15, 0)
                .unwrap()
        );
    }

    #[test]
    fn hour_of_day_wraps_at_midnight() {
        let s = scenario();
        assert_eq!(hour_of(step_time(&s, 0)), 23.0);
        assert_eq!(hour_of(step_time(&s, 4)), 0.0);
        assert_eq!(hour_of(step_time(&s, 6)), 0.5);
    }
}
