//! Circuit introspection and stored-series queries.

use std::path::Path;

use chrono::NaiveDateTime;
use dss_circuit::{CircuitInfo, VoltageQuery};
use dss_core::Reading;
use dss_engine::DssEngine;
use dss_scenario::Scenario;

use crate::engine;
use crate::error::AppResult;
use crate::run_service;

/// What `info` reports about a compiled circuit.
#[derive(Debug, Clone)]
pub struct CircuitSummary {
    pub name: String,
    pub buses: Vec<String>,
    pub info: CircuitInfo,
    /// Per-unit voltages of the first bus.
    pub first_bus: Option<(String, Reading)>,
}

/// Compile the scenario's circuit, solve one step and summarize it.
pub fn circuit_summary(scenario: &Scenario) -> AppResult<CircuitSummary> {
    let mut circuit = engine::open_circuit(scenario)?;
    circuit.run_dss(scenario.no_controls)?;

    let name = circuit.engine_mut().circuit_name()?;
    let buses = circuit.get_all_buses()?;
    let info = circuit.get_circuit_info()?;
    let first_bus = match buses.first() {
        Some(bus) => {
            let reading = circuit.get_bus_voltage(bus, VoltageQuery::default())?;
            Some((bus.clone(), reading))
        }
        None => None,
    };
    Ok(CircuitSummary {
        name,
        buses,
        info,
        first_bus,
    })
}

/// `(time, value)` points of one recorded key of a stored run.
pub fn extract_series(
    scenario_path: &Path,
    run_id: &str,
    key: &str,
) -> AppResult<Vec<(NaiveDateTime, f64)>> {
    let (_manifest, records) = run_service::load_run(scenario_path, run_id)?;
    Ok(dss_results::extract_series(run_id, &records, key)?)
}
