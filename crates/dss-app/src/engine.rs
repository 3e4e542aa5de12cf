//! Engine selection and circuit bring-up.

use dss_circuit::{Circuit, CircuitOptions};
use dss_engine::{DssEngine, MemoryEngine};
use dss_scenario::{EngineDef, Scenario};
use tracing::info;

use crate::error::AppResult;

/// A circuit on whichever engine the scenario selected.
pub type DynCircuit = Circuit<Box<dyn DssEngine>>;

pub fn build_engine(engine: &EngineDef) -> AppResult<Box<dyn DssEngine>> {
    match engine {
        EngineDef::Memory => Ok(Box::new(MemoryEngine::new())),
        EngineDef::Dss => dss_engine(),
    }
}

#[cfg(feature = "capi")]
fn dss_engine() -> AppResult<Box<dyn DssEngine>> {
    Ok(Box::new(dss_engine::CApiEngine::start()?))
}

#[cfg(not(feature = "capi"))]
fn dss_engine() -> AppResult<Box<dyn DssEngine>> {
    Err(crate::error::AppError::EngineUnavailable {
        engine: EngineDef::Dss.tag().to_string(),
    })
}

pub fn circuit_options(scenario: &Scenario) -> CircuitOptions {
    CircuitOptions::new(
        scenario.redirects.clone(),
        scenario.time_step(),
        scenario.start_time,
    )
}

/// Compile the scenario's circuit, then run its one-off commands.
pub fn open_circuit(scenario: &Scenario) -> AppResult<DynCircuit> {
    let engine = build_engine(&scenario.engine)?;
    let mut circuit = Circuit::new(engine, circuit_options(scenario))?;
    for cmd in &scenario.commands {
        circuit.run_command(cmd)?;
    }
    info!(
        scenario = %scenario.name,
        engine = scenario.engine.tag(),
        commands = scenario.commands.len(),
        "circuit ready"
    );
    Ok(circuit)
}
