//! dss-scenario: scenario file format and validation.
//!
//! A scenario names the circuit files to compile, the solver clock (start
//! time, step, number of steps), setpoint schedules applied while stepping,
//! and the quantities recorded after every step.

pub mod schedule;
pub mod schema;
pub mod validate;

pub use schedule::hour_of_day;
pub use schema::*;
pub use validate::{LATEST_VERSION, ValidationError, validate_scenario};

use std::path::Path;

pub type ScenarioResult<T> = Result<T, ScenarioError>;

#[derive(thiserror::Error, Debug)]
pub enum ScenarioError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Make relative redirects relative to `base` (the scenario's directory).
pub fn resolve_paths(scenario: &mut Scenario, base: &Path) {
    for redirect in &mut scenario.redirects {
        if redirect.is_relative() {
            *redirect = base.join(&*redirect);
        }
    }
}

/// Read and validate a scenario. Relative redirects are resolved against
/// the file's directory.
pub fn load_yaml(path: &Path) -> ScenarioResult<Scenario> {
    let content = std::fs::read_to_string(path)?;
    let mut scenario: Scenario = serde_yaml::from_str(&content)?;
    validate_scenario(&scenario)?;
    if let Some(dir) = path.parent() {
        resolve_paths(&mut scenario, dir);
    }
    Ok(scenario)
}

pub fn save_yaml(path: &Path, scenario: &Scenario) -> ScenarioResult<()> {
    validate_scenario(scenario)?;
    let content = serde_yaml::to_string(scenario)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Canonical JSON form, used for content hashing.
pub fn to_canonical_json(scenario: &Scenario) -> ScenarioResult<String> {
    Ok(serde_json::to_string(scenario)?)
}
