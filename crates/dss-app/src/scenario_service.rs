//! Scenario loading and validation.

use std::path::Path;

use dss_scenario::{Scenario, ScenarioError};

use crate::error::{AppError, AppResult};

/// Load a scenario file; relative redirects come back resolved against the
/// scenario's directory.
pub fn load_scenario(path: &Path) -> AppResult<Scenario> {
    match dss_scenario::load_yaml(path) {
        Err(ScenarioError::Io(source)) => Err(AppError::ScenarioFileRead {
            path: path.to_path_buf(),
            source,
        }),
        result => Ok(result?),
    }
}

/// Validate a scenario, including that every redirect file exists.
pub fn validate_scenario(scenario: &Scenario) -> AppResult<()> {
    dss_scenario::validate_scenario(scenario)?;
    for redirect in &scenario.redirects {
        if !redirect.is_file() {
            return Err(AppError::Validation(format!(
                "redirect file not found: {}",
                redirect.display()
            )));
        }
    }
    Ok(())
}
