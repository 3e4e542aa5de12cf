//! Error types for the dss-app service layer.

use std::path::PathBuf;

/// Application error wrapping the backend crates' errors for the CLI.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Scenario error: {0}")]
    Scenario(String),

    #[error("Failed to read scenario file: {path}")]
    ScenarioFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Scenario validation failed: {0}")]
    Validation(String),

    #[error("Engine '{engine}' is not available in this build (enable the `capi` feature)")]
    EngineUnavailable { engine: String },

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Circuit error: {0}")]
    Circuit(String),

    #[error("Failed to record {key}: {message}")]
    Record { key: String, message: String },

    #[error("Results error: {0}")]
    Results(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<dss_scenario::ScenarioError> for AppError {
    fn from(err: dss_scenario::ScenarioError) -> Self {
        match err {
            dss_scenario::ScenarioError::Validation(e) => AppError::Validation(e.to_string()),
            other => AppError::Scenario(other.to_string()),
        }
    }
}

impl From<dss_scenario::ValidationError> for AppError {
    fn from(err: dss_scenario::ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<dss_engine::EngineError> for AppError {
    fn from(err: dss_engine::EngineError) -> Self {
        AppError::Engine(err.to_string())
    }
}

impl From<dss_circuit::CircuitError> for AppError {
    fn from(err: dss_circuit::CircuitError) -> Self {
        AppError::Circuit(err.to_string())
    }
}

impl From<dss_results::ResultsError> for AppError {
    fn from(err: dss_results::ResultsError) -> Self {
        match err {
            dss_results::ResultsError::RunNotFound { run_id } => AppError::RunNotFound(run_id),
            other => AppError::Results(other.to_string()),
        }
    }
}
