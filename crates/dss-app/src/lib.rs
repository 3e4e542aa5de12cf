//! Shared application service layer for dsstap.
//!
//! Frontends go through this crate to load scenarios, bring circuits up in an
//! engine, run the step loop with caching, and query stored runs.

pub mod engine;
pub mod error;
pub mod progress;
pub mod query;
pub mod record;
pub mod run_service;
pub mod scenario_service;

pub use engine::{DynCircuit, build_engine, circuit_options, open_circuit};
pub use error::{AppError, AppResult};
pub use progress::{RunProgressEvent, RunStage};
pub use query::{CircuitSummary, circuit_summary, extract_series};
pub use record::{flatten_reading, sample_record};
pub use run_service::{
    RunOptions, RunRequest, RunResponse, RunTimingSummary, ensure_run, ensure_run_with_progress,
    list_runs, load_run, step_time,
};
pub use scenario_service::{load_scenario, validate_scenario};
