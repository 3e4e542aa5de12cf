//! Result data types.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub type RunId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunManifest {
    pub run_id: RunId,
    /// Scenario name.
    pub scenario: String,
    /// Wall-clock time the run finished (RFC 3339).
    pub timestamp: String,
    pub steps: usize,
    pub time_step_s: f64,
    /// Engine backend tag (`dss`, `memory`).
    pub engine: String,
    /// Every recorded key, in record order.
    #[serde(default)]
    pub keys: Vec<String>,
}

/// Values sampled after one solve.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepRecord {
    pub step: usize,
    /// Simulated time of the step.
    pub time: NaiveDateTime,
    pub values: Vec<RecordedValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordedValue {
    pub key: String,
    pub value: f64,
}

impl RecordedValue {
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

impl StepRecord {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.iter().find(|v| v.key == key).map(|v| v.value)
    }
}
