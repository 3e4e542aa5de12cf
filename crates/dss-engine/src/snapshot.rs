//! Serialized circuit state for the in-memory backend.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A solved circuit frozen to a file: bus voltages plus per-element arrays
/// and properties, as an engine would report them after one solve.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CircuitSnapshot {
    pub name: String,
    #[serde(default)]
    pub buses: Vec<BusSnapshot>,
    #[serde(default)]
    pub elements: Vec<ElementSnapshot>,
    /// Circuit losses `(W, var)`.
    #[serde(default)]
    pub losses: (f64, f64),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusSnapshot {
    pub name: String,
    /// Line-to-neutral base voltage in kV.
    pub kv_base: f64,
    /// Node numbers in array order. Defaults to `1..=voltages.len()`.
    #[serde(default)]
    pub nodes: Vec<usize>,
    /// Node voltages `(re, im)` in volts.
    pub voltages: Vec<(f64, f64)>,
}

impl BusSnapshot {
    pub fn node_numbers(&self) -> Vec<usize> {
        if self.nodes.is_empty() {
            (1..=self.voltages.len()).collect()
        } else {
            self.nodes.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementSnapshot {
    /// Engine class name (`Load`, `Line`, `Storage`, ...).
    pub class: String,
    pub name: String,
    #[serde(default)]
    pub phases: Option<usize>,
    /// One bus per terminal, with optional node suffixes.
    #[serde(default)]
    pub buses: Vec<String>,
    /// Flat `P, Q` array (kW/kvar), all terminals.
    #[serde(default)]
    pub powers: Vec<f64>,
    /// Flat `re, im` current array (A), all terminals.
    #[serde(default)]
    pub currents: Vec<f64>,
    /// Declared properties in index order.
    #[serde(default)]
    pub properties: Vec<(String, String)>,
    #[serde(default)]
    pub tap: Option<i32>,
    #[serde(default)]
    pub pt_ratio: Option<f64>,
}

impl CircuitSnapshot {
    /// Read a snapshot from `.json`, `.yaml` or `.yml`.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(serde_json::from_str(&content)?),
            "yaml" | "yml" => Ok(serde_yaml::from_str(&content)?),
            _ => Err(EngineError::Snapshot {
                message: format!(
                    "{}: expected a .json or .yaml snapshot; netlist scripts need the capi backend",
                    path.display()
                ),
            }),
        }
    }

    pub fn save_json(&self, path: &Path) -> EngineResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Split `671.1.2.3` into the bus name and its node list.
pub fn split_bus_nodes(spec: &str) -> (String, Vec<usize>) {
    let mut parts = spec.split('.');
    let bus = parts.next().unwrap_or_default().to_ascii_lowercase();
    let nodes = parts.filter_map(|p| p.parse().ok()).collect();
    (bus, nodes)
}
