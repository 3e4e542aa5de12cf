//! Scenario schema definitions.

use chrono::NaiveDateTime;
use dss_core::{ElementClass, Time, s};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub version: u32,
    pub name: String,
    pub engine: EngineDef,
    /// Netlist (or snapshot) files, redirected in order.
    #[serde(default)]
    pub redirects: Vec<PathBuf>,
    pub time_step_s: f64,
    pub start_time: NaiveDateTime,
    pub steps: usize,
    /// Engine commands run once after the circuit is compiled.
    #[serde(default)]
    pub commands: Vec<String>,
    /// Solve without regulator and capacitor control actions.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_controls: bool,
    #[serde(default)]
    pub schedules: Vec<ScheduleDef>,
    #[serde(default)]
    pub record: Vec<RecordDef>,
}

impl Scenario {
    pub fn time_step(&self) -> Time {
        s(self.time_step_s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineDef {
    /// The DSS C-API shared library.
    Dss,
    /// The in-process snapshot backend; redirects name snapshot files.
    Memory,
}

impl EngineDef {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Dss => "dss",
            Self::Memory => "memory",
        }
    }
}

/// Daily setpoint profile for one element.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleDef {
    pub element: String,
    pub class: ElementClass,
    pub points: Vec<SetpointDef>,
    /// Storage rating override (kW); the unit's `kWrated` otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rated_kw: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SetpointDef {
    /// Hour of day the setpoint takes effect, in `[0, 24)`.
    pub hour: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_kw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q_kvar: Option<f64>,
}

/// One quantity sampled after every step.
///
/// Element quantities need `element` and `class`, bus quantities `bus`;
/// circuit quantities need neither.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<ElementClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus: Option<String>,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub quantity: Quantity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    /// Per-unit voltage magnitude of every phase.
    VoltagePu,
    /// Mean per-unit voltage magnitude over phases.
    VoltageAvgPu,
    /// Per-phase `(P, Q)`.
    Power,
    /// `(P, Q)` summed over phases.
    PowerTotal,
    /// Current magnitude of every phase.
    CurrentMag,
    Tap,
    IsOpen,
    /// Numeric element property.
    Property(String),
    /// Power drawn by the whole circuit.
    CircuitPower,
    Losses,
}

impl Quantity {
    pub fn name(&self) -> String {
        match self {
            Self::VoltagePu => "voltage_pu".into(),
            Self::VoltageAvgPu => "voltage_avg_pu".into(),
            Self::Power => "power".into(),
            Self::PowerTotal => "power_total".into(),
            Self::CurrentMag => "current_mag".into(),
            Self::Tap => "tap".into(),
            Self::IsOpen => "is_open".into(),
            Self::Property(prop) => prop.clone(),
            Self::CircuitPower => "circuit_power".into(),
            Self::Losses => "losses".into(),
        }
    }

    pub fn is_circuit_level(&self) -> bool {
        matches!(self, Self::CircuitPower | Self::Losses)
    }

    /// Quantities that can be read from a bus.
    pub fn applies_to_bus(&self) -> bool {
        matches!(self, Self::VoltagePu | Self::VoltageAvgPu)
    }
}

impl RecordDef {
    pub fn element(class: ElementClass, name: impl Into<String>, quantity: Quantity) -> Self {
        Self {
            element: Some(name.into()),
            class: Some(class),
            bus: None,
            quantity,
        }
    }

    pub fn bus(bus: impl Into<String>, quantity: Quantity) -> Self {
        Self {
            element: None,
            class: None,
            bus: Some(bus.into()),
            quantity,
        }
    }

    pub fn circuit(quantity: Quantity) -> Self {
        Self {
            element: None,
            class: None,
            bus: None,
            quantity,
        }
    }

    /// Key prefix of the values this record produces.
    pub fn key(&self) -> String {
        let quantity = self.quantity.name();
        match (&self.element, &self.class, &self.bus) {
            (Some(name), Some(class), _) => format!("{}.{}.{quantity}", class.dss_name(), name),
            (_, _, Some(bus)) => format!("bus.{bus}.{quantity}"),
            _ => format!("circuit.{quantity}"),
        }
    }
}
