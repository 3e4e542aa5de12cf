//! Construction options and query flags.

use chrono::{Datelike, NaiveDateTime, Timelike};
use dss_core::{Time, as_seconds};
use std::path::PathBuf;

/// Everything needed to bring a circuit up in the engine.
#[derive(Clone, Debug)]
pub struct CircuitOptions {
    /// Netlist files, redirected in order.
    pub redirects: Vec<PathBuf>,
    /// Solver step for every `run_dss` after construction.
    pub time_step: Time,
    /// Positions the yearly-mode clock.
    pub start_time: NaiveDateTime,
}

impl CircuitOptions {
    pub fn new(redirects: Vec<PathBuf>, time_step: Time, start_time: NaiveDateTime) -> Self {
        Self {
            redirects,
            time_step,
            start_time,
        }
    }

    /// Hour of year of `start_time` (0 on January 1st, midnight).
    pub fn start_hour(&self) -> u32 {
        self.start_time.ordinal0() * 24 + self.start_time.hour()
    }

    pub fn step_seconds(&self) -> f64 {
        as_seconds(self.time_step)
    }
}

/// Flags for bus and element voltage queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoltageQuery {
    /// 1-based phase (node position) to select.
    pub phase: Option<usize>,
    pub per_unit: bool,
    pub polar: bool,
    /// Drop angles; only meaningful with `polar`.
    pub magnitude_only: bool,
    /// Average the magnitudes of all nodes; needs `polar && magnitude_only`.
    pub average: bool,
    /// Treat a (near) zero magnitude as an error; needs `polar`.
    pub zero_voltage_error: bool,
}

impl Default for VoltageQuery {
    fn default() -> Self {
        Self {
            phase: None,
            per_unit: true,
            polar: true,
            magnitude_only: true,
            average: false,
            zero_voltage_error: false,
        }
    }
}

impl VoltageQuery {
    pub fn phase(mut self, phase: usize) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn volts(mut self) -> Self {
        self.per_unit = false;
        self
    }

    pub fn rectangular(mut self) -> Self {
        self.polar = false;
        self
    }

    /// Keep angles alongside magnitudes.
    pub fn with_angles(mut self) -> Self {
        self.magnitude_only = false;
        self
    }

    pub fn average(mut self) -> Self {
        self.average = true;
        self
    }

    pub fn zero_voltage_error(mut self) -> Self {
        self.zero_voltage_error = true;
        self
    }

    /// Whether readings are bare magnitudes.
    pub fn scalar(&self) -> bool {
        self.polar && self.magnitude_only
    }
}

/// Flags for element power queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PowerQuery {
    pub phase: Option<usize>,
    /// Sum P and Q over phases.
    pub total: bool,
    /// Terminal of a branch element (1 or 2).
    pub terminal: usize,
}

impl Default for PowerQuery {
    fn default() -> Self {
        Self {
            phase: None,
            total: false,
            terminal: 1,
        }
    }
}

impl PowerQuery {
    pub fn phase(mut self, phase: usize) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn total(mut self) -> Self {
        self.total = true;
        self
    }

    pub fn terminal(mut self, terminal: usize) -> Self {
        self.terminal = terminal;
        self
    }
}

/// Flags for element current queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentQuery {
    pub polar: bool,
    pub magnitude_only: bool,
    pub terminal: usize,
    pub phase: Option<usize>,
    /// Sum magnitudes over phases; needs `polar && magnitude_only`.
    pub total: bool,
}

impl Default for CurrentQuery {
    fn default() -> Self {
        Self {
            polar: true,
            magnitude_only: true,
            terminal: 1,
            phase: None,
            total: false,
        }
    }
}

impl CurrentQuery {
    pub fn phase(mut self, phase: usize) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn total(mut self) -> Self {
        self.total = true;
        self
    }

    pub fn terminal(mut self, terminal: usize) -> Self {
        self.terminal = terminal;
        self
    }

    pub fn rectangular(mut self) -> Self {
        self.polar = false;
        self
    }

    pub fn with_angles(mut self) -> Self {
        self.magnitude_only = false;
        self
    }

    pub fn scalar(&self) -> bool {
        self.polar && self.magnitude_only
    }
}

/// A switchable conductor. `phase == 0` means every conductor of the
/// terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwitchPoint {
    pub terminal: usize,
    pub phase: usize,
}

impl Default for SwitchPoint {
    fn default() -> Self {
        Self {
            terminal: 1,
            phase: 0,
        }
    }
}

impl SwitchPoint {
    pub fn new(terminal: usize, phase: usize) -> Self {
        Self { terminal, phase }
    }
}
