//! Engine trait.

use crate::error::EngineResult;
use dss_core::{ElementClass, ElementRef};

/// Which of the four bus voltage arrays to fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoltageForm {
    /// Per-unit magnitude and angle (degrees).
    PuMagAngle,
    /// Magnitude (volts) and angle (degrees).
    MagAngle,
    /// Per-unit real and imaginary parts.
    PuRect,
    /// Real and imaginary parts in volts.
    Rect,
}

impl VoltageForm {
    pub fn select(per_unit: bool, polar: bool) -> Self {
        match (polar, per_unit) {
            (true, true) => Self::PuMagAngle,
            (true, false) => Self::MagAngle,
            (false, true) => Self::PuRect,
            (false, false) => Self::Rect,
        }
    }

    pub fn is_polar(self) -> bool {
        matches!(self, Self::PuMagAngle | Self::MagAngle)
    }
}

/// Flat per-terminal arrays of the active element.
///
/// All arrays interleave two values per conductor, terminal after terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementArray {
    /// `P, Q` in kW/kvar, positive into the element.
    Powers,
    /// Current real/imaginary parts (A).
    Currents,
    /// Current magnitude (A) and angle (degrees).
    CurrentsMagAng,
    /// Terminal voltage real/imaginary parts (V).
    Voltages,
    /// Terminal voltage magnitude (V) and angle (degrees).
    VoltagesMagAng,
}

/// Solve flavour for one time step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveMode {
    Normal,
    /// Skip control actions (regulators, capacitor controls).
    NoControl,
}

/// Calls made into a power-flow engine.
///
/// The engine keeps a process-wide "active" bus, element and class; most
/// methods act on whatever was last selected. Implementations are not
/// required to be thread-safe: one engine session is driven by one caller.
pub trait DssEngine {
    /// Backend name (for logging).
    fn backend_name(&self) -> &'static str;

    /// Run a scripting-language command. Returns the engine's result text,
    /// which is empty for most commands.
    fn command(&mut self, cmd: &str) -> EngineResult<String>;

    /// Name of the compiled circuit.
    fn circuit_name(&mut self) -> EngineResult<String>;

    fn all_bus_names(&mut self) -> EngineResult<Vec<String>>;

    /// `Class.name` of every element in the circuit.
    fn all_element_names(&mut self) -> EngineResult<Vec<String>>;

    /// Bare names of every element of one class.
    fn class_element_names(&mut self, class: &ElementClass) -> EngineResult<Vec<String>>;

    /// Make `bus` the active bus. Returns false when no such bus exists.
    fn set_active_bus(&mut self, bus: &str) -> EngineResult<bool>;

    /// Number of nodes (energized phases) at the active bus.
    fn bus_num_nodes(&mut self) -> EngineResult<usize>;

    /// Voltage array of the active bus, two values per node.
    fn bus_voltages(&mut self, form: VoltageForm) -> EngineResult<Vec<f64>>;

    /// Try to make `element` active. Returns the element the engine reports
    /// as active afterwards, or `None` when it does not exist.
    fn set_active_element(&mut self, element: &ElementRef) -> EngineResult<Option<ElementRef>>;

    /// Bus connections of the active element, one per terminal, with node
    /// suffixes as declared (`671.1.2.3`).
    fn element_bus_names(&mut self) -> EngineResult<Vec<String>>;

    fn element_num_phases(&mut self) -> EngineResult<usize>;

    fn element_array(&mut self, array: ElementArray) -> EngineResult<Vec<f64>>;

    /// Declared property names of the active element, in index order.
    fn element_property_names(&mut self) -> EngineResult<Vec<String>>;

    /// Property of the active element by 0-based index.
    fn property_value(&mut self, index: usize) -> EngineResult<String>;

    fn set_property_value(&mut self, index: usize, value: &str) -> EngineResult<()>;

    /// Open a conductor of the active element. `phase == 0` opens all.
    fn open_terminal(&mut self, terminal: usize, phase: usize) -> EngineResult<()>;

    /// Close a conductor of the active element. `phase == 0` closes all.
    fn close_terminal(&mut self, terminal: usize, phase: usize) -> EngineResult<()>;

    /// Whether a conductor is open. `phase == 0` asks about any conductor.
    fn is_open(&mut self, terminal: usize, phase: usize) -> EngineResult<bool>;

    /// Active-power setpoint (kW) of the active load/PV/generator.
    fn set_kw(&mut self, kw: f64) -> EngineResult<()>;

    /// Reactive-power setpoint (kvar) of the active load/PV/generator.
    fn set_kvar(&mut self, kvar: f64) -> EngineResult<()>;

    /// Tap position of the active regulator control.
    fn tap_number(&mut self) -> EngineResult<i32>;

    fn set_tap_number(&mut self, tap: i32) -> EngineResult<()>;

    /// PT ratio of the active capacitor control.
    fn pt_ratio(&mut self) -> EngineResult<f64>;

    fn set_pt_ratio(&mut self, ratio: f64) -> EngineResult<()>;

    /// Solve one step. Returns the engine's status text (empty on success).
    fn solve(&mut self, mode: SolveMode) -> EngineResult<String>;

    /// Push storage state (energy stored) forward after a solve.
    fn update_storage(&mut self) -> EngineResult<()>;

    fn set_solution_number(&mut self, number: u32) -> EngineResult<()>;

    /// Solver clock hour (hour of year in yearly mode).
    fn set_hour(&mut self, hour: u32) -> EngineResult<()>;

    fn set_step_size(&mut self, seconds: f64) -> EngineResult<()>;

    /// Total power delivered by the source, `[P, Q]` in kW/kvar
    /// (negative when the circuit consumes).
    fn total_power(&mut self) -> EngineResult<Vec<f64>>;

    /// Circuit losses `(W, var)`.
    fn losses(&mut self) -> EngineResult<(f64, f64)>;
}

impl<E: DssEngine + ?Sized> DssEngine for Box<E> {
    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
    fn command(&mut self, cmd: &str) -> EngineResult<String> {
        (**self).command(cmd)
    }
    fn circuit_name(&mut self) -> EngineResult<String> {
        (**self).circuit_name()
    }
    fn all_bus_names(&mut self) -> EngineResult<Vec<String>> {
        (**self).all_bus_names()
    }
    fn all_element_names(&mut self) -> EngineResult<Vec<String>> {
        (**self).all_element_names()
    }
    fn class_element_names(&mut self, class: &ElementClass) -> EngineResult<Vec<String>> {
        (**self).class_element_names(class)
    }
    fn set_active_bus(&mut self, bus: &str) -> EngineResult<bool> {
        (**self).set_active_bus(bus)
    }
    fn bus_num_nodes(&mut self) -> EngineResult<usize> {
        (**self).bus_num_nodes()
    }
    fn bus_voltages(&mut self, form: VoltageForm) -> EngineResult<Vec<f64>> {
        (**self).bus_voltages(form)
    }
    fn set_active_element(&mut self, element: &ElementRef) -> EngineResult<Option<ElementRef>> {
        (**self).set_active_element(element)
    }
    fn element_bus_names(&mut self) -> EngineResult<Vec<String>> {
        (**self).element_bus_names()
    }
    fn element_num_phases(&mut self) -> EngineResult<usize> {
        (**self).element_num_phases()
    }
    fn element_array(&mut self, array: ElementArray) -> EngineResult<Vec<f64>> {
        (**self).element_array(array)
    }
    fn element_property_names(&mut self) -> EngineResult<Vec<String>> {
        (**self).element_property_names()
    }
    fn property_value(&mut self, index: usize) -> EngineResult<String> {
        (**self).property_value(index)
    }
    fn set_property_value(&mut self, index: usize, value: &str) -> EngineResult<()> {
        (**self).set_property_value(index, value)
    }
    fn open_terminal(&mut self, terminal: usize, phase: usize) -> EngineResult<()> {
        (**self).open_terminal(terminal, phase)
    }
    fn close_terminal(&mut self, terminal: usize, phase: usize) -> EngineResult<()> {
        (**self).close_terminal(terminal, phase)
    }
    fn is_open(&mut self, terminal: usize, phase: usize) -> EngineResult<bool> {
        (**self).is_open(terminal, phase)
    }
    fn set_kw(&mut self, kw: f64) -> EngineResult<()> {
        (**self).set_kw(kw)
    }
    fn set_kvar(&mut self, kvar: f64) -> EngineResult<()> {
        (**self).set_kvar(kvar)
    }
    fn tap_number(&mut self) -> EngineResult<i32> {
        (**self).tap_number()
    }
    fn set_tap_number(&mut self, tap: i32) -> EngineResult<()> {
        (**self).set_tap_number(tap)
    }
    fn pt_ratio(&mut self) -> EngineResult<f64> {
        (**self).pt_ratio()
    }
    fn set_pt_ratio(&mut self, ratio: f64) -> EngineResult<()> {
        (**self).set_pt_ratio(ratio)
    }
    fn solve(&mut self, mode: SolveMode) -> EngineResult<String> {
        (**self).solve(mode)
    }
    fn update_storage(&mut self) -> EngineResult<()> {
        (**self).update_storage()
    }
    fn set_solution_number(&mut self, number: u32) -> EngineResult<()> {
        (**self).set_solution_number(number)
    }
    fn set_hour(&mut self, hour: u32) -> EngineResult<()> {
        (**self).set_hour(hour)
    }
    fn set_step_size(&mut self, seconds: f64) -> EngineResult<()> {
        (**self).set_step_size(seconds)
    }
    fn total_power(&mut self) -> EngineResult<Vec<f64>> {
        (**self).total_power()
    }
    fn losses(&mut self) -> EngineResult<(f64, f64)> {
        (**self).losses()
    }
}
