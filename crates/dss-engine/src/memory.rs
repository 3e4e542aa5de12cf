//! In-process engine backed by a circuit snapshot.
//!
//! `MemoryEngine` answers every [`DssEngine`] call from a [`CircuitSnapshot`]:
//! bus voltages are fixed at their snapshot values (there is no power-flow
//! iteration here), while loads, generators, PV and storage re-derive their
//! terminal powers and currents from their properties on every solve. Storage
//! energy is integrated over the step by [`DssEngine::update_storage`].
//!
//! The backend is used for tests and for replaying scenarios on machines
//! without the engine library. It is NOT a power-flow solver.

use crate::error::{EngineError, EngineResult};
use crate::model::{DssEngine, ElementArray, SolveMode, VoltageForm};
use crate::script::{Command, parse_command};
use crate::snapshot::{BusSnapshot, CircuitSnapshot, ElementSnapshot, split_bus_nodes};
use dss_core::{ElementClass, ElementRef, from_polar_deg, to_polar_deg};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

const BACKEND: &str = "memory";

/// Error number reported for injected solve failures.
pub const INJECTED_SOLVE_ERROR: i32 = 485;

#[derive(Debug, Clone)]
struct ElementState {
    class: ElementClass,
    name: String,
    phases: usize,
    buses: Vec<String>,
    powers: Vec<f64>,
    currents: Vec<f64>,
    // Snapshot arrays of branch elements, restored when conductors close.
    base_powers: Vec<f64>,
    base_currents: Vec<f64>,
    properties: Vec<(String, String)>,
    // (terminal, phase), both 1-based.
    open: BTreeSet<(usize, usize)>,
    tap: i32,
    pt_ratio: f64,
}

impl ElementState {
    fn new(class: ElementClass, name: &str) -> Self {
        let phases = match class {
            ElementClass::RegControl | ElementClass::CapControl | ElementClass::Other(_) => 0,
            _ => 3,
        };
        let mut el = Self {
            class,
            name: name.to_ascii_lowercase(),
            phases,
            buses: Vec::new(),
            powers: Vec::new(),
            currents: Vec::new(),
            base_powers: Vec::new(),
            base_currents: Vec::new(),
            properties: Vec::new(),
            open: BTreeSet::new(),
            tap: 0,
            pt_ratio: 60.0,
        };
        el.resize_arrays();
        el
    }

    fn from_snapshot(snap: ElementSnapshot) -> EngineResult<Self> {
        let class: ElementClass = snap.class.parse().map_err(|e: dss_core::DssError| {
            EngineError::Snapshot {
                message: format!("element {}: {}", snap.name, e),
            }
        })?;
        let mut el = Self::new(class, &snap.name);
        for (key, value) in &snap.properties {
            el.set_prop(key, value);
        }
        if let Some(phases) = snap.phases {
            el.phases = phases;
        }
        if !snap.buses.is_empty() {
            el.buses = snap.buses.clone();
        }
        el.powers = snap.powers;
        el.currents = snap.currents;
        el.resize_arrays();
        el.base_powers = el.powers.clone();
        el.base_currents = el.currents.clone();
        if let Some(tap) = snap.tap {
            el.tap = tap;
        }
        if let Some(ratio) = snap.pt_ratio {
            el.pt_ratio = ratio;
        }
        Ok(el)
    }

    fn terminals(&self) -> usize {
        if self.phases == 0 {
            0
        } else if self.class.is_branch() {
            2
        } else {
            1
        }
    }

    fn array_len(&self) -> usize {
        2 * self.phases * self.terminals()
    }

    fn resize_arrays(&mut self) {
        let len = self.array_len();
        self.powers.resize(len, 0.0);
        self.currents.resize(len, 0.0);
        self.base_powers.resize(len, 0.0);
        self.base_currents.resize(len, 0.0);
    }

    fn prop_index(&self, key: &str) -> Option<usize> {
        self.properties
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))
    }

    fn prop(&self, key: &str) -> Option<&str> {
        self.prop_index(key).map(|i| self.properties[i].1.as_str())
    }

    fn prop_f64(&self, key: &str) -> Option<f64> {
        self.prop(key).and_then(|v| v.trim().parse().ok())
    }

    fn set_prop(&mut self, key: &str, value: &str) {
        match self.prop_index(key) {
            Some(i) => self.properties[i].1 = value.to_string(),
            None => self
                .properties
                .push((key.to_string(), value.to_string())),
        }
        self.sync_from_prop(key, value);
    }

    // Properties that change the element's shape or controller state.
    fn sync_from_prop(&mut self, key: &str, value: &str) {
        match key.to_ascii_lowercase().as_str() {
            "phases" => {
                if let Ok(phases) = value.trim().parse() {
                    self.phases = phases;
                    self.resize_arrays();
                }
            }
            "bus1" => self.set_bus(0, value),
            "bus2" => self.set_bus(1, value),
            "tapnum" => {
                if let Ok(tap) = value.trim().parse() {
                    self.tap = tap;
                }
            }
            "ptratio" => {
                if let Ok(ratio) = value.trim().parse() {
                    self.pt_ratio = ratio;
                }
            }
            _ => {}
        }
    }

    fn set_bus(&mut self, index: usize, value: &str) {
        if self.buses.len() <= index {
            self.buses.resize(index + 1, String::new());
        }
        self.buses[index] = value.to_string();
    }

    fn bus_spec(&self, terminal: usize) -> Option<&str> {
        self.buses.get(terminal).map(String::as_str)
    }

    fn is_conductor_open(&self, terminal: usize, phase: usize) -> bool {
        self.open.contains(&(terminal, phase))
    }

    fn full_name(&self) -> String {
        format!("{}.{}", self.class.dss_name(), self.name)
    }

    /// Net `(P, Q)` into terminal 1, positive when consuming.
    fn terminal_one_power(&self) -> (f64, f64) {
        self.powers
            .chunks_exact(2)
            .take(self.phases)
            .fold((0.0, 0.0), |(p, q), c| (p + c[0], q + c[1]))
    }
}

/// Node voltage `(re, im)` for conductor `k` of an element bus connection.
fn conductor_voltage(buses: &[BusSnapshot], spec: &str, k: usize) -> Option<(f64, f64)> {
    let (bus_name, nodes) = split_bus_nodes(spec);
    let bus = buses.iter().find(|b| b.name.eq_ignore_ascii_case(&bus_name))?;
    let node = nodes.get(k).copied().unwrap_or(k + 1);
    let pos = bus.node_numbers().iter().position(|n| *n == node)?;
    bus.voltages.get(pos).copied()
}

/// Split a total setpoint evenly over closed conductors of terminal 1 and
/// derive currents from the bus voltages.
fn dispatch_terminal_power(el: &mut ElementState, buses: &[BusSnapshot], p_kw: f64, q_kvar: f64) {
    let phases = el.phases;
    if phases == 0 {
        return;
    }
    let spec = el.bus_spec(0).unwrap_or_default().to_string();
    let per_p = p_kw / phases as f64;
    let per_q = q_kvar / phases as f64;
    for k in 0..phases {
        let (p, q) = if el.is_conductor_open(1, k + 1) {
            (0.0, 0.0)
        } else {
            (per_p, per_q)
        };
        el.powers[2 * k] = p;
        el.powers[2 * k + 1] = q;

        let (ir, ii) = match conductor_voltage(buses, &spec, k) {
            Some((vr, vi)) if vr.hypot(vi) > 0.0 => {
                // I = conj(S / V) = conj(S) * V / |V|^2
                let (a, b) = (p * 1000.0, q * 1000.0);
                let v2 = vr * vr + vi * vi;
                ((a * vr + b * vi) / v2, (a * vi - b * vr) / v2)
            }
            _ => (0.0, 0.0),
        };
        el.currents[2 * k] = ir;
        el.currents[2 * k + 1] = ii;
    }
}

/// Branch elements keep their snapshot flows; open conductors carry nothing.
fn restore_branch_flows(el: &mut ElementState) {
    el.powers.clone_from(&el.base_powers);
    el.currents.clone_from(&el.base_currents);
    let phases = el.phases;
    for terminal in 1..=el.terminals() {
        for phase in 1..=phases {
            if el.is_conductor_open(terminal, phase) {
                for t in 0..el.terminals() {
                    let idx = 2 * (t * phases + phase - 1);
                    el.powers[idx] = 0.0;
                    el.powers[idx + 1] = 0.0;
                    el.currents[idx] = 0.0;
                    el.currents[idx + 1] = 0.0;
                }
            }
        }
    }
}

/// Storage terminal power `(P, Q)`, positive when charging.
fn storage_output(el: &ElementState) -> (f64, f64) {
    let state = el.prop("State").unwrap_or("idling").to_ascii_lowercase();
    let rated = el.prop_f64("kWrated").unwrap_or(25.0);
    let stored = el.prop_f64("%stored").unwrap_or(100.0);
    let reserve = el.prop_f64("%reserve").unwrap_or(20.0);
    let p = match state.as_str() {
        "charging" if stored < 100.0 => rated * el.prop_f64("%charge").unwrap_or(100.0) / 100.0,
        "discharging" if stored > reserve => {
            -rated * el.prop_f64("%discharge").unwrap_or(100.0) / 100.0
        }
        "charging" | "discharging" => 0.0,
        _ => -el.prop_f64("kW").unwrap_or(0.0),
    };
    let pf = el.prop_f64("pf").unwrap_or(1.0);
    let q = if p == 0.0 || pf.abs() >= 1.0 || pf == 0.0 {
        0.0
    } else {
        let mag = p.abs() * pf.abs().acos().tan();
        if pf > 0.0 { mag * p.signum() } else { -mag * p.signum() }
    };
    (p, q)
}

fn element_voltages(el: &ElementState, buses: &[BusSnapshot]) -> Vec<f64> {
    let mut out = Vec::with_capacity(el.array_len());
    for terminal in 0..el.terminals() {
        let spec = el.bus_spec(terminal).unwrap_or_default();
        for k in 0..el.phases {
            let (vr, vi) = conductor_voltage(buses, spec, k).unwrap_or((0.0, 0.0));
            out.push(vr);
            out.push(vi);
        }
    }
    out
}

fn to_mag_ang(flat: &[f64]) -> Vec<f64> {
    flat.chunks_exact(2)
        .flat_map(|c| {
            let (mag, ang) = to_polar_deg(c[0], c[1]);
            [mag, ang]
        })
        .collect()
}

/// Snapshot-backed engine session.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    circuit_name: String,
    buses: Vec<BusSnapshot>,
    elements: Vec<ElementState>,
    losses: (f64, f64),
    options: Vec<(String, String)>,
    active_bus: Option<usize>,
    active_element: Option<usize>,
    hour: f64,
    step_s: f64,
    last_step_s: f64,
    solution_number: u32,
    solve_count: usize,
    fail_next_solve: Option<String>,
    command_log: Vec<String>,
}

impl MemoryEngine {
    /// An empty engine; circuits arrive through `Redirect`/`Compile` of a
    /// snapshot file.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: CircuitSnapshot) -> EngineResult<Self> {
        let mut engine = Self::new();
        engine.load_snapshot(snapshot, true)?;
        Ok(engine)
    }

    pub fn from_snapshot_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        Self::from_snapshot(CircuitSnapshot::load(path.as_ref())?)
    }

    fn load_snapshot(&mut self, snapshot: CircuitSnapshot, replace: bool) -> EngineResult<()> {
        if replace {
            self.buses.clear();
            self.elements.clear();
            self.active_bus = None;
            self.active_element = None;
        }
        if replace || self.circuit_name.is_empty() {
            self.circuit_name = snapshot.name.to_ascii_lowercase();
        }
        self.buses.extend(snapshot.buses);
        for snap in snapshot.elements {
            let el = ElementState::from_snapshot(snap)?;
            if self.find_element(&el.class, &el.name).is_some() {
                return Err(EngineError::Snapshot {
                    message: format!("duplicate element {}", el.full_name()),
                });
            }
            self.elements.push(el);
        }
        if replace {
            self.losses = snapshot.losses;
        }
        Ok(())
    }

    /// Make the next [`DssEngine::solve`] fail with `message`.
    pub fn fail_next_solve(&mut self, message: impl Into<String>) {
        self.fail_next_solve = Some(message.into());
    }

    /// Every command received, in order.
    pub fn command_log(&self) -> &[String] {
        &self.command_log
    }

    /// Solver clock in hours.
    pub fn hour(&self) -> f64 {
        self.hour
    }

    pub fn step_size(&self) -> f64 {
        self.step_s
    }

    pub fn solution_number(&self) -> u32 {
        self.solution_number
    }

    pub fn solve_count(&self) -> usize {
        self.solve_count
    }

    /// Value of a `set` option, e.g. `mode`.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Overwrite the node voltages of one bus.
    pub fn set_bus_voltages(&mut self, bus: &str, voltages: Vec<(f64, f64)>) -> EngineResult<()> {
        let b = self
            .buses
            .iter_mut()
            .find(|b| b.name.eq_ignore_ascii_case(bus))
            .ok_or_else(|| EngineError::Snapshot {
                message: format!("no bus {bus}"),
            })?;
        b.voltages = voltages;
        Ok(())
    }

    fn find_element(&self, class: &ElementClass, name: &str) -> Option<usize> {
        self.elements
            .iter()
            .position(|e| &e.class == class && e.name.eq_ignore_ascii_case(name))
    }

    fn active(&self) -> EngineResult<&ElementState> {
        self.active_element
            .and_then(|i| self.elements.get(i))
            .ok_or(EngineError::NoActive { what: "element" })
    }

    fn active_mut(&mut self) -> EngineResult<&mut ElementState> {
        self.active_element
            .and_then(|i| self.elements.get_mut(i))
            .ok_or(EngineError::NoActive { what: "element" })
    }

    fn active_bus(&self) -> EngineResult<&BusSnapshot> {
        self.active_bus
            .and_then(|i| self.buses.get(i))
            .ok_or(EngineError::NoActive { what: "bus" })
    }

    fn check_terminal(el: &ElementState, terminal: usize, phase: usize) -> EngineResult<()> {
        if terminal == 0 || terminal > el.terminals() {
            return Err(EngineError::IndexOob {
                what: "terminal",
                index: terminal,
                len: el.terminals(),
            });
        }
        if phase > el.phases {
            return Err(EngineError::IndexOob {
                what: "phase",
                index: phase,
                len: el.phases,
            });
        }
        Ok(())
    }

    fn apply_props(el: &mut ElementState, props: &[(String, String)]) {
        for (key, value) in props {
            el.set_prop(key, value);
        }
    }

    fn run(&mut self, line: &str, cmd: Command) -> EngineResult<String> {
        match cmd {
            Command::New { target, props } => {
                if self.find_element(&target.class, &target.name).is_some() {
                    return Err(EngineError::Command {
                        command: line.to_string(),
                        message: format!("{} already exists", target.full_name()),
                    });
                }
                let mut el = ElementState::new(target.class, &target.name);
                Self::apply_props(&mut el, &props);
                self.elements.push(el);
                self.active_element = Some(self.elements.len() - 1);
                Ok(String::new())
            }
            Command::Edit { target, props } => {
                let idx = self
                    .find_element(&target.class, &target.name)
                    .ok_or_else(|| EngineError::Command {
                        command: line.to_string(),
                        message: format!("{} not found", target.full_name()),
                    })?;
                Self::apply_props(&mut self.elements[idx], &props);
                self.active_element = Some(idx);
                Ok(String::new())
            }
            Command::Set { props } => {
                for (key, value) in props {
                    match key.to_ascii_lowercase().as_str() {
                        "hour" => self.hour = value.parse().unwrap_or(self.hour),
                        "stepsize" => self.step_s = value.parse().unwrap_or(self.step_s),
                        "number" => {
                            self.solution_number = value.parse().unwrap_or(self.solution_number)
                        }
                        _ => {}
                    }
                    match self.options.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&key)) {
                        Some(entry) => entry.1 = value,
                        None => self.options.push((key, value)),
                    }
                }
                Ok(String::new())
            }
            Command::Redirect { path } => {
                let snapshot = CircuitSnapshot::load(Path::new(&path))?;
                let replace = self.buses.is_empty() && self.elements.is_empty();
                self.load_snapshot(snapshot, replace)?;
                Ok(String::new())
            }
            Command::Compile { path } => {
                let snapshot = CircuitSnapshot::load(Path::new(&path))?;
                self.load_snapshot(snapshot, true)?;
                Ok(String::new())
            }
            Command::Export { what } if what.eq_ignore_ascii_case("eventlog") => Ok(String::new()),
            Command::Export { what } => Err(EngineError::NotSupported {
                backend: BACKEND,
                what: format!("export {what}"),
            }),
            Command::Clear => {
                *self = Self {
                    command_log: std::mem::take(&mut self.command_log),
                    ..Self::default()
                };
                Ok(String::new())
            }
            Command::Other { verb, args } if verb == "?" => self.query_property(line, &args),
            Command::Other { verb, .. } => Err(EngineError::NotSupported {
                backend: BACKEND,
                what: verb,
            }),
        }
    }

    // `? Class.name.property`
    fn query_property(&self, line: &str, args: &[String]) -> EngineResult<String> {
        let bad = || EngineError::Command {
            command: line.to_string(),
            message: "expected Class.name.property".to_string(),
        };
        let arg = args.first().ok_or_else(bad)?;
        let (element, prop) = arg.rsplit_once('.').ok_or_else(bad)?;
        let target = ElementRef::parse_full_name(element).map_err(|_| bad())?;
        let idx = self
            .find_element(&target.class, &target.name)
            .ok_or_else(bad)?;
        self.elements[idx]
            .prop(prop)
            .map(str::to_string)
            .ok_or_else(bad)
    }
}

impl DssEngine for MemoryEngine {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn command(&mut self, cmd: &str) -> EngineResult<String> {
        self.command_log.push(cmd.to_string());
        let parsed = parse_command(cmd)?;
        debug!(backend = BACKEND, command = cmd, "command");
        self.run(cmd, parsed)
    }

    fn circuit_name(&mut self) -> EngineResult<String> {
        Ok(self.circuit_name.clone())
    }

    fn all_bus_names(&mut self) -> EngineResult<Vec<String>> {
        Ok(self.buses.iter().map(|b| b.name.clone()).collect())
    }

    fn all_element_names(&mut self) -> EngineResult<Vec<String>> {
        Ok(self.elements.iter().map(ElementState::full_name).collect())
    }

    fn class_element_names(&mut self, class: &ElementClass) -> EngineResult<Vec<String>> {
        Ok(self
            .elements
            .iter()
            .filter(|e| &e.class == class)
            .map(|e| e.name.clone())
            .collect())
    }

    fn set_active_bus(&mut self, bus: &str) -> EngineResult<bool> {
        let (name, _) = split_bus_nodes(bus);
        self.active_bus = self
            .buses
            .iter()
            .position(|b| b.name.eq_ignore_ascii_case(&name));
        Ok(self.active_bus.is_some())
    }

    fn bus_num_nodes(&mut self) -> EngineResult<usize> {
        Ok(self.active_bus()?.voltages.len())
    }

    fn bus_voltages(&mut self, form: VoltageForm) -> EngineResult<Vec<f64>> {
        let bus = self.active_bus()?;
        let base_v = bus.kv_base * 1000.0;
        let out = bus
            .voltages
            .iter()
            .flat_map(|&(re, im)| match form {
                VoltageForm::Rect => [re, im],
                VoltageForm::PuRect => [re / base_v, im / base_v],
                VoltageForm::MagAngle => {
                    let (mag, ang) = to_polar_deg(re, im);
                    [mag, ang]
                }
                VoltageForm::PuMagAngle => {
                    let (mag, ang) = to_polar_deg(re, im);
                    [mag / base_v, ang]
                }
            })
            .collect();
        Ok(out)
    }

    fn set_active_element(&mut self, element: &ElementRef) -> EngineResult<Option<ElementRef>> {
        self.active_element = self.find_element(&element.class, &element.name);
        Ok(self
            .active_element
            .and_then(|i| self.elements.get(i))
            .map(|e| ElementRef::new(e.class.clone(), &e.name)))
    }

    fn element_bus_names(&mut self) -> EngineResult<Vec<String>> {
        let el = self.active()?;
        let mut buses = el.buses.clone();
        buses.resize(el.terminals(), String::new());
        Ok(buses)
    }

    fn element_num_phases(&mut self) -> EngineResult<usize> {
        Ok(self.active()?.phases)
    }

    fn element_array(&mut self, array: ElementArray) -> EngineResult<Vec<f64>> {
        let el = self.active()?;
        let out = match array {
            ElementArray::Powers => el.powers.clone(),
            ElementArray::Currents => el.currents.clone(),
            ElementArray::CurrentsMagAng => to_mag_ang(&el.currents),
            ElementArray::Voltages => element_voltages(el, &self.buses),
            ElementArray::VoltagesMagAng => to_mag_ang(&element_voltages(el, &self.buses)),
        };
        Ok(out)
    }

    fn element_property_names(&mut self) -> EngineResult<Vec<String>> {
        Ok(self
            .active()?
            .properties
            .iter()
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn property_value(&mut self, index: usize) -> EngineResult<String> {
        let el = self.active()?;
        el.properties
            .get(index)
            .map(|(_, v)| v.clone())
            .ok_or(EngineError::IndexOob {
                what: "property",
                index,
                len: el.properties.len(),
            })
    }

    fn set_property_value(&mut self, index: usize, value: &str) -> EngineResult<()> {
        let el = self.active_mut()?;
        let len = el.properties.len();
        let key = el
            .properties
            .get(index)
            .map(|(k, _)| k.clone())
            .ok_or(EngineError::IndexOob {
                what: "property",
                index,
                len,
            })?;
        el.set_prop(&key, value);
        Ok(())
    }

    fn open_terminal(&mut self, terminal: usize, phase: usize) -> EngineResult<()> {
        let el = self.active_mut()?;
        Self::check_terminal(el, terminal, phase)?;
        if phase == 0 {
            for ph in 1..=el.phases {
                el.open.insert((terminal, ph));
            }
        } else {
            el.open.insert((terminal, phase));
        }
        Ok(())
    }

    fn close_terminal(&mut self, terminal: usize, phase: usize) -> EngineResult<()> {
        let el = self.active_mut()?;
        Self::check_terminal(el, terminal, phase)?;
        if phase == 0 {
            el.open.retain(|(t, _)| *t != terminal);
        } else {
            el.open.remove(&(terminal, phase));
        }
        Ok(())
    }

    fn is_open(&mut self, terminal: usize, phase: usize) -> EngineResult<bool> {
        let el = self.active()?;
        Self::check_terminal(el, terminal, phase)?;
        if phase == 0 {
            Ok(el.open.iter().any(|(t, _)| *t == terminal))
        } else {
            Ok(el.is_conductor_open(terminal, phase))
        }
    }

    fn set_kw(&mut self, kw: f64) -> EngineResult<()> {
        let el = self.active_mut()?;
        let key = match el.class {
            ElementClass::Load | ElementClass::Generator => "kW",
            ElementClass::PV => "Pmpp",
            _ => {
                return Err(EngineError::NotSupported {
                    backend: BACKEND,
                    what: format!("kW setpoint on {}", el.class),
                });
            }
        };
        el.set_prop(key, &kw.to_string());
        Ok(())
    }

    fn set_kvar(&mut self, kvar: f64) -> EngineResult<()> {
        let el = self.active_mut()?;
        if !el.class.accepts_setpoints() {
            return Err(EngineError::NotSupported {
                backend: BACKEND,
                what: format!("kvar setpoint on {}", el.class),
            });
        }
        el.set_prop("kvar", &kvar.to_string());
        Ok(())
    }

    fn tap_number(&mut self) -> EngineResult<i32> {
        let el = self.active()?;
        match el.class {
            ElementClass::RegControl => Ok(el.tap),
            _ => Err(EngineError::NoActive { what: "RegControl" }),
        }
    }

    fn set_tap_number(&mut self, tap: i32) -> EngineResult<()> {
        let el = self.active_mut()?;
        if el.class != ElementClass::RegControl {
            return Err(EngineError::NoActive { what: "RegControl" });
        }
        el.set_prop("TapNum", &tap.to_string());
        el.tap = tap;
        Ok(())
    }

    fn pt_ratio(&mut self) -> EngineResult<f64> {
        let el = self.active()?;
        match el.class {
            ElementClass::CapControl => Ok(el.pt_ratio),
            _ => Err(EngineError::NoActive { what: "CapControl" }),
        }
    }

    fn set_pt_ratio(&mut self, ratio: f64) -> EngineResult<()> {
        let el = self.active_mut()?;
        if el.class != ElementClass::CapControl {
            return Err(EngineError::NoActive { what: "CapControl" });
        }
        el.set_prop("PTratio", &ratio.to_string());
        el.pt_ratio = ratio;
        Ok(())
    }

    fn solve(&mut self, mode: SolveMode) -> EngineResult<String> {
        if let Some(message) = self.fail_next_solve.take() {
            return Err(EngineError::Dss {
                code: INJECTED_SOLVE_ERROR,
                message,
            });
        }

        self.hour += self.step_s / 3600.0;
        self.last_step_s = self.step_s;
        self.solve_count += 1;

        for el in &mut self.elements {
            let (p, q) = match el.class {
                ElementClass::Load => (
                    el.prop_f64("kW").unwrap_or(0.0),
                    el.prop_f64("kvar").unwrap_or(0.0),
                ),
                ElementClass::Generator => (
                    -el.prop_f64("kW").unwrap_or(0.0),
                    -el.prop_f64("kvar").unwrap_or(0.0),
                ),
                ElementClass::PV => (
                    -el.prop_f64("Pmpp").unwrap_or(0.0),
                    -el.prop_f64("kvar").unwrap_or(0.0),
                ),
                ElementClass::Storage => {
                    let (p, q) = storage_output(el);
                    el.set_prop("kW", &(-p).to_string());
                    el.set_prop("kvar", &(-q).to_string());
                    (p, q)
                }
                _ if el.class.is_branch() => {
                    restore_branch_flows(el);
                    continue;
                }
                _ => continue,
            };
            dispatch_terminal_power(el, &self.buses, p, q);
        }

        debug!(
            backend = BACKEND,
            hour = self.hour,
            controls = matches!(mode, SolveMode::Normal),
            "solved"
        );
        Ok(String::new())
    }

    fn update_storage(&mut self) -> EngineResult<()> {
        let dt_h = self.last_step_s / 3600.0;
        for el in self
            .elements
            .iter_mut()
            .filter(|e| e.class == ElementClass::Storage)
        {
            let kwh_rated = el.prop_f64("kWhrated").unwrap_or(50.0);
            if kwh_rated <= 0.0 {
                continue;
            }
            let stored = el.prop_f64("%stored").unwrap_or(100.0);
            let (p, _) = el.terminal_one_power();
            let delta = if p > 0.0 {
                p * dt_h * el.prop_f64("%EffCharge").unwrap_or(90.0) / 100.0
            } else {
                p * dt_h / (el.prop_f64("%EffDischarge").unwrap_or(90.0) / 100.0)
            };
            let energy = (kwh_rated * stored / 100.0 + delta).clamp(0.0, kwh_rated);
            el.set_prop("%stored", &(energy / kwh_rated * 100.0).to_string());
            el.set_prop("kWhstored", &energy.to_string());
        }
        Ok(())
    }

    fn set_solution_number(&mut self, number: u32) -> EngineResult<()> {
        self.solution_number = number;
        Ok(())
    }

    fn set_hour(&mut self, hour: u32) -> EngineResult<()> {
        self.hour = f64::from(hour);
        Ok(())
    }

    fn set_step_size(&mut self, seconds: f64) -> EngineResult<()> {
        self.step_s = seconds;
        Ok(())
    }

    fn total_power(&mut self) -> EngineResult<Vec<f64>> {
        let (mut p, mut q) = (self.losses.0 / 1000.0, self.losses.1 / 1000.0);
        for el in self
            .elements
            .iter()
            .filter(|e| !e.class.is_branch() && e.terminals() > 0)
        {
            let (ep, eq) = el.terminal_one_power();
            p += ep;
            q += eq;
        }
        Ok(vec![-p, -q])
    }

    fn losses(&mut self) -> EngineResult<(f64, f64)> {
        Ok(self.losses)
    }
}

/// Rectangular node voltages for a balanced set of phases at `pu` of
/// `kv_base`, starting at `angle_deg` and stepping -120°.
pub fn balanced_voltages(kv_base: f64, pu: &[f64], angle_deg: f64) -> Vec<(f64, f64)> {
    pu.iter()
        .enumerate()
        .map(|(k, m)| from_polar_deg(m * kv_base * 1000.0, angle_deg - 120.0 * k as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_circuit() -> MemoryEngine {
        let snapshot = CircuitSnapshot {
            name: "Tiny".into(),
            buses: vec![
                BusSnapshot {
                    name: "a".into(),
                    kv_base: 2.4,
                    nodes: vec![],
                    voltages: balanced_voltages(2.4, &[1.0, 1.0, 1.0], 0.0),
                },
                BusSnapshot {
                    name: "b".into(),
                    kv_base: 2.4,
                    nodes: vec![2],
                    voltages: vec![(-1200.0, -2078.46)],
                },
            ],
            elements: vec![
                ElementSnapshot {
                    class: "Load".into(),
                    name: "L3".into(),
                    phases: Some(3),
                    buses: vec!["a.1.2.3".into()],
                    powers: vec![],
                    currents: vec![],
                    properties: vec![
                        ("phases".into(), "3".into()),
                        ("bus1".into(), "a.1.2.3".into()),
                        ("kW".into(), "300".into()),
                        ("kvar".into(), "90".into()),
                    ],
                    tap: None,
                    pt_ratio: None,
                },
                ElementSnapshot {
                    class: "Line".into(),
                    name: "ab".into(),
                    phases: Some(1),
                    buses: vec!["a.2".into(), "b.2".into()],
                    powers: vec![50.0, 10.0, -49.0, -9.5],
                    currents: vec![],
                    properties: vec![],
                    tap: None,
                    pt_ratio: None,
                },
            ],
            losses: (1000.0, 500.0),
        };
        MemoryEngine::from_snapshot(snapshot).unwrap()
    }

    #[test]
    fn solve_splits_load_over_phases() {
        let mut engine = small_circuit();
        engine.solve(SolveMode::Normal).unwrap();
        engine
            .set_active_element(&ElementRef::new(ElementClass::Load, "l3"))
            .unwrap();
        let powers = engine.element_array(ElementArray::Powers).unwrap();
        assert_eq!(powers, vec![100.0, 30.0, 100.0, 30.0, 100.0, 30.0]);

        let mags = engine.element_array(ElementArray::CurrentsMagAng).unwrap();
        // |S| / |V| = sqrt(100^2 + 30^2) kVA / 2.4 kV
        let expected = (100.0f64.hypot(30.0) * 1000.0) / 2400.0;
        assert!((mags[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn total_power_is_negated_consumption_plus_losses() {
        let mut engine = small_circuit();
        engine.solve(SolveMode::Normal).unwrap();
        let total = engine.total_power().unwrap();
        assert!((total[0] + 301.0).abs() < 1e-9);
        assert!((total[1] + 90.5).abs() < 1e-9);
    }

    #[test]
    fn missing_element_clears_selection() {
        let mut engine = small_circuit();
        let line = ElementRef::new(ElementClass::Line, "ab");
        let first = engine.set_active_element(&line).unwrap();
        assert_eq!(first, Some(line));

        let miss = engine
            .set_active_element(&ElementRef::new(ElementClass::Load, "nope"))
            .unwrap();
        assert_eq!(miss, None);
        assert!(matches!(
            engine.element_num_phases(),
            Err(EngineError::NoActive { .. })
        ));
    }

    #[test]
    fn same_name_in_another_class_is_a_miss() {
        let mut engine = small_circuit();
        engine
            .set_active_element(&ElementRef::new(ElementClass::Line, "ab"))
            .unwrap();
        let miss = engine
            .set_active_element(&ElementRef::new(ElementClass::Load, "ab"))
            .unwrap();
        assert_eq!(miss, None);
    }

    #[test]
    fn open_conductor_zeroes_branch_flow() {
        let mut engine = small_circuit();
        engine
            .set_active_element(&ElementRef::new(ElementClass::Line, "ab"))
            .unwrap();
        engine.open_terminal(1, 0).unwrap();
        assert!(engine.is_open(1, 0).unwrap());
        engine.solve(SolveMode::Normal).unwrap();
        engine
            .set_active_element(&ElementRef::new(ElementClass::Line, "ab"))
            .unwrap();
        assert!(engine
            .element_array(ElementArray::Powers)
            .unwrap()
            .iter()
            .all(|v| *v == 0.0));

        engine.close_terminal(1, 0).unwrap();
        engine.solve(SolveMode::Normal).unwrap();
        let powers = engine.element_array(ElementArray::Powers).unwrap();
        assert_eq!(powers, vec![50.0, 10.0, -49.0, -9.5]);
    }

    #[test]
    fn single_node_bus_uses_declared_node() {
        let mut engine = small_circuit();
        engine
            .set_active_element(&ElementRef::new(ElementClass::Line, "ab"))
            .unwrap();
        let v = engine.element_array(ElementArray::Voltages).unwrap();
        // terminal 2 sits on bus b node 2, the only node there
        assert_eq!(&v[2..], &[-1200.0, -2078.46]);
    }

    #[test]
    fn storage_charges_and_integrates_energy() {
        let mut engine = small_circuit();
        engine
            .command("new Storage.bat phases=3 bus1=a kWrated=10 kWhrated=20 %stored=50 %EffCharge=100")
            .unwrap();
        engine
            .command("edit Storage.bat %charge=50 pf=1 State=Charging")
            .unwrap();
        engine.set_step_size(3600.0).unwrap();
        engine.solve(SolveMode::Normal).unwrap();
        engine.update_storage().unwrap();

        let stored = engine.command("? Storage.bat.%stored").unwrap();
        // 5 kW for one hour into 20 kWh: 50% -> 75%
        assert!((stored.parse::<f64>().unwrap() - 75.0).abs() < 1e-9);
        let kw = engine.command("? Storage.bat.kW").unwrap();
        assert_eq!(kw.parse::<f64>().unwrap(), -5.0);
    }

    #[test]
    fn injected_failure_fires_once() {
        let mut engine = small_circuit();
        engine.fail_next_solve("did not converge");
        assert!(matches!(
            engine.solve(SolveMode::Normal),
            Err(EngineError::Dss { code: INJECTED_SOLVE_ERROR, .. })
        ));
        assert!(engine.solve(SolveMode::Normal).is_ok());
    }

    #[test]
    fn unknown_commands_are_rejected() {
        let mut engine = small_circuit();
        assert!(engine.command("plot circuit").is_err());
        assert!(engine.command("edit Load.nope kW=1").is_err());
        assert_eq!(engine.command_log().len(), 2);
    }
}
