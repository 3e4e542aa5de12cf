//! Property writes checked against what the engine stores.

mod common;

use common::{feeder_engine, options};
use dss_circuit::{Circuit, CircuitError};
use dss_core::{ElementClass, ElementRef, PropertyValue};
use dss_engine::{DssEngine, ElementArray, EngineResult, MemoryEngine, SolveMode, VoltageForm};

/// Stores numeric property writes rounded to two decimals, like an engine
/// with a fixed-precision property buffer.
struct RoundingEngine(MemoryEngine);

impl DssEngine for RoundingEngine {
    fn backend_name(&self) -> &'static str {
        "rounding"
    }
    fn command(&mut self, cmd: &str) -> EngineResult<String> {
        self.0.command(cmd)
    }
    fn circuit_name(&mut self) -> EngineResult<String> {
        self.0.circuit_name()
    }
    fn all_bus_names(&mut self) -> EngineResult<Vec<String>> {
        self.0.all_bus_names()
    }
    fn all_element_names(&mut self) -> EngineResult<Vec<String>> {
        self.0.all_element_names()
    }
    fn class_element_names(&mut self, class: &ElementClass) -> EngineResult<Vec<String>> {
        self.0.class_element_names(class)
    }
    fn set_active_bus(&mut self, bus: &str) -> EngineResult<bool> {
        self.0.set_active_bus(bus)
    }
    fn bus_num_nodes(&mut self) -> EngineResult<usize> {
        self.0.bus_num_nodes()
    }
    fn bus_voltages(&mut self, form: VoltageForm) -> EngineResult<Vec<f64>> {
        self.0.bus_voltages(form)
    }
    fn set_active_element(&mut self, element: &ElementRef) -> EngineResult<Option<ElementRef>> {
        self.0.set_active_element(element)
    }
    fn element_bus_names(&mut self) -> EngineResult<Vec<String>> {
        self.0.element_bus_names()
    }
    fn element_num_phases(&mut self) -> EngineResult<usize> {
        self.0.element_num_phases()
    }
    fn element_array(&mut self, array: ElementArray) -> EngineResult<Vec<f64>> {
        self.0.element_array(array)
    }
    fn element_property_names(&mut self) -> EngineResult<Vec<String>> {
        self.0.element_property_names()
    }
    fn property_value(&mut self, index: usize) -> EngineResult<String> {
        self.0.property_value(index)
    }
    fn set_property_value(&mut self, index: usize, value: &str) -> EngineResult<()> {
        match value.parse::<f64>() {
            Ok(n) => self.0.set_property_value(index, &format!("{n:.2}")),
            Err(_) => self.0.set_property_value(index, value),
        }
    }
    fn open_terminal(&mut self, terminal: usize, phase: usize) -> EngineResult<()> {
        self.0.open_terminal(terminal, phase)
    }
    fn close_terminal(&mut self, terminal: usize, phase: usize) -> EngineResult<()> {
        self.0.close_terminal(terminal, phase)
    }
    fn is_open(&mut self, terminal: usize, phase: usize) -> EngineResult<bool> {
        self.0.is_open(terminal, phase)
    }
    fn set_kw(&mut self, kw: f64) -> EngineResult<()> {
        self.0.set_kw(kw)
    }
    fn set_kvar(&mut self, kvar: f64) -> EngineResult<()> {
        self.0.set_kvar(kvar)
    }
    fn tap_number(&mut self) -> EngineResult<i32> {
        self.0.tap_number()
    }
    fn set_tap_number(&mut self, tap: i32) -> EngineResult<()> {
        self.0.set_tap_number(tap)
    }
    fn pt_ratio(&mut self) -> EngineResult<f64> {
        self.0.pt_ratio()
    }
    fn set_pt_ratio(&mut self, ratio: f64) -> EngineResult<()> {
        self.0.set_pt_ratio(ratio)
    }
    fn solve(&mut self, mode: SolveMode) -> EngineResult<String> {
        self.0.solve(mode)
    }
    fn update_storage(&mut self) -> EngineResult<()> {
        self.0.update_storage()
    }
    fn set_solution_number(&mut self, number: u32) -> EngineResult<()> {
        self.0.set_solution_number(number)
    }
    fn set_hour(&mut self, hour: u32) -> EngineResult<()> {
        self.0.set_hour(hour)
    }
    fn set_step_size(&mut self, seconds: f64) -> EngineResult<()> {
        self.0.set_step_size(seconds)
    }
    fn total_power(&mut self) -> EngineResult<Vec<f64>> {
        self.0.total_power()
    }
    fn losses(&mut self) -> EngineResult<(f64, f64)> {
        self.0.losses()
    }
}

fn rounding_feeder() -> Circuit<RoundingEngine> {
    Circuit::new(RoundingEngine(feeder_engine()), options()).unwrap()
}

#[test]
fn value_stored_as_written_passes() {
    let mut c = rounding_feeder();
    c.set_property("671", "kW", 1000.5, &ElementClass::Load)
        .unwrap();
    assert_eq!(
        c.get_property("671", "kW", &ElementClass::Load).unwrap(),
        PropertyValue::Number(1000.5)
    );
    c.set_property("671", "yearly", "Constant", &ElementClass::Load)
        .unwrap();
}

#[test]
fn altered_read_back_is_an_invariant_error() {
    let mut c = rounding_feeder();
    let err = c
        .set_property("671", "kW", 1000.1234, &ElementClass::Load)
        .unwrap_err();
    match err {
        CircuitError::Invariant { message } => {
            assert!(message.contains("1000.1234"), "{message}");
            assert!(message.contains("1000.12"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn numbers_compare_exactly() {
    let mut c = rounding_feeder();
    // One part in 1e10 is still a different value.
    let err = c
        .set_property("671", "kW", 1000.0000001, &ElementClass::Load)
        .unwrap_err();
    assert!(matches!(err, CircuitError::Invariant { .. }), "{err}");
}
