//! Bus and element voltages.

use crate::circuit::Circuit;
use crate::error::{CircuitError, CircuitResult};
use crate::options::VoltageQuery;
use crate::reshape::{keyed_by_phase, voltage_reading};
use dss_core::{ElementClass, Reading};
use dss_engine::{DssEngine, VoltageForm};

impl<E: DssEngine> Circuit<E> {
    pub fn get_all_buses(&mut self) -> CircuitResult<Vec<String>> {
        Ok(self.engine.all_bus_names()?)
    }

    /// Voltage of a bus, shaped by `query`.
    ///
    /// The array fetched depends on `per_unit` and `polar`. A single-node bus
    /// always yields a `Value` or `Pair`.
    pub fn get_bus_voltage(&mut self, bus: &str, query: VoltageQuery) -> CircuitResult<Reading> {
        if !self.engine.set_active_bus(bus)? {
            return Err(CircuitError::reference(format!("Bus \"{bus}\" does not exist")));
        }
        let form = VoltageForm::select(query.per_unit, query.polar);
        let raw = self.engine.bus_voltages(form)?;
        let nodes = self.engine.bus_num_nodes()?;
        voltage_reading(&raw, nodes, &query, &format!("Bus \"{bus}\""))
    }

    /// Voltage at the bus an element connects to.
    ///
    /// Branch elements use `line_bus` (1 or 2); everything else its only bus.
    /// Single-phase elements always read phase 1 of that bus.
    pub fn get_voltage(
        &mut self,
        name: &str,
        class: &ElementClass,
        line_bus: usize,
        query: VoltageQuery,
    ) -> CircuitResult<Reading> {
        let element = self.select_named(name, class)?;
        let buses = self.engine.element_bus_names()?;
        let expected = if class.is_branch() { 2 } else { 1 };
        if buses.len() != expected {
            return Err(CircuitError::Invariant {
                message: format!(
                    "{element} reports {} buses, expected {expected}",
                    buses.len()
                ),
            });
        }
        let index = match (class.is_branch(), line_bus) {
            (true, 1 | 2) => line_bus - 1,
            (true, _) => {
                return Err(CircuitError::reference(format!(
                    "{element} has no bus {line_bus}"
                )));
            }
            (false, _) => 0,
        };
        let bus = bare_bus(&buses[index]).to_string();

        let mut query = query;
        if self.engine.element_num_phases()? == 1 {
            query.phase = Some(1);
        }
        self.get_bus_voltage(&bus, query)
    }

    /// Every bus voltage. Multi-node readings are split into `bus.<phase>`
    /// entries.
    pub fn get_all_bus_voltages(
        &mut self,
        query: VoltageQuery,
    ) -> CircuitResult<Vec<(String, Reading)>> {
        let mut out = Vec::new();
        for bus in self.get_all_buses()? {
            let reading = self.get_bus_voltage(&bus, query)?;
            out.extend(keyed_by_phase(&bus, reading));
        }
        Ok(out)
    }
}

/// Bus name without node suffixes (`671.1.2.3` -> `671`).
pub fn bare_bus(spec: &str) -> &str {
    spec.split('.').next().unwrap_or(spec)
}
