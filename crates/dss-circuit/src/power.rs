//! Element powers, currents and setpoints.
//!
//! Powers follow the engine's convention: positive means the element
//! consumes.

use crate::circuit::Circuit;
use crate::error::{CircuitError, CircuitResult};
use crate::options::{CurrentQuery, PowerQuery};
use crate::reshape::{current_reading, power_reading, terminal_pairs};
use crate::storage::StorageDispatch;
use dss_core::{ElementClass, ElementRef, Reading};
use dss_engine::{DssEngine, ElementArray};
use tracing::debug;

/// Every raw array of one element, unshaped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ElementArrays {
    pub voltages: Vec<f64>,
    pub voltages_mag_ang: Vec<f64>,
    pub currents: Vec<f64>,
    pub currents_mag_ang: Vec<f64>,
    pub powers: Vec<f64>,
}

impl<E: DssEngine> Circuit<E> {
    fn terminal_block(
        &mut self,
        element: &ElementRef,
        array: ElementArray,
        terminal: usize,
    ) -> CircuitResult<Vec<(f64, f64)>> {
        let raw = self.engine.element_array(array)?;
        let phases = self.engine.element_num_phases()?;
        terminal_pairs(
            &raw,
            phases,
            terminal,
            element.class.is_branch(),
            &element.to_string(),
        )
    }

    /// Power of an element in kW/kvar.
    ///
    /// One phase gives a `Pair`. Two or three phases give `Pairs`, or a
    /// `Pair` for a selected phase or the phase total.
    pub fn get_power(
        &mut self,
        name: &str,
        class: &ElementClass,
        query: PowerQuery,
    ) -> CircuitResult<Reading> {
        let element = self.select_named(name, class)?;
        let pairs = self.terminal_block(&element, ElementArray::Powers, query.terminal)?;
        power_reading(pairs, query.phase, query.total, &element.to_string())
    }

    /// The engine's power array, all terminals and conductors.
    pub fn get_power_raw(&mut self, name: &str, class: &ElementClass) -> CircuitResult<Vec<f64>> {
        self.select_named(name, class)?;
        Ok(self.engine.element_array(ElementArray::Powers)?)
    }

    /// Write a power setpoint.
    ///
    /// Loads, PV and generators take kW/kvar directly; `None` leaves a
    /// value alone. Storage units are dispatched through an `edit` command
    /// derived from `p_kw`, `q_kvar` and the rating (`rated_kw`, or the
    /// unit's `kWrated` property).
    pub fn set_power(
        &mut self,
        name: &str,
        p_kw: Option<f64>,
        q_kvar: Option<f64>,
        class: &ElementClass,
        rated_kw: Option<f64>,
    ) -> CircuitResult<()> {
        match class {
            c if c.accepts_setpoints() => {
                self.select_named(name, class)?;
                if let Some(p) = p_kw {
                    self.engine.set_kw(p)?;
                }
                if let Some(q) = q_kvar {
                    self.engine.set_kvar(q)?;
                }
                Ok(())
            }
            ElementClass::Storage => {
                let element = self.select_named(name, class)?;
                let p = p_kw.ok_or_else(|| {
                    CircuitError::invalid_arg(format!("{element} needs an active-power setpoint"))
                })?;
                let dispatch = if p == 0.0 {
                    StorageDispatch::Idle
                } else {
                    let rated = match rated_kw {
                        Some(r) => r,
                        None => self.property_f64(name, "kWrated", class)?,
                    };
                    StorageDispatch::from_setpoint(p, q_kvar.unwrap_or(0.0), rated)?
                };
                debug!(element = %element, state = dispatch.state_name(), "storage dispatch");
                self.run_command(&dispatch.edit_command(&element))?;
                Ok(())
            }
            other => Err(CircuitError::reference(format!(
                "Unknown setpoint class: {other}"
            ))),
        }
    }

    /// Current of an element: magnitudes by default, `(mag, angle)` or
    /// `(re, im)` pairs otherwise.
    pub fn get_current(
        &mut self,
        name: &str,
        class: &ElementClass,
        query: CurrentQuery,
    ) -> CircuitResult<Reading> {
        let element = self.select_named(name, class)?;
        let array = if query.polar {
            ElementArray::CurrentsMagAng
        } else {
            ElementArray::Currents
        };
        let pairs = self.terminal_block(&element, array, query.terminal)?;
        current_reading(pairs, &query, &element.to_string())
    }

    pub fn get_current_raw(
        &mut self,
        name: &str,
        class: &ElementClass,
        polar: bool,
    ) -> CircuitResult<Vec<f64>> {
        self.select_named(name, class)?;
        let array = if polar {
            ElementArray::CurrentsMagAng
        } else {
            ElementArray::Currents
        };
        Ok(self.engine.element_array(array)?)
    }

    pub fn get_all_complex(
        &mut self,
        name: &str,
        class: &ElementClass,
    ) -> CircuitResult<ElementArrays> {
        self.select_named(name, class)?;
        Ok(ElementArrays {
            voltages: self.engine.element_array(ElementArray::Voltages)?,
            voltages_mag_ang: self.engine.element_array(ElementArray::VoltagesMagAng)?,
            currents: self.engine.element_array(ElementArray::Currents)?,
            currents_mag_ang: self.engine.element_array(ElementArray::CurrentsMagAng)?,
            powers: self.engine.element_array(ElementArray::Powers)?,
        })
    }
}
