//! Switches, regulator taps and capacitor control ratios.

use crate::circuit::Circuit;
use crate::error::{CircuitError, CircuitResult};
use crate::options::SwitchPoint;
use dss_core::ElementClass;
use dss_engine::DssEngine;
use tracing::debug;

/// Regulator tap limit used when callers have no better bound.
pub const DEFAULT_MAX_TAP: i32 = 16;

/// Clamp a tap to `[-max_tap, max_tap]`. `max_tap` must not be negative.
pub fn clamp_tap(tap: i32, max_tap: i32) -> i32 {
    tap.clamp(-max_tap, max_tap)
}

impl<E: DssEngine> Circuit<E> {
    pub fn set_is_open(
        &mut self,
        name: &str,
        class: &ElementClass,
        open: bool,
        point: SwitchPoint,
    ) -> CircuitResult<()> {
        let element = self.select_named(name, class)?;
        debug!(element = %element, open, terminal = point.terminal, phase = point.phase, "switch");
        if open {
            self.engine.open_terminal(point.terminal, point.phase)?;
        } else {
            self.engine.close_terminal(point.terminal, point.phase)?;
        }
        Ok(())
    }

    /// Whether the switch point is open; with `phase == 0`, whether any
    /// conductor of the terminal is.
    pub fn get_is_open(
        &mut self,
        name: &str,
        class: &ElementClass,
        point: SwitchPoint,
    ) -> CircuitResult<bool> {
        self.select_named(name, class)?;
        Ok(self.engine.is_open(point.terminal, point.phase)?)
    }

    /// Write a regulator tap clamped to `[-max_tap, max_tap]`. Returns the
    /// tap applied.
    pub fn set_tap(&mut self, name: &str, tap: i32, max_tap: i32) -> CircuitResult<i32> {
        if max_tap < 0 {
            return Err(CircuitError::invalid_arg(format!(
                "max tap must not be negative, got {max_tap}"
            )));
        }
        self.select_named(name, &ElementClass::RegControl)?;
        let applied = clamp_tap(tap, max_tap);
        self.engine.set_tap_number(applied)?;
        Ok(applied)
    }

    pub fn get_tap(&mut self, name: &str) -> CircuitResult<i32> {
        self.select_named(name, &ElementClass::RegControl)?;
        Ok(self.engine.tap_number()?)
    }

    pub fn set_pt_ratio(&mut self, name: &str, ratio: f64) -> CircuitResult<()> {
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(CircuitError::invalid_arg(format!(
                "PT ratio must be positive, got {ratio}"
            )));
        }
        self.select_named(name, &ElementClass::CapControl)?;
        self.engine.set_pt_ratio(ratio)?;
        Ok(())
    }

    pub fn get_pt_ratio(&mut self, name: &str) -> CircuitResult<f64> {
        self.select_named(name, &ElementClass::CapControl)?;
        Ok(self.engine.pt_ratio()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn clamps_to_limit() {
        assert_eq!(clamp_tap(25, DEFAULT_MAX_TAP), 16);
        assert_eq!(clamp_tap(-25, DEFAULT_MAX_TAP), -16);
        assert_eq!(clamp_tap(3, DEFAULT_MAX_TAP), 3);
    }

    proptest! {
        #[test]
        fn clamped_tap_stays_in_range(tap in -1000i32..1000, max in 0i32..32) {
            let applied = clamp_tap(tap, max);
            prop_assert!(applied.abs() <= max);
            if tap.abs() <= max {
                prop_assert_eq!(applied, tap);
            }
        }
    }
}
