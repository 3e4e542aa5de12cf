//! Storage dispatch derived from a (P, Q) setpoint.

use crate::error::{CircuitError, CircuitResult};
use dss_core::ElementRef;

/// Operating state written to a storage unit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StorageDispatch {
    Idle,
    /// `pct` of rated power, power factor `pf`.
    Charge { pct: f64, pf: f64 },
    Discharge { pct: f64, pf: f64 },
}

impl StorageDispatch {
    /// Dispatch for `p_kw` (positive charges) and `q_kvar` on a unit rated
    /// `rated_kw`.
    ///
    /// The power factor is `cos(atan(q / p))`, negative when P and Q have
    /// opposite signs.
    pub fn from_setpoint(p_kw: f64, q_kvar: f64, rated_kw: f64) -> CircuitResult<Self> {
        if !(p_kw.is_finite() && q_kvar.is_finite()) {
            return Err(CircuitError::invalid_arg(format!(
                "storage setpoint must be finite, got ({p_kw}, {q_kvar})"
            )));
        }
        if p_kw == 0.0 {
            return Ok(Self::Idle);
        }
        if !(rated_kw.is_finite() && rated_kw > 0.0) {
            return Err(CircuitError::invalid_arg(format!(
                "storage rating must be positive, got {rated_kw} kW"
            )));
        }

        let mut pf = (q_kvar / p_kw).atan().cos();
        if p_kw * q_kvar < 0.0 {
            pf = -pf;
        }
        let pct = p_kw.abs() / rated_kw * 100.0;
        Ok(if p_kw < 0.0 {
            Self::Discharge { pct, pf }
        } else {
            Self::Charge { pct, pf }
        })
    }

    pub fn state_name(&self) -> &'static str {
        match self {
            Self::Idle => "Idling",
            Self::Charge { .. } => "Charging",
            Self::Discharge { .. } => "Discharging",
        }
    }

    /// The `edit` command applying this dispatch to `element`.
    pub fn edit_command(&self, element: &ElementRef) -> String {
        let target = element.full_name();
        let state = self.state_name();
        match self {
            Self::Idle => {
                format!("edit {target} kW=0 kvar=0 %charge=0 %discharge=0 State={state}")
            }
            Self::Charge { pct, pf } => {
                format!("edit {target} %charge={pct:.4} pf={pf:.4} State={state}")
            }
            Self::Discharge { pct, pf } => {
                format!("edit {target} %discharge={pct:.4} pf={pf:.4} State={state}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dss_core::ElementClass;
    use proptest::prelude::*;

    fn battery() -> ElementRef {
        ElementRef::new(ElementClass::Storage, "Battery1")
    }

    #[test]
    fn zero_power_idles() {
        let d = StorageDispatch::from_setpoint(0.0, 5.0, 0.0).unwrap();
        assert_eq!(d, StorageDispatch::Idle);
        assert_eq!(
            d.edit_command(&battery()),
            "edit Storage.battery1 kW=0 kvar=0 %charge=0 %discharge=0 State=Idling"
        );
    }

    #[test]
    fn discharge_with_opposite_q_has_negative_pf() {
        let d = StorageDispatch::from_setpoint(-50.0, 50.0, 100.0).unwrap();
        match d {
            StorageDispatch::Discharge { pct, pf } => {
                assert!((pct - 50.0).abs() < 1e-12);
                assert!((pf + std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            d.edit_command(&battery()),
            "edit Storage.battery1 %discharge=50.0000 pf=-0.7071 State=Discharging"
        );
    }

    #[test]
    fn charge_command() {
        let d = StorageDispatch::from_setpoint(25.0, 0.0, 100.0).unwrap();
        assert_eq!(
            d.edit_command(&battery()),
            "edit Storage.battery1 %charge=25.0000 pf=1.0000 State=Charging"
        );
    }

    #[test]
    fn rejects_bad_rating() {
        assert!(StorageDispatch::from_setpoint(10.0, 0.0, 0.0).is_err());
        assert!(StorageDispatch::from_setpoint(f64::NAN, 0.0, 10.0).is_err());
    }

    proptest! {
        #[test]
        fn pf_sign_and_percentage(
            p in prop_oneof![-200.0f64..-0.1, 0.1f64..200.0],
            q in -200.0f64..200.0,
            rated in 1.0f64..500.0,
        ) {
            let d = StorageDispatch::from_setpoint(p, q, rated).unwrap();
            let (pct, pf) = match d {
                StorageDispatch::Charge { pct, pf } => { prop_assert!(p > 0.0); (pct, pf) }
                StorageDispatch::Discharge { pct, pf } => { prop_assert!(p < 0.0); (pct, pf) }
                StorageDispatch::Idle => unreachable!(),
            };
            prop_assert!((pct - p.abs() / rated * 100.0).abs() < 1e-9);
            prop_assert!(pf.abs() <= 1.0 && pf.abs() > 0.0);
            prop_assert_eq!(pf < 0.0, p * q < 0.0);
        }
    }
}
