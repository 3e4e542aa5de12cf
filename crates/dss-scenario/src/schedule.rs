//! Daily setpoint lookup.

use crate::schema::{ScheduleDef, SetpointDef};

const HOURS_PER_DAY: f64 = 24.0;

/// Hour of day for a solver clock given in hours.
pub fn hour_of_day(hour: f64) -> f64 {
    let hod = hour.rem_euclid(HOURS_PER_DAY);
    // rem_euclid rounds tiny negative inputs up to the modulus
    if hod >= HOURS_PER_DAY { 0.0 } else { hod }
}

impl ScheduleDef {
    /// Setpoint in force at `hour` (hours since the clock origin).
    ///
    /// Points are a daily step profile: the last point at or before the
    /// hour of day applies, and before the first point of the day the
    /// previous day's last point carries over.
    pub fn setpoint_at(&self, hour: f64) -> Option<&SetpointDef> {
        let hod = hour_of_day(hour);
        self.points
            .iter()
            .rev()
            .find(|p| p.hour <= hod)
            .or_else(|| self.points.last())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dss_core::ElementClass;
    use proptest::prelude::*;

    fn battery() -> ScheduleDef {
        ScheduleDef {
            element: "battery1".into(),
            class: ElementClass::Storage,
            points: vec![
                SetpointDef {
                    hour: 9.0,
                    p_kw: Some(10.0),
                    q_kvar: None,
                },
                SetpointDef {
                    hour: 15.0,
                    p_kw: Some(0.0),
                    q_kvar: None,
                },
                SetpointDef {
                    hour: 18.0,
                    p_kw: Some(-10.0),
                    q_kvar: None,
                },
            ],
            rated_kw: None,
        }
    }

    #[test]
    fn step_profile() {
        let s = battery();
        assert_eq!(s.setpoint_at(9.0).unwrap().p_kw, Some(10.0));
        assert_eq!(s.setpoint_at(14.99).unwrap().p_kw, Some(10.0));
        assert_eq!(s.setpoint_at(15.0).unwrap().p_kw, Some(0.0));
        assert_eq!(s.setpoint_at(20.0).unwrap().p_kw, Some(-10.0));
    }

    #[test]
    fn wraps_past_midnight() {
        let s = battery();
        assert_eq!(s.setpoint_at(3.0).unwrap().p_kw, Some(-10.0));
        assert_eq!(s.setpoint_at(24.0 * 40.0 + 10.0).unwrap().p_kw, Some(10.0));
    }

    #[test]
    fn empty_schedule_has_no_setpoint() {
        let mut s = battery();
        s.points.clear();
        assert!(s.setpoint_at(12.0).is_none());
    }

    proptest! {
        #[test]
        fn hour_of_day_in_range(hour in -1.0e5f64..1.0e5) {
            let hod = hour_of_day(hour);
            prop_assert!((0.0..HOURS_PER_DAY).contains(&hod));
        }
    }
}
