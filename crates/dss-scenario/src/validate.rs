//! Scenario validation logic.

use crate::schema::{EngineDef, Quantity, RecordDef, Scenario, ScheduleDef};
use dss_core::ElementClass;

pub const LATEST_VERSION: u32 = 1;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing field: {field} ({context})")]
    Missing { field: String, context: String },
}

fn invalid(field: impl Into<String>, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

pub fn validate_scenario(scenario: &Scenario) -> Result<(), ValidationError> {
    if scenario.version != LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: scenario.version,
        });
    }
    if scenario.name.trim().is_empty() {
        return Err(invalid("name", "", "must not be empty"));
    }
    if !(scenario.time_step_s.is_finite() && scenario.time_step_s > 0.0) {
        return Err(invalid(
            "time_step_s",
            scenario.time_step_s,
            "must be positive",
        ));
    }
    if scenario.steps == 0 {
        return Err(invalid("steps", 0, "at least one step is required"));
    }
    if scenario.redirects.is_empty() {
        let context = match scenario.engine {
            EngineDef::Dss => "the dss engine compiles the circuit from netlist files",
            EngineDef::Memory => "the memory engine loads the circuit from snapshot files",
        };
        return Err(ValidationError::Missing {
            field: "redirects".to_string(),
            context: context.to_string(),
        });
    }

    for schedule in &scenario.schedules {
        validate_schedule(schedule)?;
    }
    for (i, record) in scenario.record.iter().enumerate() {
        validate_record(i, record)?;
    }
    Ok(())
}

fn validate_schedule(schedule: &ScheduleDef) -> Result<(), ValidationError> {
    let context = format!("schedule '{}'", schedule.element);
    if !(schedule.class.accepts_setpoints() || schedule.class == ElementClass::Storage) {
        return Err(invalid(
            format!("{context} class"),
            &schedule.class,
            "only Load, PVSystem, Generator and Storage take setpoints",
        ));
    }
    if schedule.points.is_empty() {
        return Err(ValidationError::Missing {
            field: "points".to_string(),
            context,
        });
    }
    if let Some(rated) = schedule.rated_kw
        && !(rated.is_finite() && rated > 0.0)
    {
        return Err(invalid(format!("{context} rated_kw"), rated, "must be positive"));
    }

    let mut previous: Option<f64> = None;
    for point in &schedule.points {
        if !(0.0..24.0).contains(&point.hour) {
            return Err(invalid(
                format!("{context} hour"),
                point.hour,
                "must lie in [0, 24)",
            ));
        }
        if previous.is_some_and(|prev| point.hour <= prev) {
            return Err(invalid(
                format!("{context} hour"),
                point.hour,
                "points must be sorted by hour",
            ));
        }
        previous = Some(point.hour);

        let finite = |v: Option<f64>| v.is_none_or(f64::is_finite);
        if !(finite(point.p_kw) && finite(point.q_kvar)) {
            return Err(invalid(
                format!("{context} setpoint"),
                format!("{:?}/{:?}", point.p_kw, point.q_kvar),
                "setpoints must be finite",
            ));
        }
        if schedule.class == ElementClass::Storage && point.p_kw.is_none() {
            return Err(ValidationError::Missing {
                field: "p_kw".to_string(),
                context: format!("{context} at hour {}", point.hour),
            });
        }
    }
    Ok(())
}

fn validate_record(index: usize, record: &RecordDef) -> Result<(), ValidationError> {
    let context = format!("record #{index} ({})", record.quantity.name());
    if record.quantity.is_circuit_level() {
        return Ok(());
    }
    match (&record.element, &record.class, &record.bus) {
        (Some(_), Some(class), None) => {
            if record.quantity == Quantity::Tap && *class != ElementClass::RegControl {
                return Err(invalid(
                    format!("{context} class"),
                    class,
                    "taps are read from RegControl elements",
                ));
            }
            Ok(())
        }
        (Some(_), None, None) => Err(ValidationError::Missing {
            field: "class".to_string(),
            context,
        }),
        (None, _, Some(_)) if record.quantity.applies_to_bus() => Ok(()),
        (None, _, Some(_)) => Err(invalid(
            format!("{context} bus"),
            record.quantity.name(),
            "only voltages are recorded per bus",
        )),
        (Some(_), _, Some(_)) => Err(invalid(
            context,
            "element and bus",
            "name either an element or a bus",
        )),
        (None, _, None) => Err(ValidationError::Missing {
            field: "element or bus".to_string(),
            context,
        }),
    }
}
