//! Sampling recorded quantities after a solve.

use dss_circuit::{CircuitError, CurrentQuery, PowerQuery, SwitchPoint, VoltageQuery};
use dss_core::{ElementClass, Reading};
use dss_engine::DssEngine;
use dss_results::RecordedValue;
use dss_scenario::{Quantity, RecordDef};

use crate::engine::DynCircuit;
use crate::error::{AppError, AppResult};

/// Flatten a reading under `prefix`.
///
/// Per-phase sequences get a `.<phase>` suffix (1-based) and `(P, Q)` pairs
/// a `.p`/`.q` suffix; a single-phase reading keeps the bare prefix.
pub fn flatten_reading(prefix: &str, reading: &Reading) -> Vec<RecordedValue> {
    match reading {
        Reading::Value(v) => vec![RecordedValue::new(prefix, *v)],
        Reading::Pair(p, q) => pair(prefix, (*p, *q)),
        Reading::Values(values) => values
            .iter()
            .enumerate()
            .map(|(i, v)| RecordedValue::new(format!("{prefix}.{}", i + 1), *v))
            .collect(),
        Reading::Pairs(pairs) => pairs
            .iter()
            .enumerate()
            .flat_map(|(i, pq)| pair(&format!("{prefix}.{}", i + 1), *pq))
            .collect(),
    }
}

fn pair(prefix: &str, (p, q): (f64, f64)) -> Vec<RecordedValue> {
    vec![
        RecordedValue::new(format!("{prefix}.p"), p),
        RecordedValue::new(format!("{prefix}.q"), q),
    ]
}

/// Read one record's values from the solved circuit.
pub fn sample_record<E: DssEngine>(
    circuit: &mut dss_circuit::Circuit<E>,
    record: &RecordDef,
) -> AppResult<Vec<RecordedValue>> {
    let key = record.key();
    let fail = |message: String| AppError::Record {
        key: key.clone(),
        message,
    };
    let reading = read(circuit, record).map_err(|e| fail(e.to_string()))?;
    match reading {
        Sample::Reading(r) => Ok(flatten_reading(&key, &r)),
        Sample::Missing(message) => Err(fail(message)),
    }
}

enum Sample {
    Reading(Reading),
    Missing(String),
}

fn read<E: DssEngine>(
    circuit: &mut dss_circuit::Circuit<E>,
    record: &RecordDef,
) -> Result<Sample, CircuitError> {
    let target = match (&record.element, &record.class) {
        (Some(name), Some(class)) => Some((name.as_str(), class)),
        _ => None,
    };
    let bus = record.bus.as_deref();

    let reading = match (&record.quantity, target, bus) {
        (Quantity::CircuitPower, ..) => {
            let (p, q) = circuit.get_circuit_power()?;
            Reading::Pair(p, q)
        }
        (Quantity::Losses, ..) => {
            let (p, q) = circuit.get_losses()?;
            Reading::Pair(p, q)
        }
        (Quantity::VoltagePu, _, Some(bus)) => {
            circuit.get_bus_voltage(bus, VoltageQuery::default())?
        }
        (Quantity::VoltageAvgPu, _, Some(bus)) => {
            circuit.get_bus_voltage(bus, VoltageQuery::default().average())?
        }
        (Quantity::VoltagePu, Some((name, class)), _) => {
            circuit.get_voltage(name, class, 1, VoltageQuery::default())?
        }
        (Quantity::VoltageAvgPu, Some((name, class)), _) => {
            circuit.get_voltage(name, class, 1, VoltageQuery::default().average())?
        }
        (Quantity::Power, Some((name, class)), _) => {
            circuit.get_power(name, class, PowerQuery::default())?
        }
        (Quantity::PowerTotal, Some((name, class)), _) => {
            circuit.get_power(name, class, PowerQuery::default().total())?
        }
        (Quantity::CurrentMag, Some((name, class)), _) => {
            circuit.get_current(name, class, CurrentQuery::default())?
        }
        (Quantity::Tap, Some((name, ElementClass::RegControl)), _) => {
            Reading::Value(f64::from(circuit.get_tap(name)?))
        }
        (Quantity::IsOpen, Some((name, class)), _) => {
            let open = circuit.get_is_open(name, class, SwitchPoint::default())?;
            Reading::Value(if open { 1.0 } else { 0.0 })
        }
        (Quantity::Property(prop), Some((name, class)), _) => {
            let value = circuit.get_property(name, prop, class)?;
            match value.as_f64() {
                Some(v) => Reading::Value(v),
                None => return Ok(Sample::Missing(format!("{prop} = {value} is not numeric"))),
            }
        }
        (quantity, ..) => {
            return Ok(Sample::Missing(format!(
                "{} needs a matching element or bus",
                quantity.name()
            )));
        }
    };
    Ok(Sample::Reading(reading))
}

/// Sample every record, in order.
pub(crate) fn sample_all(
    circuit: &mut DynCircuit,
    records: &[RecordDef],
) -> AppResult<Vec<RecordedValue>> {
    let mut values = Vec::new();
    for record in records {
        values.extend(sample_record(circuit, record)?);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattening_suffixes() {
        let keys = |r: Reading| -> Vec<String> {
            flatten_reading("x", &r).into_iter().map(|v| v.key).collect()
        };
        assert_eq!(keys(Reading::Value(1.0)), ["x"]);
        assert_eq!(keys(Reading::Pair(1.0, 2.0)), ["x.p", "x.q"]);
        assert_eq!(keys(Reading::Values(vec![1.0, 2.0])), ["x.1", "x.2"]);
        assert_eq!(
            keys(Reading::Pairs(vec![(1.0, 2.0), (3.0, 4.0)])),
            ["x.1.p", "x.1.q", "x.2.p", "x.2.q"]
        );
    }

    #[test]
    fn pair_values_keep_order() {
        let values = flatten_reading("circuit.losses", &Reading::Pair(20.0, 40.0));
        assert_eq!(values[0], RecordedValue::new("circuit.losses.p", 20.0));
        assert_eq!(values[1], RecordedValue::new("circuit.losses.q", 40.0));
    }
}
