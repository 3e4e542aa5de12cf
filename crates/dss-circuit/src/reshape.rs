//! Flat engine arrays to phased readings.
//!
//! The engine reports voltages, currents and powers as flat arrays with two
//! values per conductor, one terminal after another, sometimes followed by
//! neutral conductors. The functions here cut out the block that belongs to
//! the requested terminal and fold it into a [`Reading`] whose shape follows
//! the query flags.

use crate::error::{CircuitError, CircuitResult};
use crate::options::{CurrentQuery, VoltageQuery};
use dss_core::{Reading, contains_nan, deinterleave};

/// Magnitudes at or below this count as zero voltage.
pub const ZERO_VOLTAGE: f64 = 1e-10;

/// Convert a 1-based phase into an index, or fail with a reference error.
pub fn phase_index(phase: usize, phases: usize, what: &str) -> CircuitResult<usize> {
    if (1..=phases).contains(&phase) {
        Ok(phase - 1)
    } else {
        Err(CircuitError::reference(format!(
            "Bad phase for {phases}-phase {what}: {phase}"
        )))
    }
}

/// Per-phase pairs of one terminal.
///
/// Branch elements report both terminals back to back, so terminal `t`
/// starts at `(t - 1) * len / 2`. Everything else has one terminal. Only the
/// first `phases` conductors of the block are kept.
pub fn terminal_pairs(
    raw: &[f64],
    phases: usize,
    terminal: usize,
    branch: bool,
    what: &str,
) -> CircuitResult<Vec<(f64, f64)>> {
    let terminals = if branch { 2 } else { 1 };
    if !(1..=terminals).contains(&terminal) {
        return Err(CircuitError::reference(format!(
            "{what} has no terminal {terminal}"
        )));
    }
    let start = (terminal - 1) * raw.len() / 2;
    let end = start + 2 * phases;
    if phases == 0 || end > raw.len() {
        return Err(CircuitError::shape(what, raw.len()));
    }
    Ok(deinterleave(&raw[start..end]))
}

/// Shape `(P, Q)` pairs.
pub fn power_reading(
    pairs: Vec<(f64, f64)>,
    phase: Option<usize>,
    total: bool,
    what: &str,
) -> CircuitResult<Reading> {
    if pairs.iter().any(|(p, q)| p.is_nan() || q.is_nan()) {
        return Err(CircuitError::numerical(format!(
            "NaN output for {what} power: {pairs:?}"
        )));
    }
    let n = pairs.len();
    match (n, phase) {
        (1 | 2 | 3, Some(phase)) => {
            let (p, q) = pairs[phase_index(phase, n, what)?];
            Ok(Reading::Pair(p, q))
        }
        (1, None) => Ok(Reading::from_pairs(pairs)),
        (2 | 3, None) => {
            let reading = Reading::Pairs(pairs);
            Ok(if total { reading.summed() } else { reading })
        }
        _ => Err(CircuitError::shape(what, 2 * n)),
    }
}

/// Shape current pairs: `(magnitude, angle)` or `(re, im)`.
pub fn current_reading(
    pairs: Vec<(f64, f64)>,
    query: &CurrentQuery,
    what: &str,
) -> CircuitResult<Reading> {
    let n = pairs.len();
    let scalar = query.scalar();
    match (n, query.phase) {
        (1 | 2 | 3, Some(phase)) => {
            let (a, b) = pairs[phase_index(phase, n, what)?];
            // A selected phase keeps its angle even for magnitude queries.
            if n == 1 && scalar {
                Ok(Reading::Value(a))
            } else {
                Ok(Reading::Pair(a, b))
            }
        }
        (1 | 2 | 3, None) if scalar => {
            let reading = Reading::from_values(pairs.iter().map(|(m, _)| *m).collect());
            Ok(if query.total { reading.summed() } else { reading })
        }
        (1, None) => Ok(Reading::from_pairs(pairs)),
        (2 | 3, None) => Ok(Reading::Pairs(pairs)),
        _ => Err(CircuitError::shape(what, 2 * n)),
    }
}

/// Shape a bus voltage array holding two values per node.
pub fn voltage_reading(
    raw: &[f64],
    nodes: usize,
    query: &VoltageQuery,
    what: &str,
) -> CircuitResult<Reading> {
    if contains_nan(raw) {
        return Err(CircuitError::numerical(format!(
            "NaN output for {what} voltage"
        )));
    }
    if nodes == 0 || raw.len() != 2 * nodes {
        return Err(CircuitError::shape(what, raw.len()));
    }
    let pairs = deinterleave(raw);
    if query.polar
        && query.zero_voltage_error
        && pairs.iter().any(|(mag, _)| *mag <= ZERO_VOLTAGE)
    {
        let mags: Vec<f64> = pairs.iter().map(|(m, _)| *m).collect();
        return Err(CircuitError::numerical(format!(
            "{what} voltage is out of bounds: {mags:?}"
        )));
    }

    let scalar = query.scalar();
    let pick = |(a, b): (f64, f64)| {
        if scalar {
            Reading::Value(a)
        } else {
            Reading::Pair(a, b)
        }
    };

    match query.phase {
        Some(phase) => Ok(pick(pairs[phase_index(phase, nodes, what)?])),
        None if nodes == 1 => Ok(pick(pairs[0])),
        None if scalar && query.average => {
            Ok(Reading::Value(pairs.iter().map(|(m, _)| m).sum::<f64>() / nodes as f64))
        }
        None if scalar => Ok(Reading::Values(pairs.into_iter().map(|(m, _)| m).collect())),
        None => Ok(Reading::Pairs(pairs)),
    }
}

/// Key a reading by bus, splitting per-phase readings into `bus.<phase>`.
pub fn keyed_by_phase(bus: &str, reading: Reading) -> Vec<(String, Reading)> {
    if reading.phase_count() == 1 {
        return vec![(bus.to_string(), reading)];
    }
    reading
        .into_phases()
        .into_iter()
        .enumerate()
        .map(|(i, r)| (format!("{bus}.{}", i + 1), r))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn branch_terminals_split_in_half() {
        // 2 terminals x 4 conductors (3 phases + neutral)
        let raw: Vec<f64> = (0..16).map(f64::from).collect();
        let t1 = terminal_pairs(&raw, 3, 1, true, "Line \"a\"").unwrap();
        assert_eq!(t1, vec![(0.0, 1.0), (2.0, 3.0), (4.0, 5.0)]);
        let t2 = terminal_pairs(&raw, 3, 2, true, "Line \"a\"").unwrap();
        assert_eq!(t2, vec![(8.0, 9.0), (10.0, 11.0), (12.0, 13.0)]);
    }

    #[test]
    fn single_terminal_drops_trailing_neutral() {
        let raw = [1.0, 2.0, 3.0, 4.0, 0.0, 0.0];
        let pairs = terminal_pairs(&raw, 2, 1, false, "Load \"x\"").unwrap();
        assert_eq!(pairs, vec![(1.0, 2.0), (3.0, 4.0)]);
        assert!(matches!(
            terminal_pairs(&raw, 2, 2, false, "Load \"x\""),
            Err(CircuitError::Reference { .. })
        ));
        assert!(matches!(
            terminal_pairs(&raw, 4, 1, false, "Load \"x\""),
            Err(CircuitError::Shape { .. })
        ));
    }

    #[test]
    fn power_shapes() {
        let three = vec![(1.0, 0.5), (2.0, 0.5), (3.0, 0.5)];
        assert_eq!(
            power_reading(three.clone(), None, true, "x").unwrap(),
            Reading::Pair(6.0, 1.5)
        );
        assert_eq!(
            power_reading(three.clone(), Some(2), false, "x").unwrap(),
            Reading::Pair(2.0, 0.5)
        );
        assert!(matches!(
            power_reading(three, Some(4), false, "x"),
            Err(CircuitError::Reference { .. })
        ));
        assert_eq!(
            power_reading(vec![(5.0, 1.0)], None, false, "x").unwrap(),
            Reading::Pair(5.0, 1.0)
        );
        let four = vec![(1.0, 0.0); 4];
        assert!(matches!(
            power_reading(four, None, false, "x"),
            Err(CircuitError::Shape { .. })
        ));
        assert!(matches!(
            power_reading(vec![(f64::NAN, 0.0)], None, false, "x"),
            Err(CircuitError::Numerical { .. })
        ));
    }

    #[test]
    fn current_shapes() {
        let pairs = vec![(10.0, -30.0), (11.0, -150.0), (12.0, 90.0)];
        let q = CurrentQuery::default();
        assert_eq!(
            current_reading(pairs.clone(), &q, "x").unwrap(),
            Reading::Values(vec![10.0, 11.0, 12.0])
        );
        assert_eq!(
            current_reading(pairs.clone(), &q.total(), "x").unwrap(),
            Reading::Value(33.0)
        );
        assert_eq!(
            current_reading(pairs.clone(), &q.phase(3), "x").unwrap(),
            Reading::Pair(12.0, 90.0)
        );
        assert_eq!(
            current_reading(pairs, &q.with_angles(), "x").unwrap().phase_count(),
            3
        );
        assert_eq!(
            current_reading(vec![(4.0, 1.0)], &q, "x").unwrap(),
            Reading::Value(4.0)
        );
    }

    #[test]
    fn voltage_shapes() {
        let raw = [1.01, 0.0, 1.03, -120.0, 0.99, 120.0];
        let q = VoltageQuery::default();
        assert_eq!(
            voltage_reading(&raw, 3, &q, "Bus 671").unwrap(),
            Reading::Values(vec![1.01, 1.03, 0.99])
        );
        let avg = voltage_reading(&raw, 3, &q.average(), "Bus 671")
            .unwrap()
            .as_value()
            .unwrap();
        assert!((avg - 1.01).abs() < 1e-12);
        assert_eq!(
            voltage_reading(&raw, 3, &q.phase(2).with_angles(), "Bus 671").unwrap(),
            Reading::Pair(1.03, -120.0)
        );
        assert!(matches!(
            voltage_reading(&raw, 2, &q, "Bus 671"),
            Err(CircuitError::Shape { .. })
        ));
        assert!(matches!(
            voltage_reading(&[0.0, 0.0], 1, &q.zero_voltage_error(), "Bus x"),
            Err(CircuitError::Numerical { .. })
        ));
        // rectangular arrays skip the zero-voltage check
        assert!(voltage_reading(&[0.0, 0.0], 1, &q.rectangular().zero_voltage_error(), "Bus x").is_ok());
    }

    #[test]
    fn keys_split_per_phase() {
        let keyed = keyed_by_phase("632", Reading::Values(vec![1.0, 1.1]));
        assert_eq!(keyed[0].0, "632.1");
        assert_eq!(keyed[1], ("632.2".to_string(), Reading::Value(1.1)));
        assert_eq!(keyed_by_phase("611", Reading::Value(0.97))[0].0, "611");
    }

    proptest! {
        #[test]
        fn single_node_bus_never_yields_sequence(
            mag in 0.5f64..1.5,
            ang in -180.0f64..180.0,
            polar in any::<bool>(),
            mag_only in any::<bool>(),
        ) {
            let query = VoltageQuery { polar, magnitude_only: mag_only, ..VoltageQuery::default() };
            let reading = voltage_reading(&[mag, ang], 1, &query, "Bus x").unwrap();
            prop_assert!(matches!(reading, Reading::Value(_) | Reading::Pair(..)));
        }

        #[test]
        fn total_equals_phase_sum(
            pairs in proptest::collection::vec((-500.0f64..500.0, -500.0f64..500.0), 2..=3)
        ) {
            let per_phase = power_reading(pairs.clone(), None, false, "x").unwrap();
            let total = power_reading(pairs, None, true, "x").unwrap();
            let (p, q) = total.as_pair().unwrap();
            let phases = per_phase.pairs().unwrap();
            prop_assert!((p - phases.iter().map(|x| x.0).sum::<f64>()).abs() < 1e-9);
            prop_assert!((q - phases.iter().map(|x| x.1).sum::<f64>()).abs() < 1e-9);
        }

        #[test]
        fn phase_outside_range_is_reference_error(n in 1usize..=3, phase in 0usize..8) {
            let pairs = vec![(1.0, 1.0); n];
            let result = power_reading(pairs, Some(phase), false, "x");
            if (1..=n).contains(&phase) {
                prop_assert!(result.is_ok());
            } else {
                prop_assert!(matches!(result, Err(CircuitError::Reference { .. })), "expected reference error");
            }
        }

        #[test]
        fn reading_length_matches_phases(n in 2usize..=3, mag in 0.1f64..300.0) {
            let pairs = vec![(mag, 0.0); n];
            let reading = current_reading(pairs, &CurrentQuery::default(), "x").unwrap();
            prop_assert_eq!(reading.phase_count(), n);
        }
    }
}
