//! Fixed-shape phased results.

use crate::numeric::Real;

/// Result of a per-phase query.
///
/// Single-phase results are always [`Reading::Value`] or [`Reading::Pair`];
/// the sequence variants always hold one entry per phase and at least two.
/// Pairs are `(magnitude, angle°)`, `(real, imaginary)` or `(P, Q)` depending
/// on the query that produced them.
#[derive(Clone, Debug, PartialEq)]
pub enum Reading {
    Value(Real),
    Pair(Real, Real),
    Values(Vec<Real>),
    Pairs(Vec<(Real, Real)>),
}

impl Reading {
    /// Build a scalar-per-phase reading, collapsing one phase to a scalar.
    ///
    /// # Panics
    /// Panics on an empty input; callers check phase counts first.
    pub fn from_values(values: Vec<Real>) -> Self {
        assert!(!values.is_empty(), "reading needs at least one phase");
        if values.len() == 1 {
            Self::Value(values[0])
        } else {
            Self::Values(values)
        }
    }

    /// Build a pair-per-phase reading, collapsing one phase to a pair.
    ///
    /// # Panics
    /// Panics on an empty input; callers check phase counts first.
    pub fn from_pairs(pairs: Vec<(Real, Real)>) -> Self {
        assert!(!pairs.is_empty(), "reading needs at least one phase");
        if pairs.len() == 1 {
            let (a, b) = pairs[0];
            Self::Pair(a, b)
        } else {
            Self::Pairs(pairs)
        }
    }

    /// Number of phases this reading covers (aggregates count as one).
    pub fn phase_count(&self) -> usize {
        match self {
            Self::Value(_) | Self::Pair(..) => 1,
            Self::Values(v) => v.len(),
            Self::Pairs(p) => p.len(),
        }
    }

    pub fn as_value(&self) -> Option<Real> {
        match self {
            Self::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<(Real, Real)> {
        match self {
            Self::Pair(a, b) => Some((*a, *b)),
            _ => None,
        }
    }

    pub fn values(&self) -> Option<&[Real]> {
        match self {
            Self::Values(v) => Some(v),
            _ => None,
        }
    }

    pub fn pairs(&self) -> Option<&[(Real, Real)]> {
        match self {
            Self::Pairs(p) => Some(p),
            _ => None,
        }
    }

    /// Component-wise sum over phases.
    pub fn summed(&self) -> Self {
        match self {
            Self::Value(_) | Self::Pair(..) => self.clone(),
            Self::Values(v) => Self::Value(v.iter().sum()),
            Self::Pairs(p) => {
                let (a, b) = p
                    .iter()
                    .fold((0.0, 0.0), |(sa, sb), (a, b)| (sa + a, sb + b));
                Self::Pair(a, b)
            }
        }
    }

    /// Split a per-phase reading into one single-phase reading per phase.
    pub fn into_phases(self) -> Vec<Self> {
        match self {
            Self::Values(v) => v.into_iter().map(Self::Value).collect(),
            Self::Pairs(p) => p.into_iter().map(|(a, b)| Self::Pair(a, b)).collect(),
            single => vec![single],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn single_phase_collapses() {
        assert_eq!(Reading::from_values(vec![1.02]), Reading::Value(1.02));
        assert_eq!(Reading::from_pairs(vec![(1.0, -2.0)]), Reading::Pair(1.0, -2.0));
        assert_eq!(Reading::from_values(vec![1.0, 2.0]).phase_count(), 2);
    }

    #[test]
    fn split_into_phases() {
        let r = Reading::Pairs(vec![(1.0, 0.0), (2.0, -120.0)]);
        assert_eq!(
            r.into_phases(),
            vec![Reading::Pair(1.0, 0.0), Reading::Pair(2.0, -120.0)]
        );
        assert_eq!(Reading::Value(3.0).into_phases(), vec![Reading::Value(3.0)]);
    }

    proptest! {
        #[test]
        fn summed_pairs_equal_phase_sums(
            pairs in proptest::collection::vec((-1e4f64..1e4, -1e4f64..1e4), 2..4)
        ) {
            let reading = Reading::from_pairs(pairs.clone());
            let (p, q) = reading.summed().as_pair().unwrap();
            let p_sum: f64 = pairs.iter().map(|x| x.0).sum();
            let q_sum: f64 = pairs.iter().map(|x| x.1).sum();
            prop_assert!((p - p_sum).abs() < 1e-6);
            prop_assert!((q - q_sum).abs() < 1e-6);
        }

        #[test]
        fn length_matches_phase_count(values in proptest::collection::vec(0.0f64..2.0, 1..5)) {
            let n = values.len();
            let reading = Reading::from_values(values);
            prop_assert_eq!(reading.phase_count(), n);
            prop_assert_eq!(reading.into_phases().len(), n);
        }
    }
}
