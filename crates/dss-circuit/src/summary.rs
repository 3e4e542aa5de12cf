//! Circuit-wide totals and element listings.

use crate::circuit::Circuit;
use crate::error::{CircuitError, CircuitResult};
use crate::options::PowerQuery;
use dss_core::{ElementClass, PropertyValue};
use dss_engine::DssEngine;
use std::fmt;

/// One element with its declared properties.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementRecord {
    pub name: String,
    pub properties: Vec<(String, PropertyValue)>,
}

impl ElementRecord {
    /// Property by case-insensitive name.
    pub fn get(&self, prop: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(prop))
            .map(|(_, v)| v)
    }
}

/// Labelled circuit totals in MW and MVAR.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CircuitInfo {
    entries: Vec<(String, f64)>,
}

impl CircuitInfo {
    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| *v)
    }

    fn push(&mut self, label: String, value: f64) {
        self.entries.push((label, value));
    }
}

impl fmt::Display for CircuitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.entries.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
        for (label, value) in &self.entries {
            writeln!(f, "{label:<width$}  {value:>10.4}")?;
        }
        Ok(())
    }
}

impl<E: DssEngine> Circuit<E> {
    /// Every element of a class with its properties.
    pub fn get_all_elements(&mut self, class: &ElementClass) -> CircuitResult<Vec<ElementRecord>> {
        let names = self.engine.class_element_names(class)?;
        let mut records = Vec::with_capacity(names.len());
        for name in names {
            let props = self.get_all_properties(&name, class)?;
            let mut properties = Vec::with_capacity(props.len());
            for (index, prop) in props.into_iter().enumerate() {
                let raw = self.engine.property_value(index)?;
                properties.push((prop, PropertyValue::parse(&raw)));
            }
            records.push(ElementRecord { name, properties });
        }
        Ok(records)
    }

    /// Power drawn by the circuit in kW/kvar (positive = consuming).
    pub fn get_circuit_power(&mut self) -> CircuitResult<(f64, f64)> {
        let powers = self.engine.total_power()?;
        let (p, q) = match powers.as_slice() {
            [p, q] => (-p, -q),
            [pa, qa, pb, qb, pc, qc] => (-(pa + pb + pc), -(qa + qb + qc)),
            _ => return Err(CircuitError::shape("circuit total power", powers.len())),
        };
        if p.is_nan() || q.is_nan() {
            return Err(CircuitError::numerical(format!(
                "NaN output for circuit power: ({p}, {q})"
            )));
        }
        Ok((p, q))
    }

    /// Circuit losses in kW/kvar.
    pub fn get_losses(&mut self) -> CircuitResult<(f64, f64)> {
        let (p, q) = self.engine.losses()?;
        Ok((p / 1000.0, q / 1000.0))
    }

    /// Summed power of every element of a class, kW/kvar.
    ///
    /// Storage units report the negated `kW`/`kvar` properties (the engine
    /// stores them as output). Classes without powers give `(0, 0)`.
    pub fn get_total_power(&mut self, class: &ElementClass) -> CircuitResult<(f64, f64)> {
        let (mut p_total, mut q_total) = (0.0, 0.0);
        match class {
            c if c.accepts_setpoints() || c.is_branch() => {
                for name in self.engine.class_element_names(class)? {
                    let total = self.get_power(&name, class, PowerQuery::default().total())?;
                    let (p, q) = total.as_pair().ok_or_else(|| {
                        CircuitError::shape(format!("{class} \"{name}\" power"), total.phase_count())
                    })?;
                    p_total += p;
                    q_total += q;
                }
            }
            ElementClass::Storage => {
                for name in self.storage_names().to_vec() {
                    p_total -= self.property_f64(&name, "kW", class)?;
                    q_total -= self.property_f64(&name, "kvar", class)?;
                }
            }
            _ => {}
        }
        Ok((p_total, q_total))
    }

    /// Totals for the circuit, its losses and every included class.
    pub fn get_circuit_info(&mut self) -> CircuitResult<CircuitInfo> {
        let (p_total, q_total) = self.get_circuit_power()?;
        let (p_loss, q_loss) = self.get_losses()?;
        let mut by_class = Vec::new();
        for class in self.included_classes().to_vec() {
            let totals = self.get_total_power(&class)?;
            by_class.push((class, totals));
        }

        let mut info = CircuitInfo::default();
        info.push("Total P (MW)".into(), p_total / 1000.0);
        info.push("Total Loss P (MW)".into(), p_loss / 1000.0);
        for (class, (p, _)) in &by_class {
            info.push(format!("Total {} P (MW)", class.label()), p / 1000.0);
        }
        info.push("Total Q (MVAR)".into(), q_total / 1000.0);
        info.push("Total Loss Q (MVAR)".into(), q_loss / 1000.0);
        for (class, (_, q)) in &by_class {
            info.push(format!("Total {} Q (MVAR)", class.label()), q / 1000.0);
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_lookup_and_display() {
        let mut info = CircuitInfo::default();
        info.push("Total P (MW)".into(), 3.4661);
        info.push("Total Loss P (MW)".into(), 0.1124);
        assert_eq!(info.get("Total P (MW)"), Some(3.4661));
        assert_eq!(info.get("Total Q (MVAR)"), None);
        let text = info.to_string();
        assert!(text.lines().next().unwrap().starts_with("Total P (MW)"));
        assert!(text.contains("0.1124"));
    }

    #[test]
    fn record_lookup_ignores_case() {
        let record = ElementRecord {
            name: "671".into(),
            properties: vec![("kW".into(), PropertyValue::Number(1155.0))],
        };
        assert_eq!(record.get("KW"), Some(&PropertyValue::Number(1155.0)));
        assert!(record.get("kvar").is_none());
    }
}
