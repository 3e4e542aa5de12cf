//! Element properties by name.

use crate::circuit::Circuit;
use crate::error::{CircuitError, CircuitResult};
use dss_core::{ElementClass, ElementRef, PropertyValue};
use dss_engine::DssEngine;

impl<E: DssEngine> Circuit<E> {
    /// Declared property names of an element, in index order.
    pub fn get_all_properties(
        &mut self,
        name: &str,
        class: &ElementClass,
    ) -> CircuitResult<Vec<String>> {
        self.select_named(name, class)?;
        Ok(self.engine.element_property_names()?)
    }

    // Index of `prop` on the already selected `element`.
    fn property_index(&mut self, element: &ElementRef, prop: &str) -> CircuitResult<usize> {
        self.engine
            .element_property_names()?
            .iter()
            .position(|p| p.eq_ignore_ascii_case(prop))
            .ok_or_else(|| {
                CircuitError::reference(format!("Could not find {prop} property for {element}"))
            })
    }

    pub fn get_property(
        &mut self,
        name: &str,
        prop: &str,
        class: &ElementClass,
    ) -> CircuitResult<PropertyValue> {
        let element = self.select_named(name, class)?;
        let index = self.property_index(&element, prop)?;
        Ok(PropertyValue::parse(&self.engine.property_value(index)?))
    }

    /// Write a property and check that it reads back as written.
    pub fn set_property(
        &mut self,
        name: &str,
        prop: &str,
        value: impl Into<PropertyValue>,
        class: &ElementClass,
    ) -> CircuitResult<()> {
        let value = value.into();
        let element = self.select_named(name, class)?;
        let index = self.property_index(&element, prop)?;
        self.engine.set_property_value(index, &value.to_string())?;

        let read_back = self.get_property(name, prop, class)?;
        if value.matches(&read_back) {
            Ok(())
        } else {
            Err(CircuitError::Invariant {
                message: format!("{element} {prop}: wrote {value}, read back {read_back}"),
            })
        }
    }

    /// Point the element's yearly shape at the constant load shape.
    pub fn remove_loadshape(&mut self, name: &str, class: &ElementClass) -> CircuitResult<()> {
        self.set_property(name, "yearly", "constant", class)
    }

    pub(crate) fn property_f64(
        &mut self,
        name: &str,
        prop: &str,
        class: &ElementClass,
    ) -> CircuitResult<f64> {
        match self.get_property(name, prop, class)? {
            PropertyValue::Number(v) => Ok(v),
            PropertyValue::Text(text) => Err(CircuitError::numerical(format!(
                "{} {prop} is not numeric: {text:?}",
                ElementRef::new(class.clone(), name)
            ))),
        }
    }
}
