//! The circuit session: construction, commands and element selection.

use crate::error::{CircuitError, CircuitResult};
use crate::options::CircuitOptions;
use dss_core::{ElementClass, ElementRef};
use dss_engine::{DssEngine, SolveMode};
use std::path::Path;
use tracing::{debug, info, warn};

/// Load shape that `remove_loadshape` points elements at.
pub const CONSTANT_LOADSHAPE: &str = "New Loadshape.constant npts=1 interval=1 mult=1 qmult=1";

/// Classes whose presence is detected at construction, in report order.
/// Storage is detected separately because its unit names are kept.
const DETECTED_CLASSES: [ElementClass; 3] =
    [ElementClass::Load, ElementClass::PV, ElementClass::Generator];

/// A compiled circuit inside a power-flow engine.
///
/// Every query re-selects its element or bus; the only state kept here is
/// which optional classes the circuit contains and the names of its storage
/// units. Operations take `&mut self` because selection mutates the engine.
#[derive(Debug)]
pub struct Circuit<E: DssEngine> {
    pub(crate) engine: E,
    included: Vec<ElementClass>,
    storage_names: Vec<String>,
    options: CircuitOptions,
}

impl<E: DssEngine> Circuit<E> {
    /// Compile the circuit and run the initial zero-length step.
    pub fn new(engine: E, options: CircuitOptions) -> CircuitResult<Self> {
        let step_s = options.step_seconds();
        if !(step_s.is_finite() && step_s > 0.0) {
            return Err(CircuitError::invalid_arg(format!(
                "time step must be positive, got {step_s} s"
            )));
        }

        info!(backend = engine.backend_name(), "DSS compiling");
        let mut circuit = Self {
            engine,
            included: Vec::new(),
            storage_names: Vec::new(),
            options,
        };

        for path in circuit.options.redirects.clone() {
            circuit.redirect(&path)?;
        }
        circuit.run_command(CONSTANT_LOADSHAPE)?;

        for class in DETECTED_CLASSES {
            if !circuit.engine.class_element_names(&class)?.is_empty() {
                circuit.included.push(class);
            }
        }
        circuit.storage_names = circuit
            .engine
            .class_element_names(&ElementClass::Storage)?
            .into_iter()
            .map(|n| strip_class_prefix(&n, "storage."))
            .collect();
        if !circuit.storage_names.is_empty() {
            circuit.included.push(ElementClass::Storage);
        }

        circuit.run_command("set mode=yearly")?;
        circuit.engine.set_solution_number(1)?;
        circuit.engine.set_hour(circuit.options.start_hour())?;

        circuit.engine.set_step_size(0.0)?;
        circuit.run_dss(false)?;
        circuit.engine.set_step_size(step_s)?;

        let name = circuit.engine.circuit_name()?;
        info!(circuit = %name, included = ?circuit.included, "DSS compiled circuit");
        Ok(circuit)
    }

    pub fn options(&self) -> &CircuitOptions {
        &self.options
    }

    /// Optional classes present at construction (Load, PV, Generator,
    /// Storage), in that order.
    pub fn included_classes(&self) -> &[ElementClass] {
        &self.included
    }

    pub fn includes(&self, class: &ElementClass) -> bool {
        self.included.contains(class)
    }

    pub fn storage_names(&self) -> &[String] {
        &self.storage_names
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Direct engine access for calls the facade does not wrap.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Forward a scripting command. A non-empty result is logged and returned.
    pub fn run_command(&mut self, cmd: &str) -> CircuitResult<String> {
        let status = self.engine.command(cmd)?;
        if !status.is_empty() {
            info!(command = cmd, status = %status, "DSS status");
        }
        Ok(status)
    }

    pub fn redirect(&mut self, path: impl AsRef<Path>) -> CircuitResult<()> {
        let path = path.as_ref();
        info!(file = %path.display(), "DSS running file");
        self.run_command(&format!("Redirect \"{}\"", path.display()))?;
        Ok(())
    }

    /// Solve one time step.
    ///
    /// An engine error or a non-empty solve status is a failure: the event
    /// log export is attempted first, then the original failure returned.
    pub fn run_dss(&mut self, no_controls: bool) -> CircuitResult<()> {
        let mode = if no_controls {
            SolveMode::NoControl
        } else {
            SolveMode::Normal
        };

        let failure = match self.engine.solve(mode) {
            Ok(status) if status.is_empty() => None,
            Ok(status) => Some((status, None)),
            Err(e) => Some((e.to_string(), Some(e))),
        };
        if let Some((message, source)) = failure {
            warn!(status = %message, "DSS solve failed");
            if let Err(e) = self.engine.command("export Eventlog") {
                warn!(error = %e, "event log export failed");
            }
            return Err(CircuitError::Solve { message, source });
        }

        if self.includes(&ElementClass::Storage) {
            self.engine.update_storage()?;
        }
        Ok(())
    }

    /// Make `element` active, failing unless the engine reports that exact
    /// class and name as active.
    pub(crate) fn select(&mut self, element: &ElementRef) -> CircuitResult<()> {
        let active = self.engine.set_active_element(element)?;
        debug!(element = %element, "select");
        if active.as_ref() == Some(element) {
            Ok(())
        } else {
            Err(CircuitError::reference(format!("{element} does not exist")))
        }
    }

    pub(crate) fn select_named(
        &mut self,
        name: &str,
        class: &ElementClass,
    ) -> CircuitResult<ElementRef> {
        let element = ElementRef::new(class.clone(), name);
        self.select(&element)?;
        Ok(element)
    }
}

fn strip_class_prefix(name: &str, prefix: &str) -> String {
    match name.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => name[prefix.len()..].to_string(),
        _ => name.to_string(),
    }
}
