//! dss-engine: the seam between dsstap and a power-flow engine.
//!
//! Provides:
//! - `DssEngine` trait: every engine capability the accessor layer relies on
//! - `MemoryEngine`: an in-process circuit replayed from a snapshot file
//! - `CApiEngine` (feature `capi`): bindings to the DSS C-API shared library
//!
//! # Architecture
//!
//! The engine owns the circuit graph, the admittance matrix and the power-flow
//! iteration. This crate only defines the calls made into it, so the rest of
//! dsstap never touches FFI or engine-global state directly.
//!
//! # Example
//!
//! ```no_run
//! use dss_core::{ElementClass, ElementRef};
//! use dss_engine::{DssEngine, ElementArray, MemoryEngine};
//!
//! let mut engine = MemoryEngine::from_snapshot_file("ieee13_snapshot.json").unwrap();
//! engine.solve(dss_engine::SolveMode::Normal).unwrap();
//! engine.set_active_element(&ElementRef::new(ElementClass::Load, "671")).unwrap();
//! let powers = engine.element_array(ElementArray::Powers).unwrap();
//! println!("Load.671 powers: {powers:?}");
//! ```

#[cfg(feature = "capi")]
pub mod capi;
pub mod error;
pub mod memory;
pub mod model;
pub mod script;
pub mod snapshot;

#[cfg(feature = "capi")]
pub use capi::CApiEngine;
pub use error::{EngineError, EngineResult};
pub use memory::MemoryEngine;
pub use model::{DssEngine, ElementArray, SolveMode, VoltageForm};
pub use snapshot::{BusSnapshot, CircuitSnapshot, ElementSnapshot};
