//! dss-circuit: accessor facade over a compiled circuit.
//!
//! `Circuit<E: DssEngine>` turns requests like "phase-2 voltage of bus 671 in
//! per unit" or "total power of Load.671" into engine selections and calls,
//! and folds the engine's flat per-terminal arrays into [`Reading`]s.
//!
//! The engine owns the circuit; this crate keeps no element state between
//! calls.
//!
//! [`Reading`]: dss_core::Reading

pub mod circuit;
pub mod control;
pub mod error;
pub mod options;
pub mod power;
pub mod property;
pub mod reshape;
pub mod storage;
pub mod summary;
pub mod voltage;

pub use circuit::{CONSTANT_LOADSHAPE, Circuit};
pub use control::{DEFAULT_MAX_TAP, clamp_tap};
pub use error::{CircuitError, CircuitResult};
pub use options::{CircuitOptions, CurrentQuery, PowerQuery, SwitchPoint, VoltageQuery};
pub use power::ElementArrays;
pub use storage::StorageDispatch;
pub use summary::{CircuitInfo, ElementRecord};
