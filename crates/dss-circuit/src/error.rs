//! Facade errors.

use dss_core::DssError;
use dss_engine::EngineError;
use thiserror::Error;

pub type CircuitResult<T> = Result<T, CircuitError>;

#[derive(Error, Debug)]
pub enum CircuitError {
    /// Element, property, bus or phase that does not exist.
    #[error("Reference error: {message}")]
    Reference { message: String },

    /// NaN (or an out-of-range value) in an engine result.
    #[error("Bad result: {message}")]
    Numerical { message: String },

    /// The engine's solve step failed or reported a status.
    #[error("Solve failed: {message}")]
    Solve {
        message: String,
        #[source]
        source: Option<EngineError>,
    },

    /// A write that did not read back as written.
    #[error("Invariant violated: {message}")]
    Invariant { message: String },

    #[error("Invalid argument: {message}")]
    InvalidArg { message: String },

    /// An engine array whose length does not match the element or bus.
    #[error("Unexpected engine array for {what}: {len} values")]
    Shape { what: String, len: usize },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Core(#[from] DssError),
}

impl CircuitError {
    pub fn reference(message: impl Into<String>) -> Self {
        Self::Reference {
            message: message.into(),
        }
    }

    pub fn numerical(message: impl Into<String>) -> Self {
        Self::Numerical {
            message: message.into(),
        }
    }

    pub fn invalid_arg(message: impl Into<String>) -> Self {
        Self::InvalidArg {
            message: message.into(),
        }
    }

    pub fn shape(what: impl Into<String>, len: usize) -> Self {
        Self::Shape {
            what: what.into(),
            len,
        }
    }
}
