//! Engine errors.

use thiserror::Error;

/// Result type for engine calls.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors reported by, or while talking to, a power-flow engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Error raised inside the engine (error number and description).
    #[error("Engine error #{code}: {message}")]
    Dss { code: i32, message: String },

    /// A text command the engine rejected.
    #[error("Command failed ({command}): {message}")]
    Command { command: String, message: String },

    /// A call that needs an active bus/element ran without one.
    #[error("No active {what}")]
    NoActive { what: &'static str },

    /// Operation the backend cannot perform.
    #[error("Not supported by {backend}: {what}")]
    NotSupported { backend: &'static str, what: String },

    /// Index outside an engine-side list.
    #[error("Index out of bounds: {what} (index={index}, len={len})")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// Snapshot file could not be interpreted.
    #[error("Snapshot error: {message}")]
    Snapshot { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = EngineError::Dss {
            code: 485,
            message: "Solution did not converge".into(),
        };
        assert!(err.to_string().contains("#485"));

        let err = EngineError::Command {
            command: "edit Load.x kW=1".into(),
            message: "Load \"x\" not found".into(),
        };
        assert!(err.to_string().contains("edit Load.x"));
    }
}
