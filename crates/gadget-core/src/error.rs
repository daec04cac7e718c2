// crates/gadget-core/src/error.rs

use thiserror::Error;

/// Simulator-wide error types.
#[derive(Debug, Error)]
pub enum GadgetError {
    /// Configuration rejected at start (lambda <= 0, T < 1, ...).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The mixing-matrix oracle failed or returned an unusable matrix.
    #[error("Mixing oracle error: {0}")]
    MixingOracle(String),

    /// Training data could not be parsed or partitioned.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Topology construction or lookup error.
    #[error("Topology error: {0}")]
    Topology(String),

    /// Invalid phase transition.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<serde_json::Error> for GadgetError {
    fn from(e: serde_json::Error) -> Self {
        GadgetError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for GadgetError {
    fn from(e: std::io::Error) -> Self {
        GadgetError::Io(e.to_string())
    }
}
