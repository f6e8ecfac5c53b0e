//! Error types for the Spindle solver.
//!
//! All crates return `SpindleResult<T>` from fallible operations.
//! Numerical degeneracy in kernel evaluation (coincident points) is not
//! an error — kernels regularize or zero those contributions locally.

use thiserror::Error;

/// Unified error type for the Spindle solver.
#[derive(Debug, Error)]
pub enum SpindleError {
    /// Precompute data is malformed: wrong array shape, missing key, or
    /// a node-count/partition inconsistency across processes. Fatal —
    /// the simulation cannot proceed with inconsistent geometry.
    #[error("Invalid precompute data: {0}")]
    Precompute(String),

    /// A capability (e.g. a collision test) was requested on a shape
    /// variant that does not implement it. This is a model-construction
    /// error, not a runtime numerical condition.
    #[error("Unsupported operation for shape '{shape}': {operation}")]
    UnsupportedShape { shape: &'static str, operation: &'static str },

    /// The outer Krylov solve exhausted its iteration budget. The outer
    /// time-stepper may recover by reducing the timestep and retrying.
    #[error("Krylov solve did not converge after {iterations} iterations (residual: {residual:.2e})")]
    NonConvergence { iterations: u32, residual: f64 },

    /// Configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A distributed collective failed or was used inconsistently.
    #[error("Communicator error: {0}")]
    Communicator(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `Result<T, SpindleError>`.
pub type SpindleResult<T> = Result<T, SpindleError>;
