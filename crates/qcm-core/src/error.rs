//! Unified error types for the qcm ecosystem
//!
//! This module provides a common error type [`QcmError`] that can represent
//! errors from any part of the system. Domain-specific error types can be
//! converted to `QcmError` for uniform error handling at API boundaries.
//!
//! # Example
//!
//! ```ignore
//! use qcm_core::{QcmError, QcmResult};
//!
//! fn relieve_congestion(case: &str) -> QcmResult<()> {
//!     let network = build_case(case)?;
//!     run_control_loop(&network)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all qcm operations.
///
/// Allows errors from configuration, solving, and validation to be handled
/// uniformly across the optimizer, the evaluator, and the CLI.
#[derive(Error, Debug)]
pub enum QcmError {
    /// I/O errors (file access, profile export, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Solver/algorithm errors (power-flow divergence, swarm invariant
    /// violations)
    #[error("Solver error: {0}")]
    Solver(String),

    /// Configuration errors (bad swarm parameters, mismatched qubit count)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Action/state vector length mismatches
    #[error("Dimension mismatch: {0}")]
    Dimension(String),

    /// Signal-source failures (out-of-range or missing signal components)
    #[error("Signal error: {0}")]
    Signal(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using QcmError.
pub type QcmResult<T> = Result<T, QcmError>;

// Conversion from anyhow::Error
impl From<anyhow::Error> for QcmError {
    fn from(err: anyhow::Error) -> Self {
        QcmError::Other(err.to_string())
    }
}

// Conversion from string-like types for convenience
impl From<String> for QcmError {
    fn from(s: String) -> Self {
        QcmError::Other(s)
    }
}

impl From<&str> for QcmError {
    fn from(s: &str) -> Self {
        QcmError::Other(s.to_string())
    }
}

// JSON parsing errors
impl From<serde_json::Error> for QcmError {
    fn from(err: serde_json::Error) -> Self {
        QcmError::Parse(err.to_string())
    }
}
