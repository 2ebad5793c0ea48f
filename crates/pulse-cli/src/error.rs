//! CLI error types.

use std::path::PathBuf;

use pulse_context::{ContextError, FetchError};
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// A script or fixture file could not be parsed.
    #[error("invalid {kind} file {path}: {reason}")]
    Input {
        /// What the file was supposed to contain.
        kind: &'static str,
        /// File path.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The coordinator rejected an operation.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// An event was rejected while replaying in strict mode.
    #[error("step {step} ({event}) rejected: {source}")]
    Rejected {
        /// One-based step number.
        step: usize,
        /// Event type.
        event: &'static str,
        /// Cause.
        source: ContextError,
    },

    /// Fixture construction failed.
    #[error("fixture error: {0}")]
    Fixture(#[from] FetchError),

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
