//! Error types for observatory-core operations.
//!
//! Most failures in a resolution pass degrade gracefully and never surface
//! here; these are the ones a caller has to decide about.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ObservatoryError {
    // ─────────────────────────────────────────────────────────────────────
    // Input Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("No event source could be opened: {0}")]
    NoEventSource(String),

    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Subprocess Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Command execution failed: {command}: {details}")]
    CommandFailed { command: String, details: String },

    #[error("Command timed out after {timeout_ms}ms: {command}")]
    CommandTimedOut { command: String, timeout_ms: u64 },
}

/// Convenience type alias for Results using ObservatoryError.
pub type Result<T> = std::result::Result<T, ObservatoryError>;

impl From<ObservatoryError> for String {
    fn from(err: ObservatoryError) -> String {
        err.to_string()
    }
}
