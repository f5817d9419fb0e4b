//! Error types for conversion-lab
//!
//! Definition problems are rejected synchronously with enough context to fix
//! the offending config entry. Lookups of unknown ids are not errors and
//! surface as `None` instead.

use thiserror::Error;

use crate::experiment::ExperimentStatus;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// conversion-lab error types
#[derive(Error, Debug)]
pub enum Error {
    /// Experiment, goal or funnel definition rejected at creation time
    #[error("Invalid definition: {0}")]
    Validation(String),

    /// Entity referenced by a mutating call does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Lifecycle transition not permitted by the experiment state machine
    #[error("Invalid transition for experiment '{experiment_id}': {from} -> {to}\nState left unchanged")]
    InvalidTransition {
        /// Experiment whose status change was refused
        experiment_id: String,
        /// Status at the time of the call
        from: ExperimentStatus,
        /// Requested status
        to: ExperimentStatus,
    },

    /// Numeric argument outside its valid domain
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be loaded
    #[error("Config error: {0}")]
    Config(String),

    /// Event sink delivery failed (logged and dropped by the dispatcher)
    #[error("Sink '{sink}' failed: {message}")]
    Sink {
        /// Sink name
        sink: String,
        /// Failure description
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
