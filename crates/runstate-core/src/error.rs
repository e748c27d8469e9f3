//! Error types for RunState

use thiserror::Error;

/// Core RunState errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunStateError {
    // Lookup errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // Type engine errors
    #[error("Illegal transition: {0}")]
    IllegalTransition(String),

    // Connection errors
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    // Convergence errors
    #[error("Transition timed out after {waited_ms} ms; still waiting on {pending:?}")]
    Timeout { waited_ms: u64, pending: Vec<String> },

    // Change feed errors
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RunStateError {
    /// True for the `NotFound` variant
    pub fn is_not_found(&self) -> bool {
        matches!(self, RunStateError::NotFound(_))
    }

    /// True for the `Timeout` variant
    pub fn is_timeout(&self) -> bool {
        matches!(self, RunStateError::Timeout { .. })
    }
}

/// Result type for RunState operations
pub type RunStateResult<T> = Result<T, RunStateError>;
