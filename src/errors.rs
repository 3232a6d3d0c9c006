//! Typed error hierarchy for the board core.
//!
//! `BoardError` is the only error type that crosses the library boundary.
//! Storage and CLI internals use `anyhow` with context and convert at the
//! edge via `Persistence`.

use thiserror::Error;

/// Errors from board mutation, session control and persistence.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Task {id} not found")]
    TaskNotFound { id: String },

    #[error("Column {id} not found")]
    ColumnNotFound { id: String },

    #[error("Board invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Session is still loading the board for {user_id}")]
    SessionNotReady { user_id: String },

    #[error("Persistence error: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl BoardError {
    /// True for the identifier-not-found family that the mutator may tolerate.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BoardError::TaskNotFound { .. } | BoardError::ColumnNotFound { .. }
        )
    }
}
