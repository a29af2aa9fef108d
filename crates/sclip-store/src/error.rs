//! Store error types.

use sclip_models::{JobStatus, TransitionError};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Status changed concurrently: expected {expected}, found {actual}")]
    Conflict { expected: JobStatus, actual: JobStatus },

    #[error("Job already finished with status {0}")]
    Terminal(JobStatus),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    /// True if the record no longer exists (e.g. deleted mid-run).
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
