//! Worker error types.

use thiserror::Error;

use sclip_models::{QuotaExceeded, SourceError};
use sclip_store::StoreError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    InvalidSource(#[from] SourceError),

    #[error(transparent)]
    QuotaExceeded(#[from] QuotaExceeded),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Clip not found: {0}")]
    ClipNotFound(String),

    #[error("Acquisition failed: {0}")]
    AcquisitionFailed(String),

    #[error("Job task panicked: {0}")]
    Panicked(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl WorkerError {
    pub fn acquisition_failed(msg: impl Into<String>) -> Self {
        Self::AcquisitionFailed(msg.into())
    }

    pub fn job_not_found(id: impl ToString) -> Self {
        Self::JobNotFound(id.to_string())
    }

    /// True if the job record disappeared underneath the pipeline.
    pub fn is_job_gone(&self) -> bool {
        matches!(self, WorkerError::Store(e) if e.is_not_found())
    }

    /// Where a job failed, as used in logs and the failure metric.
    pub fn stage(&self) -> &'static str {
        match self {
            WorkerError::AcquisitionFailed(_) => "acquisition",
            WorkerError::Panicked(_) => "panic",
            WorkerError::Store(_) => "store",
            _ => "pipeline",
        }
    }
}
