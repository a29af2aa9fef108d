//! Job lifecycle events.
//!
//! A job task runs inside [`job_span`], which carries `job_id` and
//! `source_id`. Each [`JobEvent`] adds only the fields of its own stage.

use std::path::PathBuf;
use tracing::{error, info, warn, Span};

use sclip_models::{JobId, SourceId};

use crate::error::WorkerError;

/// Span wrapping everything one job task logs.
pub fn job_span(job_id: &JobId, source_id: &SourceId) -> Span {
    tracing::info_span!("job", job_id = %job_id, source_id = %source_id)
}

/// Something that happened to a running job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Started { watch_url: String },
    /// Metadata fell back to the placeholder title and nominal duration
    MetadataDegraded { reason: String },
    Acquired { path: PathBuf, elapsed_secs: f64 },
    Clips { produced: usize, planned: usize },
    ThumbnailFailed { reason: String },
    Completed { produced: usize, planned: usize, thumbnail: bool },
    Failed { stage: &'static str, reason: String },
    /// The `failed` write itself did not go through
    FailureNotRecorded { reason: String },
    /// The job was deleted while its task was running
    Abandoned,
    CleanupIncomplete { failures: usize },
}

impl JobEvent {
    pub fn failed(error: &WorkerError) -> Self {
        Self::Failed {
            stage: error.stage(),
            reason: error.to_string(),
        }
    }

    /// Value of the `event` field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::MetadataDegraded { .. } => "metadata_degraded",
            Self::Acquired { .. } => "acquired",
            Self::Clips { .. } => "clips",
            Self::ThumbnailFailed { .. } => "thumbnail_failed",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::FailureNotRecorded { .. } => "failure_not_recorded",
            Self::Abandoned => "abandoned",
            Self::CleanupIncomplete { .. } => "cleanup_incomplete",
        }
    }

    /// Log the event in the current span.
    pub fn emit(&self) {
        let event = self.name();
        match self {
            Self::Started { watch_url } => info!(event, watch_url = %watch_url, "Job started"),
            Self::MetadataDegraded { reason } => {
                warn!(event, reason = %reason, "Metadata unavailable, using fallback title and duration")
            }
            Self::Acquired { path, elapsed_secs } => info!(
                event,
                path = %path.display(),
                elapsed_secs = *elapsed_secs,
                "Source acquired"
            ),
            Self::Clips { produced, planned } if produced < planned => warn!(
                event,
                produced = *produced,
                planned = *planned,
                "Some clip ranges could not be cut"
            ),
            Self::Clips { produced, planned } => {
                info!(event, produced = *produced, planned = *planned, "Clips cut")
            }
            Self::ThumbnailFailed { reason } => {
                warn!(event, reason = %reason, "Thumbnail failed, clips keep no thumbnail")
            }
            Self::Completed { produced, planned, thumbnail } => info!(
                event,
                produced = *produced,
                planned = *planned,
                thumbnail = *thumbnail,
                "Job completed"
            ),
            Self::Failed { stage, reason } => error!(event, stage = *stage, reason = %reason, "Job failed"),
            Self::FailureNotRecorded { reason } => {
                error!(event, reason = %reason, "Could not mark job failed")
            }
            Self::Abandoned => info!(event, "Job deleted while running, stopping"),
            Self::CleanupIncomplete { failures } => {
                warn!(event, failures = *failures, "Some job files could not be removed")
            }
        }
    }
}
