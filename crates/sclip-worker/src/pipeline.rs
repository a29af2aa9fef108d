//! The per-job pipeline.
//!
//! ```text
//! queued -> downloading   metadata lookup (soft) + acquisition (hard)
//!        -> processing    segmentation + thumbnail (both soft)
//!        -> completed     clips persisted with the status change
//! ```
//!
//! Every status write is a compare-and-set. If the job was deleted meanwhile
//! the write fails with `NotFound` and the pipeline stops.

use std::sync::Arc;
use std::time::Instant;

use sclip_media::{generate_clips, plan_segments, MediaTools};
use sclip_models::{JobId, JobStatus, SourceId};
use sclip_store::JobStore;

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobEvent;
use crate::metrics;
use crate::paths::JobPaths;

/// Everything one job task owns.
#[derive(Clone)]
pub struct JobContext {
    pub job_id: JobId,
    pub source_id: SourceId,
    pub paths: JobPaths,
    pub store: Arc<dyn JobStore>,
    pub tools: Arc<dyn MediaTools>,
}

impl JobContext {
    pub fn new(
        job_id: JobId,
        source_id: SourceId,
        paths: JobPaths,
        store: Arc<dyn JobStore>,
        tools: Arc<dyn MediaTools>,
    ) -> Self {
        Self {
            job_id,
            source_id,
            paths,
            store,
            tools,
        }
    }
}

/// Result of a pipeline that reached `completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub planned: usize,
    pub produced: usize,
    pub thumbnail: bool,
}

/// Run the job from `queued` to `completed`.
pub async fn run_pipeline(ctx: &JobContext) -> WorkerResult<PipelineOutcome> {
    let store = ctx.store.as_ref();
    let tools = ctx.tools.as_ref();

    JobEvent::Started { watch_url: ctx.source_id.watch_url() }.emit();
    store
        .transition(&ctx.job_id, JobStatus::Queued, JobStatus::Downloading)
        .await?;

    let metadata = tools.fetch_metadata(&ctx.source_id).await;
    if !metadata.success {
        JobEvent::MetadataDegraded {
            reason: metadata.error.clone().unwrap_or_else(|| "unknown error".to_string()),
        }
        .emit();
    }
    store.set_title(&ctx.job_id, &metadata.title).await?;

    let started = Instant::now();
    tools
        .acquire(&ctx.source_id, &ctx.paths.video)
        .await
        .map_err(|e| WorkerError::acquisition_failed(e.to_string()))?;
    let elapsed_secs = started.elapsed().as_secs_f64();
    metrics::record_acquisition_duration(elapsed_secs);
    JobEvent::Acquired { path: ctx.paths.video.clone(), elapsed_secs }.emit();

    store
        .transition(&ctx.job_id, JobStatus::Downloading, JobStatus::Processing)
        .await?;

    let planned = plan_segments(metadata.duration_secs).len();
    let clips = generate_clips(
        tools,
        &ctx.paths.video,
        &ctx.job_id,
        metadata.duration_secs,
        &ctx.paths.clips_dir,
    )
    .await;
    metrics::record_clips(clips.len(), planned - clips.len());
    JobEvent::Clips { produced: clips.len(), planned }.emit();

    let thumbnail = match tools.thumbnail(&ctx.paths.video, &ctx.paths.thumbnail).await {
        Ok(()) => Some(ctx.paths.thumbnail.to_string_lossy().to_string()),
        Err(e) => {
            JobEvent::ThumbnailFailed { reason: e.to_string() }.emit();
            None
        }
    };

    let outcome = PipelineOutcome {
        planned,
        produced: clips.len(),
        thumbnail: thumbnail.is_some(),
    };
    let clips: Vec<_> = clips
        .into_iter()
        .map(|clip| clip.with_thumbnail(thumbnail.clone()))
        .collect();

    store.complete_job(&ctx.job_id, &clips).await?;
    Ok(outcome)
}
