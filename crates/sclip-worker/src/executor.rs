//! Background job execution.
//!
//! Each job runs on its own task. The pipeline itself runs on an inner task so
//! that a panic surfaces as a `JoinError` and the job can still be marked
//! `failed`.

use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::error::WorkerError;
use crate::logging::{job_span, JobEvent};
use crate::metrics;
use crate::pipeline::{run_pipeline, JobContext};

/// Spawn the pipeline for `ctx` and return immediately.
pub fn spawn_job(ctx: JobContext) -> JoinHandle<()> {
    let span = job_span(&ctx.job_id, &ctx.source_id);
    tokio::spawn(
        async move {
            let inner_ctx = ctx.clone();
            let handle = tokio::spawn(
                async move { run_pipeline(&inner_ctx).await }.in_current_span(),
            );

            match handle.await {
                Ok(Ok(outcome)) => {
                    metrics::record_job_completed();
                    JobEvent::Completed {
                        produced: outcome.produced,
                        planned: outcome.planned,
                        thumbnail: outcome.thumbnail,
                    }
                    .emit();
                }
                Ok(Err(e)) => finish_with_error(&ctx, e).await,
                Err(join_error) => {
                    finish_with_error(&ctx, WorkerError::Panicked(join_error.to_string())).await
                }
            }
        }
        .instrument(span),
    )
}

async fn finish_with_error(ctx: &JobContext, error: WorkerError) {
    if error.is_job_gone() {
        JobEvent::Abandoned.emit();
        cleanup(ctx).await;
        return;
    }

    metrics::record_job_failed(error.stage());
    JobEvent::failed(&error).emit();

    // Single attempt; a failed write is only logged.
    match ctx.store.fail_job(&ctx.job_id, &error.to_string()).await {
        Ok(_) => {}
        Err(e) if e.is_not_found() => cleanup(ctx).await,
        Err(e) => JobEvent::FailureNotRecorded { reason: e.to_string() }.emit(),
    }
}

async fn cleanup(ctx: &JobContext) {
    let failures = ctx.paths.remove_all(&[]).await;
    if failures > 0 {
        JobEvent::CleanupIncomplete { failures }.emit();
    }
}
