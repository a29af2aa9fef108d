//! Clip segmentation.
//!
//! The boundary policy is tiered on source duration `d`:
//!
//! | d (s)          | clips | length |
//! |----------------|-------|--------|
//! | d <= 60        | 1     | d      |
//! | 60 < d <= 300  | 3     | 30     |
//! | d > 300        | 5     | 60     |
//!
//! Clip `i` starts at `i * d / count`. Lengths are capped at that spacing so
//! ranges never overlap, and ends are capped at `d`. An unknown duration
//! (zero, negative or non-finite) is replaced by [`NOMINAL_DURATION_SECS`].

use std::path::Path;
use tracing::{debug, info, warn};

use sclip_models::{Clip, JobId};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::tools::MediaTools;

/// Duration assumed when the source duration is unknown.
pub const NOMINAL_DURATION_SECS: f64 = 30.0;

/// Default timeout for a single stream-copy trim.
pub const DEFAULT_TRIM_TIMEOUT_SECS: u64 = 60;

/// Sources up to this long produce one full-length clip.
const SHORT_SOURCE_MAX_SECS: f64 = 60.0;

/// Sources up to this long produce three 30 s clips.
const MEDIUM_SOURCE_MAX_SECS: f64 = 300.0;

/// A planned clip range in seconds, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentRange {
    /// 0-based position in the plan
    pub index: usize,
    pub start: f64,
    pub end: f64,
}

impl SegmentRange {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// The duration the policy is evaluated on.
pub fn effective_duration(duration_secs: f64) -> f64 {
    if duration_secs.is_finite() && duration_secs > 0.0 {
        duration_secs
    } else {
        NOMINAL_DURATION_SECS
    }
}

/// Clip count and nominal clip length for an (effective) duration.
pub fn clip_policy(duration_secs: f64) -> (usize, f64) {
    if duration_secs <= SHORT_SOURCE_MAX_SECS {
        (1, duration_secs)
    } else if duration_secs <= MEDIUM_SOURCE_MAX_SECS {
        (3, 30.0)
    } else {
        (5, 60.0)
    }
}

/// Plan the clip ranges for a source of `duration_secs`.
///
/// Lengths are capped at the start spacing because for 60 < d < 90 three 30 s
/// clips at `i * d / 3` would otherwise overlap.
pub fn plan_segments(duration_secs: f64) -> Vec<SegmentRange> {
    let d = effective_duration(duration_secs);
    let (count, length) = clip_policy(d);
    let offset = |i: usize| i as f64 * d / count as f64;

    (0..count)
        .map(|index| {
            let start = offset(index);
            let end = (start + length).min(offset(index + 1)).min(d);
            SegmentRange { index, start, end }
        })
        .collect()
}

/// `clip_<job_id>_<n>.mp4` with a 1-based n.
pub fn clip_file_name(job_id: &JobId, index: usize) -> String {
    format!("clip_{}_{}.mp4", job_id, index + 1)
}

/// Stream-copy `[start, start + duration)` of `input` into `output`.
///
/// A zero exit that leaves no output file is a failure.
pub async fn trim_clip(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    start_secs: f64,
    duration_secs: f64,
    timeout_secs: u64,
) -> MediaResult<()> {
    let output = output.as_ref();
    let cmd = FfmpegCommand::new(input, output)
        .seek(start_secs)
        .duration(duration_secs)
        .codec_copy();

    FfmpegRunner::new().with_timeout(timeout_secs).run(&cmd).await?;

    if !output.exists() {
        return Err(MediaError::FileNotFound(output.to_path_buf()));
    }
    Ok(())
}

/// Cut every planned range of `media_path` into `clips_dir`.
///
/// Failed trims are logged and skipped; the returned clips are in plan order
/// and not yet persisted.
pub async fn generate_clips(
    tools: &dyn MediaTools,
    media_path: &Path,
    job_id: &JobId,
    duration_secs: f64,
    clips_dir: &Path,
) -> Vec<Clip> {
    let plan = plan_segments(duration_secs);
    debug!(job_id = %job_id, planned = plan.len(), "Planned clip ranges");

    if let Err(e) = tokio::fs::create_dir_all(clips_dir).await {
        warn!(job_id = %job_id, error = %e, "Failed to create clips directory");
    }

    let mut clips = Vec::with_capacity(plan.len());
    for range in plan {
        let output = clips_dir.join(clip_file_name(job_id, range.index));
        match tools.trim(media_path, &output, range.start, range.duration()).await {
            Ok(()) => {
                info!(
                    job_id = %job_id,
                    clip = range.index + 1,
                    start = range.start,
                    end = range.end,
                    "Clip created"
                );
                clips.push(Clip::new(
                    job_id.clone(),
                    range.index,
                    output.to_string_lossy(),
                    range.start,
                    range.end,
                ));
            }
            Err(e) => {
                warn!(job_id = %job_id, clip = range.index + 1, error = %e, "Clip trim failed");
            }
        }
    }
    clips
}
