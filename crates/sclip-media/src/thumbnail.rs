//! Thumbnail generation.

use std::path::Path;

use sclip_models::JobId;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Offset of the captured frame.
pub const THUMBNAIL_TIMESTAMP: &str = "00:00:05";

/// Default timeout for thumbnail extraction.
pub const DEFAULT_THUMBNAIL_TIMEOUT_SECS: u64 = 30;

/// `thumb_<job_id>.jpg`
pub fn thumbnail_file_name(job_id: &JobId) -> String {
    format!("thumb_{}.jpg", job_id)
}

/// Generate a thumbnail from a video file.
pub async fn generate_thumbnail(
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    timeout_secs: u64,
) -> MediaResult<()> {
    let video_path = video_path.as_ref();
    let output_path = output_path.as_ref();

    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let cmd = FfmpegCommand::new(video_path, output_path)
        .seek_timestamp(THUMBNAIL_TIMESTAMP)
        .single_frame()
        .log_level("error");

    FfmpegRunner::new().with_timeout(timeout_secs).run(&cmd).await?;

    // Seeking past the end exits zero without writing a frame.
    if !output_path.exists() {
        return Err(MediaError::FileNotFound(output_path.to_path_buf()));
    }
    Ok(())
}
