//! The media tool seam used by the job pipeline.

use async_trait::async_trait;
use std::path::Path;

use sclip_models::SourceId;

use crate::command::{check_ffmpeg, check_ytdlp};
use crate::download::{download_video, DEFAULT_DOWNLOAD_TIMEOUT_SECS};
use crate::error::MediaResult;
use crate::metadata::{fetch_metadata, VideoMetadata, DEFAULT_METADATA_TIMEOUT_SECS};
use crate::segment::{trim_clip, DEFAULT_TRIM_TIMEOUT_SECS};
use crate::thumbnail::{generate_thumbnail, DEFAULT_THUMBNAIL_TIMEOUT_SECS};

/// External media operations a job needs.
#[async_trait]
pub trait MediaTools: Send + Sync {
    /// Look up metadata. Always returns; failures are reported as degraded.
    async fn fetch_metadata(&self, source: &SourceId) -> VideoMetadata;

    /// Download the source media to `dest`.
    async fn acquire(&self, source: &SourceId, dest: &Path) -> MediaResult<()>;

    /// Stream-copy a time range of `input` into `output`.
    async fn trim(&self, input: &Path, output: &Path, start_secs: f64, duration_secs: f64) -> MediaResult<()>;

    /// Capture a single still frame of `input`.
    async fn thumbnail(&self, input: &Path, output: &Path) -> MediaResult<()>;
}

/// Per-tool timeouts in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolTimeouts {
    pub metadata_secs: u64,
    pub download_secs: u64,
    pub trim_secs: u64,
    pub thumbnail_secs: u64,
}

impl Default for ToolTimeouts {
    fn default() -> Self {
        Self {
            metadata_secs: DEFAULT_METADATA_TIMEOUT_SECS,
            download_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            trim_secs: DEFAULT_TRIM_TIMEOUT_SECS,
            thumbnail_secs: DEFAULT_THUMBNAIL_TIMEOUT_SECS,
        }
    }
}

/// [`MediaTools`] backed by the `yt-dlp` and `ffmpeg` executables.
#[derive(Debug, Clone, Default)]
pub struct CliMediaTools {
    timeouts: ToolTimeouts,
}

impl CliMediaTools {
    pub fn new(timeouts: ToolTimeouts) -> Self {
        Self { timeouts }
    }

    pub fn timeouts(&self) -> ToolTimeouts {
        self.timeouts
    }

    /// Verify both executables are on `PATH`.
    pub fn check_available() -> MediaResult<()> {
        check_ytdlp()?;
        check_ffmpeg()?;
        Ok(())
    }
}

#[async_trait]
impl MediaTools for CliMediaTools {
    async fn fetch_metadata(&self, source: &SourceId) -> VideoMetadata {
        fetch_metadata(source, self.timeouts.metadata_secs).await
    }

    async fn acquire(&self, source: &SourceId, dest: &Path) -> MediaResult<()> {
        download_video(&source.watch_url(), dest, self.timeouts.download_secs).await
    }

    async fn trim(&self, input: &Path, output: &Path, start_secs: f64, duration_secs: f64) -> MediaResult<()> {
        trim_clip(input, output, start_secs, duration_secs, self.timeouts.trim_secs).await
    }

    async fn thumbnail(&self, input: &Path, output: &Path) -> MediaResult<()> {
        generate_thumbnail(input, output, self.timeouts.thumbnail_secs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let timeouts = CliMediaTools::default().timeouts();
        assert_eq!(timeouts.metadata_secs, 30);
        assert_eq!(timeouts.download_secs, 300);
        assert_eq!(timeouts.trim_secs, 60);
        assert_eq!(timeouts.thumbnail_secs, 30);
    }
}
