//! Video metadata lookup via `yt-dlp --dump-json`.
//!
//! Lookup never fails: any tool error yields a degraded result with a
//! placeholder title and zero duration, so the pipeline can keep going.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use sclip_models::SourceId;

use crate::command::{check_ytdlp, last_line, run_process};
use crate::error::{MediaError, MediaResult};

/// Default timeout for a metadata lookup.
pub const DEFAULT_METADATA_TIMEOUT_SECS: u64 = 30;

/// Title, duration and thumbnail reference of a source video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    /// Seconds; 0 when unknown
    pub duration_secs: f64,
    pub thumbnail_url: String,
    /// False when the values are placeholders
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VideoMetadata {
    /// Placeholder metadata used when the lookup fails.
    pub fn degraded(source: &SourceId, error: impl Into<String>) -> Self {
        Self {
            title: placeholder_title(source),
            duration_secs: 0.0,
            thumbnail_url: String::new(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Title used when the real one is unknown.
pub fn placeholder_title(source: &SourceId) -> String {
    format!("Video {}", source)
}

#[derive(Debug, Deserialize)]
struct DumpJson {
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
}

/// Parse `yt-dlp --dump-json` output. Missing fields get defaults.
pub fn parse_dump_json(source: &SourceId, json: &str) -> MediaResult<VideoMetadata> {
    let dump: DumpJson = serde_json::from_str(json)?;
    Ok(VideoMetadata {
        title: dump.title.unwrap_or_else(|| placeholder_title(source)),
        duration_secs: dump.duration.filter(|d| d.is_finite() && *d > 0.0).unwrap_or(0.0),
        thumbnail_url: dump.thumbnail.unwrap_or_default(),
        success: true,
        error: None,
    })
}

async fn lookup(source: &SourceId, timeout_secs: u64) -> MediaResult<VideoMetadata> {
    check_ytdlp()?;

    let args = vec!["--dump-json".to_string(), source.watch_url()];
    let output = run_process("yt-dlp", &args, timeout_secs).await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("yt-dlp stderr: {}", stderr);
        return Err(MediaError::metadata_failed(last_line(&stderr).to_string()));
    }

    parse_dump_json(source, &String::from_utf8_lossy(&output.stdout))
}

/// Fetch metadata for `source`, degrading instead of failing.
pub async fn fetch_metadata(source: &SourceId, timeout_secs: u64) -> VideoMetadata {
    match lookup(source, timeout_secs).await {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(source_id = %source, error = %e, "Metadata lookup degraded");
            VideoMetadata::degraded(source, e.to_string())
        }
    }
}
