//! Video download using yt-dlp.

use std::path::Path;
use tracing::{debug, info};

use crate::command::{check_ytdlp, last_line, run_process};
use crate::error::{MediaError, MediaResult};

/// Default timeout for a full download.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Format selector: best single file no taller than 720p.
pub const DOWNLOAD_FORMAT: &str = "best[height<=720]";

/// Arguments for downloading `url` into `output_path`.
pub fn download_args(url: &str, output_path: &Path) -> Vec<String> {
    vec![
        "-f".to_string(),
        DOWNLOAD_FORMAT.to_string(),
        "-o".to_string(),
        output_path.to_string_lossy().to_string(),
        url.to_string(),
    ]
}

/// Download a video from URL using yt-dlp.
///
/// Succeeds only when yt-dlp exits zero and the output file exists.
pub async fn download_video(
    url: &str,
    output_path: impl AsRef<Path>,
    timeout_secs: u64,
) -> MediaResult<()> {
    let output_path = output_path.as_ref();

    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    check_ytdlp()?;

    info!("Downloading video from {} to {}", url, output_path.display());

    let output = match run_process("yt-dlp", &download_args(url, output_path), timeout_secs).await {
        Ok(output) => output,
        Err(MediaError::Timeout(secs)) => {
            return Err(MediaError::download_failed(format!(
                "yt-dlp timed out after {} seconds",
                secs
            )))
        }
        Err(e) => return Err(e),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("yt-dlp stderr: {}", stderr);
        return Err(MediaError::download_failed(format!(
            "yt-dlp failed: {}",
            last_line(&stderr)
        )));
    }

    if !output_path.exists() {
        return Err(MediaError::download_failed("Output file not created"));
    }

    let file_size = output_path.metadata()?.len();
    info!(
        output = %output_path.display(),
        size_mb = file_size as f64 / (1024.0 * 1024.0),
        "Downloaded video successfully"
    );

    Ok(())
}
