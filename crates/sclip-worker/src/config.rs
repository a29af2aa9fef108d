//! Worker configuration.

use std::path::PathBuf;

use sclip_media::ToolTimeouts;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root of the per-job file namespace (`videos/`, `clips/`, `thumbnails/`)
    pub work_dir: PathBuf,
    /// Timeouts for the external tools
    pub timeouts: ToolTimeouts,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("uploads"),
            timeouts: ToolTimeouts::default(),
        }
    }
}

fn env_secs(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = ToolTimeouts::default();
        Self {
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
            timeouts: ToolTimeouts {
                metadata_secs: env_secs("WORKER_METADATA_TIMEOUT", defaults.metadata_secs),
                download_secs: env_secs("WORKER_DOWNLOAD_TIMEOUT", defaults.download_secs),
                trim_secs: env_secs("WORKER_TRIM_TIMEOUT", defaults.trim_secs),
                thumbnail_secs: env_secs("WORKER_THUMBNAIL_TIMEOUT", defaults.thumbnail_secs),
            },
        }
    }

    /// Same defaults, rooted at `work_dir`.
    pub fn with_work_dir(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..Default::default()
        }
    }
}
