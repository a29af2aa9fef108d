//! Scripted [`MediaTools`] for tests.
//!
//! Writes small placeholder files instead of invoking external tools.

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use sclip_models::SourceId;

use crate::error::{MediaError, MediaResult};
use crate::metadata::VideoMetadata;
use crate::tools::MediaTools;

/// Test double for [`MediaTools`].
#[derive(Debug, Default)]
pub struct FakeMediaTools {
    metadata: Option<VideoMetadata>,
    fail_acquire: bool,
    fail_trims: bool,
    fail_thumbnail: bool,
    acquire_started: Option<Arc<Notify>>,
    acquire_gate: Option<Arc<Notify>>,
    trims: Mutex<Vec<(f64, f64)>>,
}

impl FakeMediaTools {
    /// Tools reporting a source of `duration_secs` titled `title`.
    pub fn new(title: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            metadata: Some(VideoMetadata {
                title: title.into(),
                duration_secs,
                thumbnail_url: String::new(),
                success: true,
                error: None,
            }),
            ..Default::default()
        }
    }

    /// Tools whose metadata lookup degrades.
    pub fn degraded() -> Self {
        Self::default()
    }

    pub fn failing_acquire(mut self) -> Self {
        self.fail_acquire = true;
        self
    }

    pub fn failing_trims(mut self) -> Self {
        self.fail_trims = true;
        self
    }

    pub fn failing_thumbnail(mut self) -> Self {
        self.fail_thumbnail = true;
        self
    }

    /// Block acquisition until `gate` is notified; `started` is notified on entry.
    pub fn gated(mut self, started: Arc<Notify>, gate: Arc<Notify>) -> Self {
        self.acquire_started = Some(started);
        self.acquire_gate = Some(gate);
        self
    }

    /// `(start, duration)` of every trim requested so far.
    pub fn trim_calls(&self) -> Vec<(f64, f64)> {
        self.trims.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

async fn write_placeholder(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, b"fake media").await?;
    Ok(())
}

#[async_trait]
impl MediaTools for FakeMediaTools {
    async fn fetch_metadata(&self, source: &SourceId) -> VideoMetadata {
        self.metadata
            .clone()
            .unwrap_or_else(|| VideoMetadata::degraded(source, "scripted metadata failure"))
    }

    async fn acquire(&self, _source: &SourceId, dest: &Path) -> MediaResult<()> {
        if let Some(started) = &self.acquire_started {
            started.notify_one();
        }
        if let Some(gate) = &self.acquire_gate {
            gate.notified().await;
        }
        if self.fail_acquire {
            return Err(MediaError::download_failed("scripted download failure"));
        }
        write_placeholder(dest).await
    }

    async fn trim(&self, _input: &Path, output: &Path, start_secs: f64, duration_secs: f64) -> MediaResult<()> {
        if let Ok(mut trims) = self.trims.lock() {
            trims.push((start_secs, duration_secs));
        }
        if self.fail_trims {
            return Err(MediaError::ffmpeg_failed("scripted trim failure", None, Some(1)));
        }
        write_placeholder(output).await
    }

    async fn thumbnail(&self, _input: &Path, output: &Path) -> MediaResult<()> {
        if self.fail_thumbnail {
            return Err(MediaError::ffmpeg_failed("scripted thumbnail failure", None, Some(1)));
        }
        write_placeholder(output).await
    }
}
