//! Clip records produced by the segmenter.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::job::JobId;

/// Unique identifier for a clip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ClipId(pub String);

impl ClipId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClipId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A trimmed sub-clip of a job's source media. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Clip {
    pub id: ClipId,
    pub job_id: JobId,
    pub title: String,
    pub file_path: String,
    /// Shared by every clip of the job
    pub thumbnail_path: Option<String>,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub created_at: DateTime<Utc>,
}

impl Clip {
    /// Build the `index`-th (0-based) clip of a job covering `[start, end)`.
    pub fn new(job_id: JobId, index: usize, file_path: impl Into<String>, start: f64, end: f64) -> Self {
        let title = Self::display_title(index, &job_id);
        Self {
            id: ClipId::new(),
            job_id,
            title,
            file_path: file_path.into(),
            thumbnail_path: None,
            start_time: start,
            end_time: end,
            duration: end - start,
            created_at: Utc::now(),
        }
    }

    /// `"Clip {n} - {job_id}"` with a 1-based n.
    pub fn display_title(index: usize, job_id: &JobId) -> String {
        format!("Clip {} - {}", index + 1, job_id)
    }

    pub fn with_thumbnail(mut self, path: Option<String>) -> Self {
        self.thumbnail_path = path;
        self
    }
}
