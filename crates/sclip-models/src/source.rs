//! Source locator resolution.
//!
//! Accepts the three supported YouTube URL shapes (prefix match, scheme and
//! `www.` optional) and extracts the canonical video id.

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// Locator rejected by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("Video URL is required")]
    Empty,

    #[error("Invalid YouTube URL: {0}")]
    Unsupported(String),
}

/// Canonical source identifier (the YouTube video id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    /// Wrap an id that was already resolved (e.g. read back from storage).
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical locator handed to external tools.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static SOURCE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^(?:https?://)?(?:www\.)?youtube\.com/watch\?v=([A-Za-z0-9_-]+)").unwrap(),
        Regex::new(r"^(?:https?://)?(?:www\.)?youtu\.be/([A-Za-z0-9_-]+)").unwrap(),
        Regex::new(r"^(?:https?://)?(?:www\.)?youtube\.com/embed/([A-Za-z0-9_-]+)").unwrap(),
    ]
});

/// Resolve a raw locator into a [`SourceId`]. Side-effect free.
pub fn resolve_source(locator: &str) -> Result<SourceId, SourceError> {
    let locator = locator.trim();
    if locator.is_empty() {
        return Err(SourceError::Empty);
    }

    SOURCE_PATTERNS
        .iter()
        .find_map(|re| re.captures(locator))
        .and_then(|caps| caps.get(1))
        .map(|m| SourceId(m.as_str().to_string()))
        .ok_or_else(|| SourceError::Unsupported(locator.to_string()))
}
