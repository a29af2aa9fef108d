//! yt-dlp and FFmpeg CLI wrappers for clip generation.
//!
//! This crate provides:
//! - Metadata lookup and source download through `yt-dlp`
//! - Type-safe FFmpeg command building with bounded execution
//! - The duration-tiered segmentation policy and stream-copy trimming
//! - Thumbnail extraction
//! - The [`MediaTools`] seam the job pipeline depends on

pub mod command;
pub mod download;
pub mod error;
pub mod metadata;
pub mod segment;
pub mod thumbnail;
pub mod tools;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use command::{check_ffmpeg, check_ytdlp, FfmpegCommand, FfmpegRunner};
pub use download::download_video;
pub use error::{MediaError, MediaResult};
pub use metadata::{fetch_metadata, VideoMetadata};
pub use segment::{
    clip_file_name, generate_clips, plan_segments, SegmentRange, NOMINAL_DURATION_SECS,
};
pub use thumbnail::{generate_thumbnail, thumbnail_file_name};
pub use tools::{CliMediaTools, MediaTools, ToolTimeouts};
