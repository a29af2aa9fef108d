//! Per-job file layout under the work directory.
//!
//! ```text
//! <work_dir>/videos/video_<job_id>.mp4
//! <work_dir>/clips/<job_id>/clip_<job_id>_<n>.mp4
//! <work_dir>/thumbnails/thumb_<job_id>.jpg
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use sclip_media::thumbnail_file_name;
use sclip_models::{Clip, JobId};

/// Paths owned by one job. Derived from the job id only, so jobs never share files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    pub video: PathBuf,
    pub clips_dir: PathBuf,
    pub thumbnail: PathBuf,
}

impl JobPaths {
    pub fn new(work_dir: &Path, job_id: &JobId) -> Self {
        Self {
            video: work_dir.join("videos").join(format!("video_{}.mp4", job_id)),
            clips_dir: work_dir.join("clips").join(job_id.as_str()),
            thumbnail: work_dir.join("thumbnails").join(thumbnail_file_name(job_id)),
        }
    }

    /// Best-effort removal of `clips` and the job's whole namespace.
    /// Returns how many removals failed; missing files do not count.
    pub async fn remove_all(&self, clips: &[Clip]) -> usize {
        let mut failures = 0;
        for clip in clips {
            failures += remove_file(Path::new(&clip.file_path)).await as usize;
        }
        failures += remove_file(&self.thumbnail).await as usize;
        failures += remove_file(&self.video).await as usize;

        match tokio::fs::remove_dir_all(&self.clips_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.clips_dir.display(), error = %e, "Failed to remove clips directory");
                failures += 1;
            }
        }
        failures
    }
}

/// Remove one file, returning `true` on a real failure.
pub async fn remove_file(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Removed file");
            false
        }
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove file");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = JobPaths::new(Path::new("/work"), &JobId::from_string("j1"));
        assert_eq!(paths.video, PathBuf::from("/work/videos/video_j1.mp4"));
        assert_eq!(paths.clips_dir, PathBuf::from("/work/clips/j1"));
        assert_eq!(paths.thumbnail, PathBuf::from("/work/thumbnails/thumb_j1.jpg"));
    }

    #[tokio::test]
    async fn test_remove_all_is_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        let job_id = JobId::from_string("j1");
        let paths = JobPaths::new(dir.path(), &job_id);

        tokio::fs::create_dir_all(&paths.clips_dir).await.unwrap();
        tokio::fs::create_dir_all(paths.video.parent().unwrap()).await.unwrap();
        tokio::fs::write(&paths.video, b"v").await.unwrap();
        let clip_path = paths.clips_dir.join("clip_j1_1.mp4");
        tokio::fs::write(&clip_path, b"c").await.unwrap();

        let clip = Clip::new(job_id, 0, clip_path.to_string_lossy(), 0.0, 30.0);
        // Thumbnail never existed; that is not a failure.
        assert_eq!(paths.remove_all(&[clip]).await, 0);
        assert!(!paths.video.exists());
        assert!(!paths.clips_dir.exists());

        // Second pass over an empty namespace is a no-op.
        assert_eq!(paths.remove_all(&[]).await, 0);
    }
}
