use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use crate::foundation::error::VidstyleError;

static RUN_SEQ: AtomicU64 = AtomicU64::new(0);

/// Per-run intermediate files: the silent encoded video and the extracted audio.
///
/// Names are unique per run (pid, clock and a process-wide counter), so concurrent runs never
/// share files. Both paths are removed on drop if still present.
#[derive(Debug)]
pub struct TemporaryArtifacts {
    pub silent_video_path: PathBuf,
    pub audio_path: PathBuf,
    cleaned: bool,
}

impl TemporaryArtifacts {
    pub fn new(dir: &Path) -> Self {
        let stem = format!(
            "vidstyle_{}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0),
            RUN_SEQ.fetch_add(1, Ordering::Relaxed)
        );
        Self {
            silent_video_path: dir.join(format!("{stem}_video.mp4")),
            audio_path: dir.join(format!("{stem}_audio.mka")),
            cleaned: false,
        }
    }

    pub fn paths(&self) -> [&Path; 2] {
        [&self.silent_video_path, &self.audio_path]
    }

    /// Removes whichever artifacts exist. Failures are logged, never returned.
    pub fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        for path in [&self.silent_video_path, &self.audio_path] {
            if let Err(e) = remove_if_exists(path) {
                tracing::warn!("{e}");
            }
        }
    }
}

impl Drop for TemporaryArtifacts {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Deletes `path` when present; a missing file is not an error.
pub fn remove_if_exists(path: &Path) -> Result<(), VidstyleError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(VidstyleError::cleanup(format!(
            "failed to remove '{}': {e}",
            path.display()
        ))),
    }
}
