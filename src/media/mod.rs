//! Everything that touches the system `ffmpeg`/`ffprobe` binaries.
//!
//! The pipeline only sees the [`MediaIo`] trait.

use std::path::Path;

use crate::foundation::error::VidstyleResult;

pub mod audio;
pub mod probe;
pub mod sink;
pub mod source;

use sink::{FfmpegSink, FrameSink, SinkConfig};
use source::{FfmpegSource, FrameSource};

/// Media collaborators of one run: decoder, encoder and the two audio steps.
pub trait MediaIo: Send + Sync {
    fn open_source(&self, path: &Path) -> VidstyleResult<Box<dyn FrameSource>>;

    fn open_sink(&self, cfg: SinkConfig) -> VidstyleResult<Box<dyn FrameSink>>;

    /// `false` (not an error) when there is no audio track or extraction failed.
    fn extract_audio(&self, source: &Path, audio_out: &Path) -> bool;

    fn remux(&self, silent_video: &Path, audio: &Path, final_path: &Path) -> bool;
}

/// Production [`MediaIo`] backed by `ffmpeg`/`ffprobe` on `PATH`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegMedia;

impl MediaIo for FfmpegMedia {
    fn open_source(&self, path: &Path) -> VidstyleResult<Box<dyn FrameSource>> {
        Ok(Box::new(FfmpegSource::open(path)?))
    }

    fn open_sink(&self, cfg: SinkConfig) -> VidstyleResult<Box<dyn FrameSink>> {
        Ok(Box::new(FfmpegSink::open(cfg)?))
    }

    fn extract_audio(&self, source: &Path, audio_out: &Path) -> bool {
        match probe::probe_video(source) {
            Ok(info) if !info.has_audio => {
                tracing::debug!("'{}' has no audio stream", source.display());
                false
            }
            _ => audio::extract_audio(source, audio_out),
        }
    }

    fn remux(&self, silent_video: &Path, audio: &Path, final_path: &Path) -> bool {
        audio::remux(silent_video, audio, final_path)
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    tool_on_path("ffmpeg")
}

pub fn is_ffprobe_on_path() -> bool {
    tool_on_path("ffprobe")
}

fn tool_on_path(tool: &str) -> bool {
    std::process::Command::new(tool)
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}
