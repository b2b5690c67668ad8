use std::path::{Path, PathBuf};

use crate::{
    foundation::core::{Dimensions, Fps},
    foundation::error::{VidstyleError, VidstyleResult},
};

/// Stream properties of an input video as reported by `ffprobe`.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub path: PathBuf,
    pub dimensions: Dimensions,
    pub fps: Fps,
    /// Container-reported or duration-estimated count; the decoder may yield fewer.
    pub frame_count: u64,
    pub duration_sec: f64,
    pub has_audio: bool,
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    index: Option<u32>,
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    disposition: Option<ProbeDisposition>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
    tags: Option<ProbeTags>,
}

impl ProbeStream {
    fn is_cover_art(&self) -> bool {
        self.disposition
            .as_ref()
            .and_then(|d| d.attached_pic)
            .is_some_and(|v| v != 0)
    }

    /// Display rotation in degrees, normalized into `0..360`.
    fn rotation(&self) -> i64 {
        let degrees = self
            .side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|t| t.rotate.as_deref())
                    .and_then(|r| r.trim().parse::<f64>().ok())
            })
            .unwrap_or(0.0);
        (degrees.round() as i64).rem_euclid(360)
    }
}

#[derive(serde::Deserialize)]
struct ProbeDisposition {
    attached_pic: Option<u8>,
}

#[derive(serde::Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(serde::Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

pub fn probe_video(path: &Path) -> VidstyleResult<SourceInfo> {
    Ok(probe_video_stream(path)?.0)
}

/// Probes `path` and also returns the absolute index of the chosen video stream.
pub(crate) fn probe_video_stream(path: &Path) -> VidstyleResult<(SourceInfo, u32)> {
    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| VidstyleError::source_unreadable(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(VidstyleError::source_unreadable(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    parse_probe_json(path, &out.stdout)
}

/// Picks the first video stream that is not cover art. Dimensions are the displayed size,
/// i.e. swapped for quarter-turn rotations, matching what `ffmpeg` decodes by default.
pub(crate) fn parse_probe_json(path: &Path, json: &[u8]) -> VidstyleResult<(SourceInfo, u32)> {
    let parsed: ProbeOut = serde_json::from_slice(json).map_err(|e| {
        VidstyleError::source_unreadable(format!("ffprobe json parse failed: {e}"))
    })?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video") && !s.is_cover_art())
        .ok_or_else(|| {
            VidstyleError::source_unreadable(format!(
                "no video stream found in '{}'",
                path.display()
            ))
        })?;
    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(VidstyleError::source_unreadable(
                "missing video dimensions from ffprobe",
            ));
        }
    };
    let rotation = video.rotation();
    let (width, height) = if rotation == 90 || rotation == 270 {
        tracing::debug!(rotation, "video is rotated a quarter turn, swapping dimensions");
        (height, width)
    } else {
        (width, height)
    };

    let fps = [video.r_frame_rate.as_deref(), video.avg_frame_rate.as_deref()]
        .into_iter()
        .flatten()
        .find_map(parse_ff_ratio)
        .ok_or_else(|| VidstyleError::source_unreadable("invalid video frame rate"))?;

    let duration_sec = video
        .duration
        .as_deref()
        .or(parsed.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    let frame_count = video
        .nb_frames
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|&n| n > 0)
        .unwrap_or_else(|| (duration_sec * fps.as_f64()).round().max(0.0) as u64);

    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let info = SourceInfo {
        path: path.to_path_buf(),
        dimensions: Dimensions { width, height },
        fps,
        frame_count,
        duration_sec,
        has_audio,
    };
    Ok((info, video.index.unwrap_or(0)))
}

fn parse_ff_ratio(s: &str) -> Option<Fps> {
    let mut parts = s.split('/');
    let a = parts.next()?.trim().parse::<u32>().ok()?;
    let b = match parts.next() {
        Some(b) => b.trim().parse::<u32>().ok()?,
        None => 1,
    };
    Fps::new(a, b).ok()
}
