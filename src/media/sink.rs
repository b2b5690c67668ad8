use std::{
    io::Write as _,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use crate::{
    foundation::core::{Dimensions, Fps, Frame},
    foundation::error::{VidstyleError, VidstyleResult},
    media::{ensure_parent_dir, is_ffmpeg_on_path},
};

#[derive(Clone, Debug, PartialEq)]
pub struct SinkConfig {
    pub dimensions: Dimensions,
    pub fps: Fps,
    pub out_path: PathBuf,
}

impl SinkConfig {
    pub fn new(out_path: impl Into<PathBuf>, dimensions: Dimensions, fps: Fps) -> Self {
        Self {
            dimensions,
            fps,
            out_path: out_path.into(),
        }
    }

    pub fn validate(&self) -> VidstyleResult<()> {
        if self.dimensions.width == 0 || self.dimensions.height == 0 {
            return Err(VidstyleError::encode("sink width/height must be non-zero"));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(VidstyleError::encode("sink fps must be non-zero"));
        }
        Ok(())
    }

    /// Size of the encoded stream. `yuv420p` needs even sizes, so odd frame sizes are padded
    /// by one pixel on the right or bottom.
    pub fn encoded_dimensions(&self) -> Dimensions {
        let even = |v: u32| v + v % 2;
        Dimensions {
            width: even(self.dimensions.width),
            height: even(self.dimensions.height),
        }
    }

    /// `ffmpeg` video filter that pads frames to [`SinkConfig::encoded_dimensions`], if needed.
    pub fn pad_filter(&self) -> Option<String> {
        let encoded = self.encoded_dimensions();
        (encoded != self.dimensions)
            .then(|| format!("pad={}:{}:0:0", encoded.width, encoded.height))
    }

    pub fn check_frame(&self, frame: &Frame) -> VidstyleResult<()> {
        if frame.dimensions() != self.dimensions {
            return Err(VidstyleError::encode(format!(
                "frame size mismatch: got {}, expected {}",
                frame.dimensions(),
                self.dimensions
            )));
        }
        if frame.data.len() != self.dimensions.pixel_count() * Frame::CHANNELS {
            return Err(VidstyleError::encode(
                "frame.data size mismatch with width*height*3",
            ));
        }
        Ok(())
    }
}

/// Sequential writer of equally sized frames into one video artifact.
pub trait FrameSink: Send {
    fn config(&self) -> &SinkConfig;

    fn write_frame(&mut self, frame: &Frame) -> VidstyleResult<()>;

    /// Flushes and closes the artifact. Must be called for the output to be valid.
    fn finish(self: Box<Self>) -> VidstyleResult<()>;
}

/// Streams raw RGB24 frames into the system `ffmpeg` binary, producing a silent H.264 MP4.
pub struct FfmpegSink {
    cfg: SinkConfig,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    frames_written: u64,
}

impl FfmpegSink {
    pub fn open(cfg: SinkConfig) -> VidstyleResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path).map_err(|e| VidstyleError::encode(e.to_string()))?;

        if !is_ffmpeg_on_path() {
            return Err(VidstyleError::encode(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let pad = cfg.pad_filter();
        if pad.is_some() {
            tracing::info!(
                frames = %cfg.dimensions,
                encoded = %cfg.encoded_dimensions(),
                "odd frame size, padding the encoded stream to even dimensions"
            );
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
            &cfg.dimensions.to_string(),
            "-r",
            &cfg.fps.to_ffmpeg_arg(),
            "-i",
            "pipe:0",
            "-an",
        ]);
        if let Some(pad) = &pad {
            cmd.arg("-vf").arg(pad);
        }
        cmd.args([
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(&cfg.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            VidstyleError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| VidstyleError::encode("failed to open ffmpeg stdin (unexpected)"))?;

        Ok(Self {
            cfg,
            child: Some(child),
            stdin: Some(stdin),
            frames_written: 0,
        })
    }

    pub fn out_path(&self) -> &Path {
        &self.cfg.out_path
    }
}

impl FrameSink for FfmpegSink {
    fn config(&self) -> &SinkConfig {
        &self.cfg
    }

    fn write_frame(&mut self, frame: &Frame) -> VidstyleResult<()> {
        self.cfg.check_frame(frame)?;
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(VidstyleError::encode("ffmpeg encoder is already finalized"));
        };
        stdin.write_all(&frame.data).map_err(|e| {
            VidstyleError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> VidstyleResult<()> {
        drop(self.stdin.take());

        let child = self
            .child
            .take()
            .ok_or_else(|| VidstyleError::encode("ffmpeg encoder is already finalized"))?;
        let output = child.wait_with_output().map_err(|e| {
            VidstyleError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VidstyleError::encode(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        tracing::debug!(
            frames = self.frames_written,
            path = %self.cfg.out_path.display(),
            "encoder finished"
        );
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        // Only reached with a live child when the run aborted before `finish`.
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(width: u32, height: u32) -> SinkConfig {
        SinkConfig::new(
            "out.mp4",
            Dimensions::new(width, height).unwrap(),
            Fps::new(25, 1).unwrap(),
        )
    }

    #[test]
    fn even_sizes_are_encoded_as_is() {
        let c = cfg(64, 48);
        assert_eq!(c.encoded_dimensions(), c.dimensions);
        assert_eq!(c.pad_filter(), None);
    }

    #[test]
    fn odd_sizes_are_padded_to_even() {
        let c = cfg(45, 33);
        assert_eq!(c.encoded_dimensions(), Dimensions::new(46, 34).unwrap());
        assert_eq!(c.pad_filter().as_deref(), Some("pad=46:34:0:0"));
        assert_eq!(
            cfg(1, 2).encoded_dimensions(),
            Dimensions::new(2, 2).unwrap()
        );
    }

    #[test]
    fn mismatched_frames_are_rejected() {
        let c = cfg(4, 2);
        assert!(c.check_frame(&Frame::filled(4, 2, [0, 0, 0])).is_ok());
        let err = c.check_frame(&Frame::filled(2, 4, [0, 0, 0])).unwrap_err();
        assert!(matches!(err, VidstyleError::EncodeFailure(_)));
    }
}
