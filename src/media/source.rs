use std::{
    io::{BufReader, Read},
    path::Path,
    process::{Child, ChildStdout, Command, Stdio},
};

use crate::{
    foundation::core::Frame,
    foundation::error::{VidstyleError, VidstyleResult},
    media::probe::{SourceInfo, probe_video_stream},
};

/// Sequential, non-restartable frame decoder.
///
/// `next_frame` returns `None` once the stream is exhausted or can no longer be decoded.
pub trait FrameSource: Send {
    fn info(&self) -> &SourceInfo;

    fn frame_count(&self) -> u64 {
        self.info().frame_count
    }

    fn next_frame(&mut self) -> Option<Frame>;
}

/// Decodes RGB24 frames from the system `ffmpeg` binary over a pipe.
pub struct FfmpegSource {
    info: SourceInfo,
    child: Child,
    stdout: BufReader<ChildStdout>,
    pending: Option<Frame>,
    frames_read: u64,
    exhausted: bool,
}

impl FfmpegSource {
    /// Probes and starts decoding `path`. The first frame is read eagerly; if it cannot be
    /// read the source is unreadable.
    pub fn open(path: &Path) -> VidstyleResult<Self> {
        let (info, stream_index) = probe_video_stream(path)?;
        let size = format!("{}x{}", info.dimensions.width, info.dimensions.height);

        // Output geometry is pinned to the probed size so every read is exactly one frame.
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-map", &format!("0:{stream_index}"), "-s", &size])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                VidstyleError::source_unreadable(format!(
                    "failed to spawn ffmpeg decoder (is it installed and on PATH?): {e}"
                ))
            })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            VidstyleError::source_unreadable("failed to open ffmpeg stdout (unexpected)")
        })?;

        let mut source = Self {
            info,
            child,
            stdout: BufReader::new(stdout),
            pending: None,
            frames_read: 0,
            exhausted: false,
        };

        match source.read_frame() {
            Ok(Some(first)) => source.pending = Some(first),
            Ok(None) => {
                return Err(VidstyleError::source_unreadable(format!(
                    "no decodable frames in '{}'",
                    path.display()
                )));
            }
            Err(e) => {
                return Err(VidstyleError::source_unreadable(format!(
                    "first frame of '{}' could not be read: {e}",
                    path.display()
                )));
            }
        }
        Ok(source)
    }

    fn read_frame(&mut self) -> std::io::Result<Option<Frame>> {
        let dims = self.info.dimensions;
        let mut buf = vec![0u8; dims.pixel_count() * Frame::CHANNELS];
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled < buf.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("truncated frame: {filled} of {} bytes", buf.len()),
            ));
        }
        self.frames_read += 1;
        Ok(Some(Frame {
            width: dims.width,
            height: dims.height,
            data: buf,
        }))
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if let Some(frame) = self.pending.take() {
            return Some(frame);
        }
        if self.exhausted {
            return None;
        }
        match self.read_frame() {
            Ok(Some(frame)) => Some(frame),
            Ok(None) => {
                self.exhausted = true;
                tracing::debug!(frames = self.frames_read, "decoder reached end of stream");
                None
            }
            Err(e) => {
                self.exhausted = true;
                tracing::warn!(
                    frames = self.frames_read,
                    "decoder stopped early on '{}': {e}",
                    self.info.path.display()
                );
                None
            }
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A source over frames already in memory, mostly useful for tests and previews.
pub struct MemorySource {
    info: SourceInfo,
    frames: std::vec::IntoIter<Frame>,
}

impl MemorySource {
    pub fn new(info: SourceInfo, frames: Vec<Frame>) -> Self {
        Self {
            info,
            frames: frames.into_iter(),
        }
    }
}

impl FrameSource for MemorySource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Option<Frame> {
        self.frames.next()
    }
}
