use std::{
    path::Path,
    process::{Command, Stdio},
};

/// Copies the first audio stream of `source` into `audio_out` without re-encoding.
///
/// Returns `false` when the source has no audio track or ffmpeg reports failure.
pub fn extract_audio(source: &Path, audio_out: &Path) -> bool {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-y", "-v", "error", "-nostdin", "-i"])
        .arg(source)
        .args(["-vn", "-acodec", "copy"])
        .arg(audio_out);
    run_quiet(cmd, "extract audio")
}

/// Muxes `silent_video` with `audio` into `final_path`, copying video and encoding AAC audio.
pub fn remux(silent_video: &Path, audio: &Path, final_path: &Path) -> bool {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-y", "-v", "error", "-nostdin", "-i"])
        .arg(silent_video)
        .arg("-i")
        .arg(audio)
        .args([
            "-map",
            "0:v:0",
            "-map",
            "1:a:0",
            "-c:v",
            "copy",
            "-c:a",
            "aac",
            "-strict",
            "experimental",
        ])
        .arg(final_path);
    run_quiet(cmd, "remux")
}

fn run_quiet(mut cmd: Command, what: &str) -> bool {
    let out = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output();
    match out {
        Ok(out) if out.status.success() => true,
        Ok(out) => {
            tracing::debug!(
                status = %out.status,
                "ffmpeg {what} failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            );
            false
        }
        Err(e) => {
            tracing::debug!("failed to spawn ffmpeg for {what}: {e}");
            false
        }
    }
}
