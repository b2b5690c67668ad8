use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, OnceLock},
};

use vidstyle::{
    AudioOutcome, BackendKind, CancelToken, Coordinator, Dimensions, FilterBackend, Fps, Frame,
    FrameSink, FrameSource, GrayPlane, MediaIo, MemorySource, ParameterSet, Phase,
    PipelineConfig, ProgressEvent, ProgressReporter, RunOutcome, RunRequest, SinkConfig,
    SourceInfo, StyleSelector, VidstyleError, VidstyleResult, progress_channel, run_with_events,
};

#[derive(Default)]
struct Shared {
    written: Mutex<Vec<Frame>>,
    cancel_at: OnceLock<(u64, CancelToken)>,
    cancel_on_audio: OnceLock<CancelToken>,
}

#[derive(Clone)]
struct FakeMedia {
    frames: u8,
    width: u32,
    height: u32,
    has_audio: bool,
    remux_ok: bool,
    fail_write_at: Option<u64>,
    shared: Arc<Shared>,
}

impl FakeMedia {
    fn new(frames: u8) -> Self {
        Self {
            frames,
            width: 8,
            height: 6,
            has_audio: false,
            remux_ok: true,
            fail_write_at: None,
            shared: Arc::new(Shared::default()),
        }
    }

    fn written_firsts(&self) -> Vec<u8> {
        self.shared
            .written
            .lock()
            .unwrap()
            .iter()
            .map(|f| f.data[0])
            .collect()
    }
}

struct FakeSink {
    cfg: SinkConfig,
    written: u64,
    fail_write_at: Option<u64>,
    shared: Arc<Shared>,
}

impl FrameSink for FakeSink {
    fn config(&self) -> &SinkConfig {
        &self.cfg
    }

    fn write_frame(&mut self, frame: &Frame) -> VidstyleResult<()> {
        self.cfg.check_frame(frame)?;
        if self.fail_write_at == Some(self.written) {
            return Err(VidstyleError::encode("disk full"));
        }
        self.shared.written.lock().unwrap().push(frame.clone());
        self.written += 1;
        if let Some((n, token)) = self.shared.cancel_at.get()
            && self.written == *n
        {
            token.cancel();
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> VidstyleResult<()> {
        Ok(())
    }
}

impl MediaIo for FakeMedia {
    fn open_source(&self, path: &Path) -> VidstyleResult<Box<dyn FrameSource>> {
        let info = SourceInfo {
            path: path.to_path_buf(),
            dimensions: Dimensions::new(self.width, self.height)?,
            fps: Fps::new(25, 1)?,
            frame_count: u64::from(self.frames),
            duration_sec: f64::from(self.frames) / 25.0,
            has_audio: self.has_audio,
        };
        let frames = (0..self.frames)
            .map(|i| Frame::filled(self.width, self.height, [i, i, i]))
            .collect();
        Ok(Box::new(MemorySource::new(info, frames)))
    }

    fn open_sink(&self, cfg: SinkConfig) -> VidstyleResult<Box<dyn FrameSink>> {
        std::fs::write(&cfg.out_path, b"silent video")
            .map_err(|e| VidstyleError::encode(e.to_string()))?;
        Ok(Box::new(FakeSink {
            cfg,
            written: 0,
            fail_write_at: self.fail_write_at,
            shared: Arc::clone(&self.shared),
        }))
    }

    fn extract_audio(&self, _source: &Path, audio_out: &Path) -> bool {
        if let Some(token) = self.shared.cancel_on_audio.get() {
            token.cancel();
        }
        self.has_audio && std::fs::write(audio_out, b"audio").is_ok()
    }

    fn remux(&self, silent_video: &Path, _audio: &Path, final_path: &Path) -> bool {
        self.remux_ok && std::fs::copy(silent_video, final_path).is_ok()
    }
}

/// Blurs like the CPU backend, except for the inverted plane of one chosen gray level.
struct BrokenBlur {
    poisoned_gray: u8,
}

impl FilterBackend for BrokenBlur {
    fn kind(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn gaussian_blur(&self, plane: &GrayPlane, ksize: u32) -> VidstyleResult<GrayPlane> {
        if plane.data[0] == 255 - self.poisoned_gray {
            return Err(VidstyleError::validation("kernel exploded"));
        }
        vidstyle::filters::blur::gaussian_blur_gray(plane, ksize)
    }
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "vidstyle_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(dir.join("tmp")).unwrap();
    dir
}

fn config_in(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        batch_size: 10,
        workers: Some(3),
        backend: vidstyle::BackendPreference::Cpu,
        temp_dir: Some(dir.join("tmp")),
        ..PipelineConfig::default()
    }
}

fn temp_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir.join("tmp")).unwrap().next().is_none()
}

fn identity_request(dir: &Path) -> RunRequest {
    RunRequest::new(
        dir.join("in.mp4"),
        dir.join("out").join("out.mp4"),
        StyleSelector::VintageFilter,
        ParameterSet::default(),
    )
}

#[test]
fn frames_are_written_in_source_order() {
    let dir = scratch_dir("order");
    let media = FakeMedia::new(25);
    let outcome = Coordinator::new(
        identity_request(&dir),
        config_in(&dir),
        media.clone(),
        ProgressReporter::silent(),
    )
    .unwrap()
    .run()
    .unwrap();

    let RunOutcome::Done(report) = outcome else {
        panic!("expected a finished run");
    };
    assert_eq!(report.frames_written, 25);
    assert_eq!(report.backend, BackendKind::Cpu);
    assert_eq!(report.audio, AudioOutcome::NoAudio);
    assert_eq!(media.written_firsts(), (0..25).collect::<Vec<u8>>());
    assert!(report.output.exists());
    assert!(temp_is_empty(&dir));
}

#[test]
fn progress_is_monotonic_and_completes_once() {
    let dir = scratch_dir("progress");
    let mut events = Vec::new();
    let outcome = run_with_events(
        identity_request(&dir),
        config_in(&dir),
        FakeMedia::new(25),
        |e| events.push(e),
    )
    .unwrap();
    assert!(matches!(outcome, RunOutcome::Done(_)));

    let percents: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    assert_eq!(percents.iter().filter(|&&p| p == 100).count(), 1);
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.contains(&90));

    let phases: Vec<Phase> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Phase(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            Phase::Decoding,
            Phase::Transforming,
            Phase::Encoding,
            Phase::ExtractingAudio,
            Phase::Copying,
            Phase::Done,
        ]
    );
    assert!(
        events
            .iter()
            .any(|e| matches!(e, ProgressEvent::Preview { frame_index: 24, .. }))
    );
    assert!(matches!(events.last(), Some(ProgressEvent::Completed(_))));
}

#[test]
fn audio_is_remuxed_when_present() {
    let dir = scratch_dir("remux");
    let media = FakeMedia {
        has_audio: true,
        ..FakeMedia::new(5)
    };
    let outcome = Coordinator::new(
        identity_request(&dir),
        config_in(&dir),
        media,
        ProgressReporter::silent(),
    )
    .unwrap()
    .run()
    .unwrap();
    let RunOutcome::Done(report) = outcome else {
        panic!("expected a finished run");
    };
    assert_eq!(report.audio, AudioOutcome::Remuxed);
    assert!(report.output.exists());
    assert!(temp_is_empty(&dir));
}

#[test]
fn failed_remux_degrades_to_silent_copy() {
    let dir = scratch_dir("degraded");
    let media = FakeMedia {
        has_audio: true,
        remux_ok: false,
        ..FakeMedia::new(5)
    };
    let outcome = Coordinator::new(
        identity_request(&dir),
        config_in(&dir),
        media,
        ProgressReporter::silent(),
    )
    .unwrap()
    .run()
    .unwrap();
    let RunOutcome::Done(report) = outcome else {
        panic!("expected a finished run");
    };
    assert!(matches!(report.audio, AudioOutcome::Degraded(_)));
    assert_eq!(std::fs::read(&report.output).unwrap(), b"silent video");
    assert!(temp_is_empty(&dir));
}

#[test]
fn cancellation_between_batches_leaves_nothing_behind() {
    let dir = scratch_dir("cancel");
    let media = FakeMedia::new(25);
    let (reporter, rx) = progress_channel(256);
    let coordinator = Coordinator::new(
        identity_request(&dir),
        config_in(&dir),
        media.clone(),
        reporter,
    )
    .unwrap();
    let _ = media.shared.cancel_at.set((20, coordinator.cancel_token()));

    let outcome = coordinator.run().unwrap();
    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(media.written_firsts().len(), 20);
    assert!(temp_is_empty(&dir));
    assert!(!dir.join("out").join("out.mp4").exists());

    let events: Vec<ProgressEvent> = rx.iter().collect();
    assert!(matches!(events.last(), Some(ProgressEvent::Cancelled)));
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, ProgressEvent::Progress(100)))
    );
}

#[test]
fn encode_failure_reports_and_cleans_up() {
    let dir = scratch_dir("encode_fail");
    let media = FakeMedia {
        fail_write_at: Some(12),
        ..FakeMedia::new(25)
    };
    let (reporter, rx) = progress_channel(256);
    let err = Coordinator::new(identity_request(&dir), config_in(&dir), media, reporter)
        .unwrap()
        .run()
        .unwrap_err();
    assert!(matches!(err, VidstyleError::EncodeFailure(_)));
    assert!(err.is_fatal());
    assert!(temp_is_empty(&dir));
    assert!(!dir.join("out").join("out.mp4").exists());

    let events: Vec<ProgressEvent> = rx.iter().collect();
    assert!(matches!(events.last(), Some(ProgressEvent::Failed(_))));
}

#[test]
fn empty_source_is_unreadable() {
    let dir = scratch_dir("empty");
    let err = Coordinator::new(
        identity_request(&dir),
        config_in(&dir),
        FakeMedia::new(0),
        ProgressReporter::silent(),
    )
    .unwrap()
    .run()
    .unwrap_err();
    assert!(matches!(err, VidstyleError::SourceUnreadable(_)));
    assert!(temp_is_empty(&dir));
}

#[test]
fn scaled_stylized_run_writes_target_size() {
    let dir = scratch_dir("scaled");
    let media = FakeMedia {
        width: 16,
        height: 12,
        ..FakeMedia::new(4)
    };
    let request = RunRequest::new(
        dir.join("in.mp4"),
        dir.join("out.mp4"),
        StyleSelector::Cartoon,
        ParameterSet::new(80, 20, -10, 0.5),
    );
    let outcome = Coordinator::new(
        request,
        config_in(&dir),
        media.clone(),
        ProgressReporter::silent(),
    )
    .unwrap()
    .run()
    .unwrap();
    let RunOutcome::Done(report) = outcome else {
        panic!("expected a finished run");
    };
    assert_eq!(report.dimensions, Dimensions::new(8, 6).unwrap());
    let written = media.shared.written.lock().unwrap();
    assert_eq!(written.len(), 4);
    assert!(written.iter().all(|f| f.width == 8 && f.height == 6));
}

#[test]
fn unknown_style_is_rejected_at_the_boundary() {
    let err = "pointillism".parse::<StyleSelector>().unwrap_err();
    assert!(matches!(err, VidstyleError::UnsupportedStyle(_)));
}

#[test]
fn invalid_request_is_rejected_before_running() {
    let dir = scratch_dir("invalid");
    let request = RunRequest::new(
        dir.join("same.mp4"),
        dir.join("same.mp4"),
        StyleSelector::Sketch,
        ParameterSet::default(),
    );
    let res = Coordinator::new(
        request,
        config_in(&dir),
        FakeMedia::new(1),
        ProgressReporter::silent(),
    );
    assert!(matches!(res, Err(VidstyleError::Validation(_))));
}

#[cfg(not(feature = "gpu"))]
#[test]
fn explicit_gpu_without_support_fails() {
    let dir = scratch_dir("nogpu");
    let config = PipelineConfig {
        backend: vidstyle::BackendPreference::Gpu,
        ..config_in(&dir)
    };
    let res = Coordinator::new(
        identity_request(&dir),
        config,
        FakeMedia::new(1),
        ProgressReporter::silent(),
    );
    assert!(res.is_err());
}

#[test]
fn undrained_small_channel_does_not_stall_the_run() {
    let dir = scratch_dir("backpressure");
    let media = FakeMedia::new(200);
    let (reporter, rx) = progress_channel(4);
    let outcome = Coordinator::new(identity_request(&dir), config_in(&dir), media, reporter)
        .unwrap()
        .run()
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Done(_)));
    assert!(temp_is_empty(&dir));

    let events: Vec<ProgressEvent> = rx.iter().collect();
    let percents: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    assert_eq!(percents.last(), Some(&100));
    let phases: Vec<Phase> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Phase(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert_eq!(phases.first(), Some(&Phase::Decoding));
    assert_eq!(phases.last(), Some(&Phase::Done));
    assert!(matches!(events.last(), Some(ProgressEvent::Completed(_))));
}

#[test]
fn transform_failure_names_the_frame_and_cleans_up() {
    let dir = scratch_dir("transform_fail");
    let request = RunRequest::new(
        dir.join("in.mp4"),
        dir.join("out.mp4"),
        StyleSelector::Sketch,
        ParameterSet::default(),
    );
    let (reporter, rx) = progress_channel(256);
    let err = Coordinator::with_backend(
        request,
        config_in(&dir),
        FakeMedia::new(25),
        Box::new(BrokenBlur { poisoned_gray: 13 }),
        reporter,
    )
    .unwrap()
    .run()
    .unwrap_err();

    assert!(
        matches!(err, VidstyleError::TransformFailure { frame_index: 13, .. }),
        "{err:?}"
    );
    assert!(err.is_fatal());
    assert!(temp_is_empty(&dir));
    assert!(!dir.join("out.mp4").exists());

    let events: Vec<ProgressEvent> = rx.iter().collect();
    assert!(
        events
            .iter()
            .any(|e| matches!(e, ProgressEvent::Phase(Phase::Failed)))
    );
    assert!(matches!(events.last(), Some(ProgressEvent::Failed(_))));
}

#[test]
fn cancellation_during_audio_extraction_discards_everything() {
    let dir = scratch_dir("cancel_audio");
    let media = FakeMedia {
        has_audio: true,
        ..FakeMedia::new(5)
    };
    let (reporter, rx) = progress_channel(256);
    let coordinator = Coordinator::new(
        identity_request(&dir),
        config_in(&dir),
        media.clone(),
        reporter,
    )
    .unwrap();
    let _ = media.shared.cancel_on_audio.set(coordinator.cancel_token());

    let outcome = coordinator.run().unwrap();
    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(media.written_firsts().len(), 5);
    assert!(temp_is_empty(&dir));
    assert!(!dir.join("out").join("out.mp4").exists());

    let events: Vec<ProgressEvent> = rx.iter().collect();
    assert!(matches!(events.last(), Some(ProgressEvent::Cancelled)));
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, ProgressEvent::Phase(Phase::Remuxing | Phase::Copying)))
    );
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, ProgressEvent::Progress(100)))
    );
}

#[test]
fn repeated_runs_agree_on_frames_and_resolution() {
    let dir = scratch_dir("repeat");
    let run_once = |name: &str| {
        let media = FakeMedia {
            width: 16,
            height: 12,
            ..FakeMedia::new(6)
        };
        let request = RunRequest::new(
            dir.join("in.mp4"),
            dir.join(name),
            StyleSelector::Cartoon,
            ParameterSet::new(60, 10, 0, 0.5),
        );
        let outcome = Coordinator::new(
            request,
            config_in(&dir),
            media.clone(),
            ProgressReporter::silent(),
        )
        .unwrap()
        .run()
        .unwrap();
        let RunOutcome::Done(report) = outcome else {
            panic!("expected a finished run");
        };
        let written = media.shared.written.lock().unwrap().clone();
        (report, written)
    };

    let (first, first_frames) = run_once("a.mp4");
    let (second, second_frames) = run_once("b.mp4");
    assert_eq!(first.frames_written, second.frames_written);
    assert_eq!(first.dimensions, second.dimensions);
    assert_eq!(first_frames, second_frames);
}
