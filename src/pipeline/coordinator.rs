use std::path::PathBuf;

use crate::{
    backend::{BackendKind, FilterBackend, select_backend},
    foundation::core::Dimensions,
    foundation::error::{VidstyleError, VidstyleResult},
    media::{MediaIo, ensure_parent_dir, sink::SinkConfig},
    pipeline::{
        cancel::CancelToken,
        config::{PipelineConfig, RunRequest},
        progress::{Phase, PipelineState, ProgressEvent, ProgressReporter, progress_channel},
        scheduler::BatchScheduler,
        temp::{TemporaryArtifacts, remove_if_exists},
    },
    transform::TransformPlan,
};

/// What happened to the audio track of a finished run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AudioOutcome {
    /// Source audio was muxed into the output.
    Remuxed,
    /// The source had no usable audio; the output is the silent encode.
    NoAudio,
    /// Audio existed but muxing failed; the output is the silent encode.
    Degraded(String),
}

/// Summary of a successful run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    pub output: PathBuf,
    pub frames_written: u64,
    pub dimensions: Dimensions,
    pub backend: BackendKind,
    pub audio: AudioOutcome,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RunOutcome {
    Done(RunReport),
    Cancelled,
}

/// Drives one run from decode to final output. Single-shot: `run` consumes it.
pub struct Coordinator {
    request: RunRequest,
    media: Box<dyn MediaIo>,
    backend: Box<dyn FilterBackend>,
    scheduler: BatchScheduler,
    artifacts: TemporaryArtifacts,
    reporter: ProgressReporter,
    cancel: CancelToken,
    state: PipelineState,
    output_preexisting: bool,
    output_touched: bool,
}

impl Coordinator {
    pub fn new(
        request: RunRequest,
        config: PipelineConfig,
        media: impl MediaIo + 'static,
        reporter: ProgressReporter,
    ) -> VidstyleResult<Self> {
        request.validate()?;
        let backend = select_backend(config.backend)?;
        Self::with_backend(request, config, media, backend, reporter)
    }

    /// Like [`Coordinator::new`], but with an already constructed backend instead of
    /// `config.backend`.
    pub fn with_backend(
        request: RunRequest,
        config: PipelineConfig,
        media: impl MediaIo + 'static,
        backend: Box<dyn FilterBackend>,
        reporter: ProgressReporter,
    ) -> VidstyleResult<Self> {
        request.validate()?;
        config.validate()?;

        let scheduler = BatchScheduler::new(config.batch_size, config.resolved_workers())?;
        let artifacts = TemporaryArtifacts::new(&config.resolved_temp_dir());
        let output_preexisting = request.output.exists();

        tracing::debug!(
            backend = ?backend.kind(),
            batch_size = scheduler.batch_size(),
            workers = scheduler.workers(),
            silent_video = %artifacts.silent_video_path.display(),
            "coordinator ready"
        );

        Ok(Self {
            request,
            media: Box::new(media),
            backend,
            scheduler,
            artifacts,
            reporter,
            cancel: CancelToken::new(),
            state: PipelineState::new(0),
            output_preexisting,
            output_touched: false,
        })
    }

    /// A token that cancels this run from any thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Runs to completion. Temporary artifacts are removed on every exit path.
    ///
    /// Cancellation is not an error: it yields `Ok(RunOutcome::Cancelled)`. Progress events
    /// never block the run, so the receiver may be drained concurrently or afterwards.
    #[tracing::instrument(
        skip_all,
        fields(
            input = %self.request.input.display(),
            output = %self.request.output.display(),
            style = self.request.style.id(),
        )
    )]
    pub fn run(mut self) -> VidstyleResult<RunOutcome> {
        tracing::info!(backend = ?self.backend.kind(), "run started");
        let result = self.execute();
        self.artifacts.cleanup();

        match result {
            Ok(report) => {
                self.advance(Phase::Done)?;
                tracing::info!(
                    frames = report.frames_written,
                    audio = ?report.audio,
                    "run finished"
                );
                self.reporter.completed(report.clone());
                Ok(RunOutcome::Done(report))
            }
            Err(VidstyleError::Cancelled) => {
                self.discard_partial_output();
                self.advance(Phase::Cancelled)?;
                tracing::info!(
                    frames = self.state.frames_processed,
                    "run cancelled"
                );
                self.reporter.cancelled();
                Ok(RunOutcome::Cancelled)
            }
            Err(e) => {
                self.discard_partial_output();
                self.advance(Phase::Failed)?;
                tracing::warn!("run failed: {e}");
                self.reporter.failed(e.to_string());
                Err(e)
            }
        }
    }

    fn execute(&mut self) -> VidstyleResult<RunReport> {
        self.cancel.check()?;
        self.advance(Phase::Decoding)?;
        let mut source = self.media.open_source(&self.request.input)?;
        let info = source.info().clone();
        self.state.total_frames = source.frame_count();

        let plan = TransformPlan::new(self.request.style, self.request.params, info.dimensions);
        if plan.target != info.dimensions {
            tracing::debug!(from = %info.dimensions, to = %plan.target, "output is rescaled");
        }

        let mut sink = self.media.open_sink(SinkConfig::new(
            self.artifacts.silent_video_path.clone(),
            plan.target,
            info.fps,
        ))?;

        self.advance(Phase::Transforming)?;
        let frames_written = {
            let state = &mut self.state;
            let reporter = &mut self.reporter;
            self.scheduler.run(
                source.as_mut(),
                sink.as_mut(),
                &plan,
                self.backend.as_ref(),
                &self.cancel,
                &mut |batch| {
                    state.frames_processed = batch.frames_written;
                    reporter.progress(state.percent());
                    reporter.preview(batch.last_index, batch.last_frame.clone());
                },
            )?
        };
        drop(source);

        if frames_written == 0 {
            return Err(VidstyleError::source_unreadable(format!(
                "no frames could be decoded from '{}'",
                self.request.input.display()
            )));
        }
        if self.state.total_frames != frames_written {
            tracing::debug!(
                expected = self.state.total_frames,
                actual = frames_written,
                "decoded frame count differs from probe"
            );
        }

        self.advance(Phase::Encoding)?;
        sink.finish()?;

        self.cancel.check()?;
        self.advance(Phase::ExtractingAudio)?;
        let has_audio = self
            .media
            .extract_audio(&self.request.input, &self.artifacts.audio_path);

        self.cancel.check()?;
        ensure_parent_dir(&self.request.output).map_err(|e| VidstyleError::encode(e.to_string()))?;
        let audio = if has_audio {
            self.advance(Phase::Remuxing)?;
            self.output_touched = true;
            if self.media.remux(
                &self.artifacts.silent_video_path,
                &self.artifacts.audio_path,
                &self.request.output,
            ) {
                AudioOutcome::Remuxed
            } else {
                let degraded = VidstyleError::audio_degraded("remux failed, output has no audio");
                tracing::warn!("{degraded}");
                self.advance(Phase::Copying)?;
                self.copy_silent_video()?;
                AudioOutcome::Degraded(degraded.to_string())
            }
        } else {
            tracing::info!("no audio track extracted, output is video only");
            self.advance(Phase::Copying)?;
            self.copy_silent_video()?;
            AudioOutcome::NoAudio
        };

        Ok(RunReport {
            output: self.request.output.clone(),
            frames_written,
            dimensions: plan.target,
            backend: self.backend.kind(),
            audio,
        })
    }

    fn copy_silent_video(&mut self) -> VidstyleResult<()> {
        self.output_touched = true;
        std::fs::copy(&self.artifacts.silent_video_path, &self.request.output).map_err(|e| {
            VidstyleError::encode(format!(
                "failed to copy '{}' to '{}': {e}",
                self.artifacts.silent_video_path.display(),
                self.request.output.display()
            ))
        })?;
        Ok(())
    }

    fn discard_partial_output(&mut self) {
        if !self.output_touched || self.output_preexisting {
            return;
        }
        if let Err(e) = remove_if_exists(&self.request.output) {
            tracing::warn!("{e}");
        }
    }

    fn advance(&mut self, next: Phase) -> VidstyleResult<()> {
        let current = self.state.phase;
        if !current.can_advance_to(next) {
            return Err(VidstyleError::validation(format!(
                "invalid phase transition {current:?} -> {next:?}"
            )));
        }
        self.state.phase = next;
        tracing::debug!(phase = ?next, "phase");
        self.reporter.phase(next);
        if !matches!(next, Phase::Failed | Phase::Cancelled) {
            self.reporter.progress(self.state.percent());
        }
        Ok(())
    }
}

/// Runs a coordinator on a scoped thread and hands every progress event to `on_event` on the
/// calling thread. Returns once the run has finished and all events were delivered.
pub fn run_with_events(
    request: RunRequest,
    config: PipelineConfig,
    media: impl MediaIo + 'static,
    mut on_event: impl FnMut(ProgressEvent),
) -> VidstyleResult<RunOutcome> {
    let (reporter, events) = progress_channel(config.event_capacity);
    let coordinator = Coordinator::new(request, config, media, reporter)?;

    std::thread::scope(|s| {
        let handle = s.spawn(move || coordinator.run());
        for event in events {
            on_event(event);
        }
        handle
            .join()
            .unwrap_or_else(|_| Err(anyhow::anyhow!("pipeline thread panicked").into()))
    })
}
