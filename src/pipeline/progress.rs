use std::{
    collections::VecDeque,
    sync::{
        Arc,
        mpsc::{Receiver, SyncSender, TrySendError, sync_channel},
    },
};

use crate::{foundation::core::Frame, pipeline::coordinator::RunReport};

pub const FRAMES_PERCENT_CEILING: u8 = 90;
pub const EXTRACTING_AUDIO_PERCENT: u8 = 92;
pub const MUXING_PERCENT: u8 = 95;
pub const DONE_PERCENT: u8 = 100;

/// Lifecycle states of one run, in the only order they may be entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Idle,
    Decoding,
    Transforming,
    Encoding,
    ExtractingAudio,
    Remuxing,
    Copying,
    Done,
    Failed,
    Cancelled,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    /// Whether a run may move from `self` to `next`.
    ///
    /// Forward only; `Remuxing` and `Copying` are alternatives, except that a failed remux
    /// falls back to copying. `Failed`/`Cancelled` are reachable from any non-terminal state.
    pub fn can_advance_to(self, next: Phase) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Phase::Failed | Phase::Cancelled => true,
            Phase::Copying => matches!(
                self,
                Phase::Encoding | Phase::ExtractingAudio | Phase::Remuxing
            ),
            Phase::Done => matches!(self, Phase::Remuxing | Phase::Copying),
            Phase::Remuxing => self == Phase::ExtractingAudio,
            _ => next > self && next < Phase::Remuxing,
        }
    }
}

/// Progress bookkeeping of one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineState {
    pub total_frames: u64,
    pub frames_processed: u64,
    pub phase: Phase,
}

impl PipelineState {
    pub fn new(total_frames: u64) -> Self {
        Self {
            total_frames,
            frames_processed: 0,
            phase: Phase::Idle,
        }
    }

    /// Derived 0..=100 progress. Frame work maps onto 0..=90; later phases are checkpoints.
    pub fn percent(&self) -> u8 {
        match self.phase {
            Phase::Idle => 0,
            Phase::Decoding | Phase::Transforming | Phase::Encoding => {
                frames_percent(self.frames_processed, self.total_frames)
            }
            Phase::ExtractingAudio => EXTRACTING_AUDIO_PERCENT,
            Phase::Remuxing | Phase::Copying => MUXING_PERCENT,
            Phase::Done => DONE_PERCENT,
            Phase::Failed | Phase::Cancelled => {
                frames_percent(self.frames_processed, self.total_frames)
            }
        }
    }
}

fn frames_percent(processed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (u128::from(processed) * u128::from(FRAMES_PERCENT_CEILING)) / u128::from(total);
    pct.min(u128::from(FRAMES_PERCENT_CEILING)) as u8
}

/// Notifications a caller receives while a run progresses.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    Phase(Phase),
    /// Monotonic 0..=100; 100 is sent exactly once, when the run is done.
    Progress(u8),
    /// Last frame of the most recently flushed batch. May be dropped under backpressure.
    Preview {
        frame_index: u64,
        frame: Arc<Frame>,
    },
    Completed(RunReport),
    Failed(String),
    Cancelled,
}

/// Sending half of the progress channel, owned by the coordinator.
///
/// Sending never blocks the run. Events that do not fit into the channel wait in a local
/// queue, where consecutive percentages collapse into the latest one and previews are
/// dropped. Whatever is still queued when the reporter is dropped is delivered from a
/// detached thread, so a caller may drain the receiver after the run returned.
///
/// Percentages never go backwards. A disconnected receiver is not an error: the run keeps
/// going and events are dropped.
#[derive(Debug)]
pub struct ProgressReporter {
    tx: Option<SyncSender<ProgressEvent>>,
    queued: VecDeque<ProgressEvent>,
    last_percent: Option<u8>,
}

/// Creates a bounded progress channel.
pub fn progress_channel(capacity: usize) -> (ProgressReporter, Receiver<ProgressEvent>) {
    let (tx, rx) = sync_channel(capacity.max(1));
    (
        ProgressReporter {
            tx: Some(tx),
            queued: VecDeque::new(),
            last_percent: None,
        },
        rx,
    )
}

impl ProgressReporter {
    /// A reporter that discards everything.
    pub fn silent() -> Self {
        Self {
            tx: None,
            queued: VecDeque::new(),
            last_percent: None,
        }
    }

    pub fn last_percent(&self) -> Option<u8> {
        self.last_percent
    }

    pub fn phase(&mut self, phase: Phase) {
        self.send(ProgressEvent::Phase(phase));
    }

    /// Reports `percent`, clamped so the sequence stays non-decreasing.
    pub fn progress(&mut self, percent: u8) {
        let percent = percent.min(DONE_PERCENT);
        let percent = match self.last_percent {
            Some(last) if last >= DONE_PERCENT => return,
            Some(last) => percent.max(last),
            None => percent,
        };
        self.last_percent = Some(percent);
        self.send(ProgressEvent::Progress(percent));
    }

    pub fn preview(&mut self, frame_index: u64, frame: Frame) {
        self.flush();
        let Some(tx) = &self.tx else {
            return;
        };
        if !self.queued.is_empty() {
            tracing::trace!(frame_index, "progress channel backed up, preview dropped");
            return;
        }
        match tx.try_send(ProgressEvent::Preview {
            frame_index,
            frame: Arc::new(frame),
        }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::trace!(frame_index, "progress channel full, preview dropped");
            }
            Err(TrySendError::Disconnected(_)) => self.disconnect(),
        }
    }

    pub fn completed(&mut self, report: RunReport) {
        self.send(ProgressEvent::Completed(report));
    }

    pub fn failed(&mut self, message: String) {
        self.send(ProgressEvent::Failed(message));
    }

    pub fn cancelled(&mut self) {
        self.send(ProgressEvent::Cancelled);
    }

    fn send(&mut self, event: ProgressEvent) {
        if self.tx.is_none() {
            return;
        }
        if matches!(event, ProgressEvent::Progress(_))
            && matches!(self.queued.back(), Some(ProgressEvent::Progress(_)))
        {
            self.queued.pop_back();
        }
        self.queued.push_back(event);
        self.flush();
    }

    fn flush(&mut self) {
        let Some(tx) = &self.tx else {
            self.queued.clear();
            return;
        };
        while let Some(event) = self.queued.pop_front() {
            match tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    self.queued.push_front(event);
                    return;
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.disconnect();
                    return;
                }
            }
        }
    }

    fn disconnect(&mut self) {
        tracing::debug!("progress receiver dropped; further events are discarded");
        self.tx = None;
        self.queued.clear();
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.flush();
        if self.queued.is_empty() {
            return;
        }
        let Some(tx) = self.tx.take() else {
            return;
        };
        let queued = std::mem::take(&mut self.queued);
        let pending = queued.len();
        let handoff = std::thread::Builder::new()
            .name("vidstyle-progress".into())
            .spawn(move || {
                for event in queued {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            });
        if let Err(e) = handoff {
            tracing::warn!(pending, "could not deliver queued progress events: {e}");
        }
    }
}
