//! vidstyle applies an artistic style to every frame of a video file.
//!
//! A run decodes the input, transforms frames in parallel batches, encodes a silent video,
//! then carries the source audio over into the final output:
//!
//! - Describe the run with a [`RunRequest`] and tune it with a [`PipelineConfig`]
//! - Create a [`Coordinator`] (or call [`run_with_events`])
//! - Watch [`ProgressEvent`]s and cancel through a [`CancelToken`]
#![forbid(unsafe_code)]

pub mod backend;
pub mod filters;
pub mod foundation;
pub mod media;
pub mod pipeline;
pub mod style;
pub mod transform;

pub use crate::backend::{BackendKind, BackendPreference, FilterBackend, select_backend};
pub use crate::foundation::core::{Dimensions, Fps, Frame, GrayPlane};
pub use crate::foundation::error::{VidstyleError, VidstyleResult};
pub use crate::media::{
    FfmpegMedia, MediaIo,
    probe::SourceInfo,
    sink::{FrameSink, SinkConfig},
    source::{FrameSource, MemorySource},
};
pub use crate::pipeline::cancel::CancelToken;
pub use crate::pipeline::config::{PipelineConfig, RunRequest};
pub use crate::pipeline::coordinator::{
    AudioOutcome, Coordinator, RunOutcome, RunReport, run_with_events,
};
pub use crate::pipeline::progress::{
    Phase, PipelineState, ProgressEvent, ProgressReporter, progress_channel,
};
pub use crate::style::model::{ParameterSet, StyleSelector};
pub use crate::transform::{TransformPlan, transform_frame};
