use rayon::prelude::*;

use crate::{
    backend::FilterBackend,
    filters::resize::resize_frame,
    foundation::core::Frame,
    foundation::error::{VidstyleError, VidstyleResult},
    media::{sink::FrameSink, source::FrameSource},
    pipeline::cancel::CancelToken,
    transform::{TransformPlan, transform_frame},
};

/// A contiguous run of decoded frames; `start_index` is the index of `frames[0]` in the stream.
#[derive(Debug)]
pub struct Batch {
    pub start_index: u64,
    pub frames: Vec<Frame>,
}

/// Reported after every flushed batch.
#[derive(Debug)]
pub struct BatchFlushed<'a> {
    /// Total frames written to the sink so far.
    pub frames_written: u64,
    pub last_index: u64,
    pub last_frame: &'a Frame,
}

/// Pulls frames in fixed-size batches, transforms each batch on a dedicated worker pool and
/// writes results to the sink in source order.
pub struct BatchScheduler {
    batch_size: usize,
    pool: rayon::ThreadPool,
}

impl BatchScheduler {
    pub fn new(batch_size: usize, workers: usize) -> VidstyleResult<Self> {
        if batch_size == 0 {
            return Err(VidstyleError::validation("batch_size must be >= 1"));
        }
        if workers == 0 {
            return Err(VidstyleError::validation("workers must be >= 1"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("vidstyle-worker-{i}"))
            .build()
            .map_err(|e| {
                VidstyleError::validation(format!("failed to build rayon thread pool: {e}"))
            })?;
        Ok(Self { batch_size, pool })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Reads up to `batch_size` frames. `None` once the source is exhausted.
    pub fn next_batch(&self, source: &mut dyn FrameSource, start_index: u64) -> Option<Batch> {
        let mut frames = Vec::with_capacity(self.batch_size);
        while frames.len() < self.batch_size {
            match source.next_frame() {
                Some(frame) => frames.push(frame),
                None => break,
            }
        }
        if frames.is_empty() {
            None
        } else {
            Some(Batch {
                start_index,
                frames,
            })
        }
    }

    /// Transforms one batch in parallel. Output order matches input order.
    pub fn transform_batch(
        &self,
        batch: Batch,
        plan: &TransformPlan,
        backend: &dyn FilterBackend,
    ) -> VidstyleResult<Vec<Frame>> {
        let start = batch.start_index;
        let results: Vec<VidstyleResult<Frame>> = self.pool.install(|| {
            batch
                .frames
                .into_par_iter()
                .enumerate()
                .map(|(i, frame)| {
                    let index = start + i as u64;
                    let out = transform_frame(frame, plan, backend)
                        .map_err(|e| VidstyleError::transform(index, e.to_string()))?;
                    if out.dimensions() == plan.target {
                        Ok(out)
                    } else {
                        resize_frame(out, plan.target)
                            .map_err(|e| VidstyleError::transform(index, e.to_string()))
                    }
                })
                .collect()
        });
        results.into_iter().collect()
    }

    /// Drains `source` into `sink`. Returns the number of frames written.
    ///
    /// Cancellation is observed before every batch and surfaces as `Err(Cancelled)`.
    #[tracing::instrument(skip_all, fields(batch_size = self.batch_size, workers = self.workers()))]
    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        plan: &TransformPlan,
        backend: &dyn FilterBackend,
        cancel: &CancelToken,
        on_batch: &mut dyn FnMut(BatchFlushed<'_>),
    ) -> VidstyleResult<u64> {
        let mut written = 0u64;
        loop {
            cancel.check()?;
            let Some(batch) = self.next_batch(source, written) else {
                break;
            };
            let start = batch.start_index;
            let frames = self.transform_batch(batch, plan, backend)?;
            for frame in &frames {
                sink.write_frame(frame)?;
            }
            written += frames.len() as u64;
            tracing::debug!(start, written, "batch flushed");
            if let Some(last) = frames.last() {
                on_batch(BatchFlushed {
                    frames_written: written,
                    last_index: written - 1,
                    last_frame: last,
                });
            }
        }
        Ok(written)
    }
}
