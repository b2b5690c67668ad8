//! Run orchestration: batching, lifecycle, progress and cleanup.

/// Cooperative cancellation.
pub mod cancel;
/// Per-run request and tuning knobs.
pub mod config;
/// Lifecycle state machine and the run entry points.
pub mod coordinator;
/// Progress derivation and the event channel.
pub mod progress;
/// Parallel batch transform loop.
pub mod scheduler;
/// Temporary artifact naming and removal.
pub mod temp;
