//! Progress reporting for bracketed runs.
//!
//! A run reports three events per bracket, in order: before the frames are
//! requested from the source, before the pixels are processed, and before the
//! trimmed output goes to the sink. `current` counts brackets, so a run over
//! `n` brackets reports `3 * n` events.

use std::sync::Arc;

/// Position of a run within its bracket plan.
#[derive(Debug, Clone)]
pub struct Progress {
    /// Index of the bracket being worked on (0-based).
    pub current: usize,
    /// Number of brackets in the plan.
    pub total: usize,
    /// What the run is doing with the current bracket.
    pub stage: Stage,
}

/// Stage of work on one bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Waiting on the frame source.
    Loading,
    /// Ranking and median subtraction.
    Processing,
    /// Handing corrected frames to the sink.
    Emitting,
}

/// Called from the thread driving the run, never from pool workers.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Invokes `callback`, if any, for bracket `current` of `total`.
pub fn report_progress(
    callback: Option<&ProgressCallback>,
    current: usize,
    total: usize,
    stage: Stage,
) {
    if let Some(f) = callback {
        f(Progress {
            current,
            total,
            stage,
        });
    }
}
