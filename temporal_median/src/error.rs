//! Error types for temporal median processing.

use std::ops::Range;

use thiserror::Error;

/// Boxed error raised by a caller-provided frame source or sink.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while configuring or running background subtraction.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Window must be at least 1 frame")]
    ZeroWindow,

    #[error("Window must be odd, got {0}")]
    EvenWindow(usize),

    #[error("Window of {window} frames must be shorter than the {frames}-frame series")]
    WindowTooLarge { window: usize, frames: usize },

    #[error("Frame range {0:?} is empty")]
    EmptyFrameRange(Range<usize>),

    #[error("Frame range {range:?} exceeds the {frames}-frame series")]
    FrameRangeOutOfBounds { range: Range<usize>, frames: usize },

    #[error("Safety ratio must be finite and positive, got {0}")]
    InvalidSafetyRatio(f64),

    #[error("Normalization needs between 2 and {max} levels, got {levels}")]
    InvalidLevels { levels: u32, max: u32 },

    #[error("Volume has no pixels")]
    EmptyVolume,

    #[error("Rank domain of {domain} values exceeds the supported maximum of {max}")]
    DomainTooLarge { domain: u64, max: u64 },

    #[error("Sample value {value} lies outside the {domain}-value rank domain")]
    SampleOutOfDomain { value: u64, domain: u64 },

    #[error("Failed to allocate {bytes} bytes for {what}")]
    Allocation { what: &'static str, bytes: u64 },

    #[error(
        "Memory budget holds {slices} frames per bracket, at least one window of {window} is required"
    )]
    BracketTooSmall { slices: usize, window: usize },

    #[error("Source returned {actual} frames for load range {range:?}")]
    FrameCountMismatch { range: Range<usize>, actual: usize },

    #[error("Source frames are {actual:?}, expected {expected:?} (width, height)")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Failed to load frames {range:?}: {source}")]
    Source {
        range: Range<usize>,
        #[source]
        source: BoxedError,
    },

    #[error("Failed to emit frames starting at {first_frame}: {source}")]
    Sink {
        first_frame: usize,
        #[source]
        source: BoxedError,
    },

    #[error("Failed to build worker thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
