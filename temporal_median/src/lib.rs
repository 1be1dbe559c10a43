//! Temporal median background subtraction for image time series.
//!
//! Every pixel of a movie is treated as an independent time series. Each
//! sample is replaced by how far it rises above the median of a sliding
//! window of frames centred on it, with negative results clamped to zero.
//! Slowly varying background is removed and short bright events are kept.
//!
//! The engine works on 8, 16 and 32-bit unsigned samples:
//! - values are rank-compacted per bracket so median histograms stay small
//! - medians are tracked incrementally (Huang or Hung et al.)
//! - pixels are processed in parallel on a rayon pool
//! - series that do not fit in memory are split into overlapping brackets
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use temporal_median::{Buffer3, Config, subtract_in_place};
//!
//! let mut movie: Buffer3<u16> = load_movie()?;
//! subtract_in_place(&mut movie, &Config::with_window(51))?;
//! ```
//!
//! Streaming a series that does not fit in memory goes through [`run`] with a
//! [`FrameSource`] and a [`FrameSink`].

mod config;
mod error;
mod io;
mod normalize;
mod planner;
mod progress;
mod rank_map;
mod run;
mod sample;
mod scheduler;
mod tracker;

#[cfg(feature = "bench")]
pub mod bench;

#[cfg(test)]
mod testing;

pub use common::Buffer3;

// ============================================================================
// Configuration and errors
// ============================================================================

pub use config::{Config, DEFAULT_WINDOW, MemoryConfig};
pub use error::{BoxedError, Error, Result};
pub use progress::{Progress, ProgressCallback, Stage};

// ============================================================================
// Samples and median tracking
// ============================================================================

pub use rank_map::{MAX_RANK_DOMAIN, RankMap};
pub use sample::{BitDepth, Sample};
pub use tracker::{HuangTracker, HungTracker, MedianTracker, Strategy};

// ============================================================================
// Processing
// ============================================================================

pub use io::{FrameSink, FrameSource, VolumeSink, VolumeSource};
pub use normalize::{
    DEFAULT_LEVELS, MinMaxRescale, Normalizer, denormalize_deltas, normalize_volume,
};
pub use planner::{Bracket, plan_brackets, slices_that_fit};
pub use run::{RunSummary, run, run_brackets, subtract_in_place};
pub use scheduler::{BracketStats, correct_series, subtract_bracket};
