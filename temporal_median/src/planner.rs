//! Out-of-core bracket planning.
//!
//! When a series does not fit in memory it is processed as a sequence of
//! brackets. Each bracket owns a contiguous range of output frames and loads
//! `window / 2` extra frames on either side of it, so every owned frame sees
//! the same centred window it would see in a single whole-series run. The
//! extra frames are trimmed from the output again.
//!
//! All ranges here are half-open.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One memory-bounded unit of work along the frame axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bracket {
    /// First output frame this bracket owns.
    pub frame_start: usize,
    /// One past the last owned output frame.
    pub frame_end: usize,
    /// First frame loaded for processing.
    pub load_start: usize,
    /// One past the last loaded frame.
    pub load_end: usize,
}

impl Bracket {
    #[inline]
    pub fn output_range(&self) -> Range<usize> {
        self.frame_start..self.frame_end
    }

    #[inline]
    pub fn load_range(&self) -> Range<usize> {
        self.load_start..self.load_end
    }

    #[inline]
    pub fn load_len(&self) -> usize {
        self.load_end - self.load_start
    }

    /// Owned output frames as offsets into the loaded frames.
    #[inline]
    pub fn trimmed_range(&self) -> Range<usize> {
        (self.frame_start - self.load_start)..(self.frame_end - self.load_start)
    }
}

/// Number of output frames per bracket that fit in `available_memory`.
///
/// One window of frames is held back for the look-around overlap.
/// `safety_ratio` must be finite and positive, as `Config::validate` ensures.
pub fn slices_that_fit(
    frame_bytes: u64,
    available_memory: u64,
    safety_ratio: f64,
    window: usize,
) -> usize {
    if frame_bytes == 0 {
        return usize::MAX;
    }
    let frames = (available_memory as f64 / frame_bytes as f64 / safety_ratio).floor();
    (frames as usize).saturating_sub(window)
}

/// Splits `range` into brackets owning at most `slice_budget` output frames
/// each, except that a tail shorter than `window` is merged into the last
/// bracket.
///
/// Every frame of `range` is owned by exactly one bracket, and every bracket
/// owns at least `window` frames.
pub fn plan_brackets(range: Range<usize>, window: usize, slice_budget: usize) -> Result<Vec<Bracket>> {
    debug_assert!(window % 2 == 1, "window must be odd");
    if range.is_empty() {
        return Err(Error::EmptyFrameRange(range));
    }
    if range.len() <= slice_budget {
        return Ok(vec![Bracket {
            frame_start: range.start,
            frame_end: range.end,
            load_start: range.start,
            load_end: range.end,
        }]);
    }
    if slice_budget < window {
        return Err(Error::BracketTooSmall {
            slices: slice_budget,
            window,
        });
    }

    let half = window / 2;
    let mut brackets = Vec::with_capacity(range.len().div_ceil(slice_budget));
    let mut lower = range.start;
    while lower < range.end {
        let mut upper = (lower + slice_budget).min(range.end);
        if range.end - upper < window {
            upper = range.end;
        }

        let load_start = if lower == range.start {
            range.start
        } else {
            lower.saturating_sub(half).max(range.start)
        };
        let load_end = if upper == range.end {
            range.end
        } else {
            (upper + half).min(range.end)
        };

        brackets.push(Bracket {
            frame_start: lower,
            frame_end: upper,
            load_start,
            load_end,
        });
        lower = upper;
    }

    Ok(brackets)
}
