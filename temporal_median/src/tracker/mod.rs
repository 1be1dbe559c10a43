//! Sliding-window median of one pixel's time series over ranked values.
//!
//! Both trackers keep a histogram of the `W` ranks currently in the window and
//! a circular buffer of those ranks in arrival order. Each step removes the
//! oldest rank, inserts the newest and updates the median without ever
//! sorting the window. They differ in how they know when the median leaves
//! its bucket:
//!
//! - [`HuangTracker`] (Huang, Yang & Tang 1979) tracks the median's 1-based
//!   position inside its bucket and walks to the next occupied bucket when
//!   that position falls off either end.
//! - [`HungTracker`] (Hung et al.) keeps how many window values lie below and
//!   at-or-below the median bucket, updated from a 3×3 lookup on which side
//!   the outgoing and incoming values fall, and rescans the histogram when the
//!   window centre leaves that span.
//!
//! Ranks passed to [`MedianTracker::add`] must lie in `0..=max_rank`. This is
//! not checked outside debug builds.

mod huang;
mod hung;


pub use huang::HuangTracker;
pub use hung::HungTracker;

use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Median update strategy, fixed when a bracket's trackers are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum Strategy {
    /// Position-in-bucket pointer; O(1) steps plus short bucket walks.
    #[default]
    Huang,
    /// Lookup-table bounds with a full rescan when the median bucket changes.
    Hung,
}

/// Running median over the last `window` ranks pushed into it.
///
/// A tracker is created once per worker and reseeded for every pixel, so the
/// histogram and history allocations are reused across the whole bracket.
pub trait MedianTracker: Send {
    /// Creates a tracker for an odd `window` over ranks `0..=max_rank`.
    fn new(window: usize, max_rank: u32) -> Self;

    /// Resets the tracker to exactly the `window` ranks in `ranks`.
    fn seed(&mut self, ranks: impl IntoIterator<Item = u32>);

    /// Pushes a rank, evicting the oldest one.
    fn add(&mut self, rank: u32);

    /// Rank of the `(window - 1) / 2`-th order statistic of the window.
    fn get(&self) -> u32;
}

/// Histogram and arrival-order history shared by both strategies.
#[derive(Debug, Clone)]
struct WindowHistogram {
    hist: Vec<u32>,
    history: Vec<u32>,
    /// Next history slot to overwrite, i.e. the oldest value.
    cursor: usize,
    /// 0-based order statistic the median sits at.
    center: u32,
}

impl WindowHistogram {
    fn new(window: usize, max_rank: u32) -> Self {
        debug_assert!(window % 2 == 1, "window must be odd");
        Self {
            hist: vec![0; max_rank as usize + 1],
            history: vec![0; window],
            cursor: 0,
            center: ((window - 1) / 2) as u32,
        }
    }

    fn seed(&mut self, ranks: impl IntoIterator<Item = u32>) {
        self.hist.fill(0);
        let mut len = 0;
        for (slot, rank) in self.history.iter_mut().zip(ranks) {
            *slot = rank;
            self.hist[rank as usize] += 1;
            len += 1;
        }
        debug_assert_eq!(len, self.history.len(), "seed needs exactly one window of ranks");
        self.cursor = 0;
    }

    /// Records `rank` in place of the oldest value and returns that value.
    #[inline]
    fn push(&mut self, rank: u32) -> u32 {
        debug_assert!((rank as usize) < self.hist.len(), "rank out of range");
        let old = std::mem::replace(&mut self.history[self.cursor], rank);
        self.cursor += 1;
        if self.cursor == self.history.len() {
            self.cursor = 0;
        }
        self.hist[old as usize] -= 1;
        self.hist[rank as usize] += 1;
        old
    }

    #[inline]
    fn count(&self, rank: u32) -> u32 {
        self.hist[rank as usize]
    }

    /// Linear scan for the bucket holding the centre order statistic.
    /// Returns `(median, values below median)`.
    fn scan_median(&self) -> (u32, u32) {
        let mut below = 0;
        for (rank, &count) in self.hist.iter().enumerate() {
            if below + count > self.center {
                return (rank as u32, below);
            }
            below += count;
        }
        unreachable!("histogram holds fewer values than the window")
    }

    /// Next occupied bucket above `rank`.
    #[inline]
    fn next_occupied(&self, rank: u32) -> u32 {
        let mut j = rank as usize + 1;
        while self.hist[j] == 0 {
            j += 1;
        }
        j as u32
    }

    /// Next occupied bucket below `rank`.
    #[inline]
    fn prev_occupied(&self, rank: u32) -> u32 {
        let mut j = rank as usize - 1;
        while self.hist[j] == 0 {
            j -= 1;
        }
        j as u32
    }
}
