//! Run configuration.
//!
//! Everything a run needs is carried in one [`Config`] value passed down to
//! the chunk planner and the scheduler.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::progress::ProgressCallback;
use crate::sample::BitDepth;
use crate::tracker::Strategy;

/// Default window width in frames.
pub const DEFAULT_WINDOW: usize = 51;

/// Memory budget used to size brackets.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Bytes available for frame data. If None, queries the system.
    pub available_memory: Option<u64>,
    /// Divides the available memory to leave room for the ranked copy and
    /// scratch buffers. If None, uses [`BitDepth::default_safety_ratio`].
    pub safety_ratio: Option<f64>,
}

impl MemoryConfig {
    /// Available memory - uses override if set, otherwise queries system.
    pub fn available_memory(&self) -> u64 {
        self.available_memory.unwrap_or_else(system_available_memory)
    }

    pub fn safety_ratio(&self, bit_depth: BitDepth) -> f64 {
        self.safety_ratio
            .unwrap_or_else(|| bit_depth.default_safety_ratio())
    }
}

fn system_available_memory() -> u64 {
    use sysinfo::System;

    let mut sys = System::new();
    sys.refresh_memory();
    sys.available_memory()
}

/// Configuration for temporal median background subtraction.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Window width in frames. Must be odd.
    pub window: usize,
    /// Frames to process. If None, the whole series.
    pub frame_range: Option<Range<usize>>,
    pub strategy: Strategy,
    /// Worker threads. If None, one per hardware thread.
    pub threads: Option<usize>,
    pub memory: MemoryConfig,
    /// Optional progress callback.
    #[serde(skip)]
    pub progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("window", &self.window)
            .field("frame_range", &self.frame_range)
            .field("strategy", &self.strategy)
            .field("threads", &self.threads)
            .field("memory", &self.memory)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl PartialEq for Config {
    fn eq(&self, other: &Self) -> bool {
        self.window == other.window
            && self.frame_range == other.frame_range
            && self.strategy == other.strategy
            && self.threads == other.threads
            && self.memory == other.memory
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            frame_range: None,
            strategy: Strategy::default(),
            threads: None,
            memory: MemoryConfig::default(),
            progress: None,
        }
    }
}

impl Config {
    pub fn with_window(window: usize) -> Self {
        Self {
            window,
            ..Default::default()
        }
    }

    pub fn frame_range(mut self, range: Range<usize>) -> Self {
        self.frame_range = Some(range);
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn available_memory(mut self, bytes: u64) -> Self {
        self.memory.available_memory = Some(bytes);
        self
    }

    pub fn safety_ratio(mut self, ratio: f64) -> Self {
        self.memory.safety_ratio = Some(ratio);
        self
    }

    pub fn progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Checks the configuration against a series of `total_frames` frames and
    /// returns the frame range to process.
    pub fn validate(&self, total_frames: usize) -> Result<Range<usize>> {
        if self.window == 0 {
            return Err(Error::ZeroWindow);
        }
        if self.window % 2 == 0 {
            return Err(Error::EvenWindow(self.window));
        }
        if let Some(ratio) = self.memory.safety_ratio.filter(|r| !(r.is_finite() && *r > 0.0)) {
            return Err(Error::InvalidSafetyRatio(ratio));
        }

        let range = self.frame_range.clone().unwrap_or(0..total_frames);
        if range.is_empty() {
            return Err(Error::EmptyFrameRange(range));
        }
        if range.end > total_frames {
            return Err(Error::FrameRangeOutOfBounds {
                range,
                frames: total_frames,
            });
        }
        if self.window >= range.len() {
            return Err(Error::WindowTooLarge {
                window: self.window,
                frames: range.len(),
            });
        }

        Ok(range)
    }

    pub(crate) fn build_thread_pool(&self) -> Result<rayon::ThreadPool> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads.unwrap_or(0))
            .thread_name(|i| format!("temporal-median-{i}"))
            .build()?;
        Ok(pool)
    }
}
