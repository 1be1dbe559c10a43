//! Parallel per-pixel median subtraction over one loaded bracket.
//!
//! A pixel's whole time series is the unit of work. Every worker of the pool
//! owns one tracker and one output column, claims pixel indices from a shared
//! atomic counter until it runs dry, and writes each finished column straight
//! back into the volume. Columns are disjoint, so the claim counter is the
//! only shared mutable state.

use std::sync::atomic::{AtomicUsize, Ordering};

use common::Buffer3;

use crate::error::{Error, Result};
use crate::rank_map::RankMap;
use crate::sample::Sample;
use crate::tracker::{HuangTracker, HungTracker, MedianTracker, Strategy};

/// Summary of one processed bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracketStats {
    pub pixels: usize,
    pub frames: usize,
    pub distinct_values: usize,
}

/// Subtracts the running temporal median from one pixel's ranked series.
///
/// `ranked` holds the pixel's ranks in frame order, `inverse` maps ranks back
/// to intensities, and `out[t]` receives `max(value[t] - median[t], 0)`.
/// Frame `t` uses the window centred on it; the first `window / 2 + 1` frames
/// share the median of the first window and the last `window / 2` frames share
/// the median of the last window.
pub fn correct_series<T: MedianTracker, S: Sample>(
    tracker: &mut T,
    ranked: &[S],
    window: usize,
    inverse: &[u32],
    out: &mut [S],
) {
    let frames = ranked.len();
    let half = window / 2;
    debug_assert!(frames >= window, "series shorter than window");
    debug_assert_eq!(out.len(), frames);

    let value = |t: usize| inverse[ranked[t].to_index()];
    let corrected = |t: usize, median: u32| S::from_u32(value(t).saturating_sub(median));

    tracker.seed(ranked[..window].iter().map(|r| r.to_u32()));
    let mut median = inverse[tracker.get() as usize];
    for (t, o) in out[..=half].iter_mut().enumerate() {
        *o = corrected(t, median);
    }

    for t in window..frames {
        tracker.add(ranked[t].to_u32());
        median = inverse[tracker.get() as usize];
        out[t - half] = corrected(t - half, median);
    }

    for (t, o) in out.iter_mut().enumerate().skip(frames - half) {
        *o = corrected(t, median);
    }
}

/// Replaces every sample of `volume` by its zero-floored distance above the
/// running temporal median of its pixel.
pub fn subtract_bracket<S: Sample>(
    volume: &mut Buffer3<S>,
    window: usize,
    strategy: Strategy,
    pool: &rayon::ThreadPool,
) -> Result<BracketStats> {
    let frames = volume.frames();
    if frames < window {
        return Err(Error::WindowTooLarge { window, frames });
    }

    let rank_map = RankMap::build(volume.as_slice())?;
    let ranked = rank_map.rank_volume(volume)?;

    match strategy {
        Strategy::Huang => run_workers::<HuangTracker, S>(volume, &ranked, window, &rank_map, pool),
        Strategy::Hung => run_workers::<HungTracker, S>(volume, &ranked, window, &rank_map, pool),
    }

    Ok(BracketStats {
        pixels: volume.plane_len(),
        frames,
        distinct_values: rank_map.distinct_values(),
    })
}

fn run_workers<T: MedianTracker, S: Sample>(
    volume: &mut Buffer3<S>,
    ranked: &[S],
    window: usize,
    rank_map: &RankMap,
    pool: &rayon::ThreadPool,
) {
    let frames = volume.frames();
    let pixels = volume.plane_len();
    let max_rank = rank_map.max_rank();
    let inverse = rank_map.inverse_table();
    let next_pixel = AtomicUsize::new(0);
    let writer = volume.column_writer();

    let per_worker: Vec<usize> = pool.broadcast(|_| {
        let mut tracker = T::new(window, max_rank);
        let mut column = vec![S::default(); frames];
        let mut done = 0;
        loop {
            let pixel = next_pixel.fetch_add(1, Ordering::Relaxed);
            if pixel >= pixels {
                break;
            }
            let series = &ranked[pixel * frames..(pixel + 1) * frames];
            correct_series(&mut tracker, series, window, inverse, &mut column);
            // SAFETY: the counter hands every pixel index to exactly one worker.
            unsafe { writer.write_column(pixel, &column) };
            done += 1;
        }
        done
    });

    // A worker panic resurfaces from `broadcast`, so every worker drained the counter.
    debug_assert_eq!(per_worker.iter().sum::<usize>(), pixels);
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn pool(threads: usize) -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap()
    }

    /// Straightforward per-frame reference: sort the window each frame uses.
    fn reference_series(values: &[u32], window: usize) -> Vec<u32> {
        let half = window / 2;
        let n = values.len();
        (0..n)
            .map(|t| {
                let start = t.saturating_sub(half).min(n - window);
                let mut w = values[start..start + window].to_vec();
                w.sort_unstable();
                values[t].saturating_sub(w[half])
            })
            .collect()
    }

    fn correct_values(values: &[u16], window: usize) -> Vec<u16> {
        let map = RankMap::build(values).unwrap();
        let ranked: Vec<u16> = values.iter().map(|&v| map.forward(v as u32) as u16).collect();
        let mut out = vec![0u16; values.len()];
        let mut tracker = HuangTracker::new(window, map.max_rank());
        correct_series(&mut tracker, &ranked, window, map.inverse_table(), &mut out);
        out
    }

    #[test]
    fn test_single_pixel_example() {
        assert_eq!(correct_values(&[5, 1, 9, 2, 8], 3), vec![0, 0, 7, 0, 0]);
    }

    #[test]
    fn test_series_matches_reference() {
        let mut rng = StdRng::seed_from_u64(21);
        for window in [1, 3, 9, 51] {
            let values: Vec<u16> = (0..600).map(|_| rng.random_range(0..100)).collect();
            let expected = reference_series(
                &values.iter().map(|&v| v as u32).collect::<Vec<_>>(),
                window,
            );
            let actual: Vec<u32> = correct_values(&values, window)
                .into_iter()
                .map(u32::from)
                .collect();
            assert_eq!(actual, expected, "window {window}");
        }
    }

    #[test]
    fn test_edge_policy() {
        let mut rng = StdRng::seed_from_u64(5);
        let window = 7;
        let half = window / 2;
        let values: Vec<u16> = (0..60).map(|_| rng.random_range(0..1000)).collect();
        let out = correct_values(&values, window);

        let median_of = |w: &[u16]| {
            let mut w = w.to_vec();
            w.sort_unstable();
            w[half]
        };
        let first = median_of(&values[..window]);
        let last = median_of(&values[values.len() - window..]);

        for t in 0..=half {
            assert_eq!(out[t], values[t].saturating_sub(first));
        }
        for t in values.len() - half..values.len() {
            assert_eq!(out[t], values[t].saturating_sub(last));
        }
    }

    #[test]
    fn test_window_equal_to_series_length() {
        // Every frame uses the single available window.
        assert_eq!(correct_values(&[4, 8, 6], 3), vec![0, 2, 0]);
    }

    fn random_volume(rng: &mut StdRng, w: usize, h: usize, frames: usize) -> Buffer3<u16> {
        let data = (0..w * h * frames)
            .map(|_| rng.random_range(200..1200))
            .collect();
        Buffer3::new(w, h, frames, data)
    }

    #[test]
    fn test_volume_matches_per_pixel_reference() {
        let mut rng = StdRng::seed_from_u64(1);
        let original = random_volume(&mut rng, 7, 5, 80);
        let mut volume = original.clone();

        let stats = subtract_bracket(&mut volume, 9, Strategy::Huang, &pool(4)).unwrap();
        assert_eq!(stats.pixels, 35);
        assert_eq!(stats.frames, 80);

        for y in 0..5 {
            for x in 0..7 {
                let series: Vec<u32> = original.column(x, y).map(|&v| v as u32).collect();
                let expected = reference_series(&series, 9);
                let actual: Vec<u32> = volume.column(x, y).map(|&v| v as u32).collect();
                assert_eq!(actual, expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_strategies_and_thread_counts_agree() {
        let mut rng = StdRng::seed_from_u64(2);
        let original = random_volume(&mut rng, 16, 16, 120);

        let mut single = original.clone();
        subtract_bracket(&mut single, 21, Strategy::Huang, &pool(1)).unwrap();

        let mut parallel = original.clone();
        subtract_bracket(&mut parallel, 21, Strategy::Huang, &pool(8)).unwrap();

        let mut hung = original.clone();
        subtract_bracket(&mut hung, 21, Strategy::Hung, &pool(3)).unwrap();

        assert_eq!(single, parallel);
        assert_eq!(single, hung);
    }

    #[test]
    fn test_u8_and_u32_volumes() {
        let mut volume = Buffer3::new(1, 1, 5, vec![5u8, 1, 9, 2, 8]);
        subtract_bracket(&mut volume, 3, Strategy::Hung, &pool(2)).unwrap();
        assert_eq!(volume.as_slice(), &[0, 0, 7, 0, 0]);

        let mut volume = Buffer3::new(1, 1, 5, vec![500_000u32, 100_000, 900_000, 200_000, 800_000]);
        subtract_bracket(&mut volume, 3, Strategy::Huang, &pool(2)).unwrap();
        assert_eq!(volume.as_slice(), &[0, 0, 700_000, 0, 0]);
    }

    #[test]
    fn test_rejects_short_bracket() {
        let mut volume = Buffer3::new(1, 1, 3, vec![1u16, 2, 3]);
        let err = subtract_bracket(&mut volume, 5, Strategy::Huang, &pool(1)).unwrap_err();
        assert!(matches!(err, Error::WindowTooLarge { window: 5, frames: 3 }));
    }
}
