//! Mapping of floating-point sources onto a bounded integer domain.
//!
//! The engine ranks integer samples, so 32-bit float movies are brought into
//! `0..levels` before processing. This is a pre-processing step chosen by the
//! caller; the engine itself never sees floats.
//!
//! Float data that already holds non-negative integers below `levels` is
//! passed through unchanged. Anything else is linearly rescaled from
//! `[min, max]` onto `[0, levels - 1]` and rounded, which loses precision
//! whenever the data has more distinct values than `levels`.

use common::Buffer3;
use num_traits::{AsPrimitive, Float};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::rank_map::MAX_RANK_DOMAIN;

/// Number of integer levels used when none is given.
pub const DEFAULT_LEVELS: u32 = MAX_RANK_DOMAIN as u32;

/// Converts source values to and from the integer domain the engine works in.
pub trait Normalizer<F>: Sync {
    fn to_domain(&self, value: F) -> u32;

    /// Inverse of [`Normalizer::to_domain`] up to rounding.
    fn from_domain(&self, value: u32) -> F;

    /// Converts a difference of two domain values (such as a background
    /// subtracted sample) back to source units.
    fn delta_from_domain(&self, delta: u32) -> F;
}

/// Min–max rescale fitted to a set of samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxRescale<F> {
    offset: F,
    scale: F,
    levels: u32,
}

impl<F> MinMaxRescale<F>
where
    F: Float + AsPrimitive<u32> + Send + Sync,
    u32: AsPrimitive<F>,
{
    /// Fits the rescale to `values`. NaNs are ignored when fitting and map to 0.
    ///
    /// `levels` must lie in `2..=DEFAULT_LEVELS`, so the mapped data always
    /// fits the rank domain.
    pub fn fit(values: &[F], levels: u32) -> Result<Self> {
        if !(2..=DEFAULT_LEVELS).contains(&levels) {
            return Err(Error::InvalidLevels {
                levels,
                max: DEFAULT_LEVELS,
            });
        }

        let (min, max, integral) = values
            .iter()
            .filter(|v| !v.is_nan())
            .fold((F::infinity(), F::neg_infinity(), true), |(lo, hi, int), &v| {
                (lo.min(v), hi.max(v), int && v.fract() == F::zero())
            });

        let top: F = (levels - 1).as_();
        if min > max || (integral && min >= F::zero() && max <= top) {
            return Ok(Self::identity(levels));
        }

        let scale = if max > min { top / (max - min) } else { F::one() };
        tracing::warn!(
            min = min.to_f64(),
            max = max.to_f64(),
            levels,
            "Rescaling non-integer samples; precision below one level is lost"
        );
        Ok(Self {
            offset: min,
            scale,
            levels,
        })
    }

    /// Pass-through mapping for data that is already integral.
    pub fn identity(levels: u32) -> Self {
        Self {
            offset: F::zero(),
            scale: F::one(),
            levels,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.offset == F::zero() && self.scale == F::one()
    }

    pub fn levels(&self) -> u32 {
        self.levels
    }
}

impl<F> Normalizer<F> for MinMaxRescale<F>
where
    F: Float + AsPrimitive<u32> + Send + Sync,
    u32: AsPrimitive<F>,
{
    #[inline]
    fn to_domain(&self, value: F) -> u32 {
        // `as` casts saturate: NaN and negatives become 0.
        let level: u32 = ((value - self.offset) * self.scale).round().as_();
        level.min(self.levels - 1)
    }

    #[inline]
    fn from_domain(&self, value: u32) -> F {
        value.as_() / self.scale + self.offset
    }

    #[inline]
    fn delta_from_domain(&self, delta: u32) -> F {
        delta.as_() / self.scale
    }
}

/// Maps a float volume into the integer domain of `normalizer`.
pub fn normalize_volume<F, N>(volume: &Buffer3<F>, normalizer: &N) -> Buffer3<u32>
where
    F: Copy + Send + Sync,
    N: Normalizer<F>,
{
    let data = volume
        .as_slice()
        .par_iter()
        .map(|&v| normalizer.to_domain(v))
        .collect();
    Buffer3::new(volume.width(), volume.height(), volume.frames(), data)
}

/// Converts background-subtracted domain values back to source units.
pub fn denormalize_deltas<F, N>(volume: &Buffer3<u32>, normalizer: &N) -> Buffer3<F>
where
    F: Copy + Send + Sync,
    N: Normalizer<F>,
{
    let data = volume
        .as_slice()
        .par_iter()
        .map(|&d| normalizer.delta_from_domain(d))
        .collect();
    Buffer3::new(volume.width(), volume.height(), volume.frames(), data)
}
