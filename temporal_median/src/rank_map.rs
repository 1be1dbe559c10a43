//! Dense value ↔ rank mapping built from the values a bracket actually contains.
//!
//! A temporal median only needs the order of values, not their magnitude, so
//! each distinct observed intensity is replaced by its 0-based rank. The
//! tracker histogram then has one slot per distinct value instead of one per
//! representable value: a 16-bit movie that realises a few thousand
//! intensities gets a few-thousand-slot histogram instead of 65536.

use common::Buffer3;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::sample::Sample;

/// Largest rank domain accepted for 32-bit data (2^24, the range in which
/// every integer is exactly representable as `f32`).
pub const MAX_RANK_DOMAIN: usize = 1 << 24;

/// Mapping between observed sample values and dense ranks `0..=max_rank`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankMap {
    /// Value → rank, indexed by value. Entries for unobserved values are 0.
    forward: Vec<u32>,
    /// Rank → value, strictly increasing.
    inverse: Vec<u32>,
}

impl RankMap {
    /// Builds the map over the domain implied by the sample type: 256 or 65536
    /// values for 8/16-bit data, `max + 1` for 32-bit data.
    pub fn build<S: Sample>(samples: &[S]) -> Result<Self> {
        let domain = match S::BIT_DEPTH.fixed_domain() {
            Some(domain) => domain,
            None => {
                let max = samples.iter().max().ok_or(Error::EmptyVolume)?;
                max.to_index() + 1
            }
        };
        Self::build_with_domain(samples, domain)
    }

    /// Builds the map for samples drawn from `0..domain`.
    pub fn build_with_domain<S: Sample>(samples: &[S], domain: usize) -> Result<Self> {
        if samples.is_empty() {
            return Err(Error::EmptyVolume);
        }
        if domain > MAX_RANK_DOMAIN {
            return Err(Error::DomainTooLarge {
                domain: domain as u64,
                max: MAX_RANK_DOMAIN as u64,
            });
        }

        let mut presence: Vec<bool> = try_zeroed(domain, "rank presence bitmap")?;
        for &sample in samples {
            let value = sample.to_index();
            if value >= domain {
                return Err(Error::SampleOutOfDomain {
                    value: value as u64,
                    domain: domain as u64,
                });
            }
            presence[value] = true;
        }

        let mut forward: Vec<u32> = try_zeroed(domain, "rank forward table")?;
        let mut inverse = Vec::new();
        for (value, _) in presence.iter().enumerate().filter(|(_, present)| **present) {
            forward[value] = inverse.len() as u32;
            inverse.push(value as u32);
        }

        tracing::debug!(domain, distinct = inverse.len(), "Rank map built");

        Ok(Self { forward, inverse })
    }

    /// Highest rank; the tracker histogram needs `max_rank + 1` slots.
    #[inline]
    pub fn max_rank(&self) -> u32 {
        (self.inverse.len() - 1) as u32
    }

    /// Number of distinct observed values.
    #[inline]
    pub fn distinct_values(&self) -> usize {
        self.inverse.len()
    }

    /// Size of the value domain the map was built over.
    #[inline]
    pub fn domain(&self) -> usize {
        self.forward.len()
    }

    /// Rank of an observed value. Unobserved values map to an arbitrary rank.
    #[inline]
    pub fn forward(&self, value: u32) -> u32 {
        self.forward[value as usize]
    }

    #[inline]
    pub fn inverse(&self, rank: u32) -> u32 {
        self.inverse[rank as usize]
    }

    /// Rank → value table, indexed by rank.
    #[inline]
    pub fn inverse_table(&self) -> &[u32] {
        &self.inverse
    }

    /// Replaces every sample of `volume` by its rank and lays the result out
    /// pixel-major: the `frames` ranks of pixel `p` are
    /// `ranked[p * frames..(p + 1) * frames]`.
    pub fn rank_volume<S: Sample>(&self, volume: &Buffer3<S>) -> Result<Vec<S>> {
        let frames = volume.frames();
        let plane = volume.plane_len();
        if frames == 0 || plane == 0 {
            return Err(Error::EmptyVolume);
        }

        let mut ranked: Vec<S> = try_zeroed(volume.len(), "ranked volume")?;
        let samples = volume.as_slice();
        ranked
            .par_chunks_mut(frames)
            .enumerate()
            .for_each(|(pixel, column)| {
                for (t, rank) in column.iter_mut().enumerate() {
                    let value = samples[t * plane + pixel].to_u32();
                    *rank = S::from_u32(self.forward(value));
                }
            });

        Ok(ranked)
    }
}

/// Allocates `len` default values, reporting failure instead of aborting.
pub(crate) fn try_zeroed<T: Clone + Default>(len: usize, what: &'static str) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| Error::Allocation {
        what,
        bytes: (len as u64).saturating_mul(size_of::<T>() as u64),
    })?;
    buf.resize(len, T::default());
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    #[test]
    fn test_compacts_observed_values() {
        let map = RankMap::build(&[0u8, 5, 5, 12]).unwrap();

        assert_eq!(map.domain(), 256);
        assert_eq!(map.max_rank(), 2);
        assert_eq!(map.distinct_values(), 3);
        assert_eq!(map.forward(0), 0);
        assert_eq!(map.forward(5), 1);
        assert_eq!(map.forward(12), 2);
        assert_eq!(map.inverse_table(), &[0, 5, 12]);
    }

    #[test]
    fn test_round_trip_and_monotonic() {
        let mut rng = StdRng::seed_from_u64(7);
        let samples: Vec<u16> = (0..5000).map(|_| rng.random_range(100..4000)).collect();
        let map = RankMap::build(&samples).unwrap();

        for &v in &samples {
            assert_eq!(map.inverse(map.forward(v as u32)), v as u32);
        }
        for r in 0..=map.max_rank() {
            assert_eq!(map.forward(map.inverse(r)), r);
        }
        for pair in map.inverse_table().windows(2) {
            assert!(pair[0] < pair[1], "inverse must be strictly increasing");
        }
    }

    #[test]
    fn test_single_value() {
        let map = RankMap::build(&[42u16; 10]).unwrap();
        assert_eq!(map.max_rank(), 0);
        assert_eq!(map.inverse(0), 42);
    }

    #[test]
    fn test_u32_domain_from_observed_max() {
        let map = RankMap::build(&[3u32, 70_000, 9]).unwrap();
        assert_eq!(map.domain(), 70_001);
        assert_eq!(map.inverse_table(), &[3, 9, 70_000]);
    }

    #[test]
    fn test_u32_domain_too_large() {
        let err = RankMap::build(&[1u32, MAX_RANK_DOMAIN as u32]).unwrap_err();
        assert!(matches!(
            err,
            Error::DomainTooLarge {
                domain,
                max
            } if domain == MAX_RANK_DOMAIN as u64 + 1 && max == MAX_RANK_DOMAIN as u64
        ));
    }

    #[test]
    fn test_explicit_domain_rejects_out_of_range() {
        let err = RankMap::build_with_domain(&[1u16, 300], 256).unwrap_err();
        assert!(matches!(err, Error::SampleOutOfDomain { value: 300, domain: 256 }));
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(
            RankMap::build::<u16>(&[]),
            Err(Error::EmptyVolume)
        ));
    }

    #[test]
    fn test_rank_volume_is_pixel_major() {
        // 2x1 pixels, 3 frames: pixel 0 = [10, 30, 20], pixel 1 = [5, 5, 40]
        let volume = Buffer3::new(2, 1, 3, vec![10u16, 5, 30, 5, 20, 40]);
        let map = RankMap::build(volume.as_slice()).unwrap();
        let ranked = map.rank_volume(&volume).unwrap();

        // observed values 5, 10, 20, 30, 40 -> ranks 0..=4
        assert_eq!(ranked, vec![1, 3, 2, 0, 0, 4]);
    }
}
