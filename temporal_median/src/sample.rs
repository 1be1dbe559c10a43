//! Integer sample types and their bit depths.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Bit depth of the intensity stream handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum BitDepth {
    U8,
    U16,
    U32,
}

impl BitDepth {
    pub fn bits(self) -> u32 {
        match self {
            BitDepth::U8 => 8,
            BitDepth::U16 => 16,
            BitDepth::U32 => 32,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        self.bits() as usize / 8
    }

    /// Size of the rank domain known up front, `None` for 32-bit data whose
    /// domain is derived from the observed maximum.
    pub fn fixed_domain(self) -> Option<usize> {
        match self {
            BitDepth::U8 => Some(1 << 8),
            BitDepth::U16 => Some(1 << 16),
            BitDepth::U32 => None,
        }
    }

    /// Headroom factor reserved on top of the raw frame bytes when sizing
    /// brackets: the rank-compacted copy plus per-worker scratch.
    pub fn default_safety_ratio(self) -> f64 {
        match self {
            BitDepth::U8 | BitDepth::U16 => 2.5,
            BitDepth::U32 => 4.0,
        }
    }
}

/// Unsigned integer sample stored in a volume.
///
/// Every rank produced by the compactor fits in the sample type itself,
/// because a domain never holds more distinct values than the type can
/// represent.
pub trait Sample: Copy + Default + Ord + Debug + Send + Sync + 'static {
    const BIT_DEPTH: BitDepth;

    fn to_u32(self) -> u32;

    /// Truncating conversion; callers only pass values that fit.
    fn from_u32(value: u32) -> Self;

    #[inline]
    fn to_index(self) -> usize {
        self.to_u32() as usize
    }
}

macro_rules! impl_sample {
    ($ty:ty, $depth:expr) => {
        impl Sample for $ty {
            const BIT_DEPTH: BitDepth = $depth;

            #[inline(always)]
            fn to_u32(self) -> u32 {
                self as u32
            }

            #[inline(always)]
            fn from_u32(value: u32) -> Self {
                value as $ty
            }
        }
    };
}

impl_sample!(u8, BitDepth::U8);
impl_sample!(u16, BitDepth::U16);
impl_sample!(u32, BitDepth::U32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_depth_display() {
        assert_eq!(BitDepth::U16.to_string(), "u16");
    }

    #[test]
    fn test_fixed_domains() {
        assert_eq!(BitDepth::U8.fixed_domain(), Some(256));
        assert_eq!(BitDepth::U16.fixed_domain(), Some(65536));
        assert_eq!(BitDepth::U32.fixed_domain(), None);
    }

    #[test]
    fn test_sample_bit_depths() {
        assert_eq!(<u8 as Sample>::BIT_DEPTH.bytes_per_sample(), 1);
        assert_eq!(<u16 as Sample>::BIT_DEPTH.bytes_per_sample(), 2);
        assert_eq!(<u32 as Sample>::BIT_DEPTH.bytes_per_sample(), 4);
        assert_eq!(u16::from_u32(65535).to_index(), 65535);
    }
}
