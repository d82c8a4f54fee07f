//! Spherical-harmonic coefficient labeling.
//!
//! SH coefficient volumes store one coefficient per channel, even degrees
//! only (the diffusion profile is antipodally symmetric, so odd degrees
//! vanish), laid out in ascending degree and, within a degree, ascending
//! order:
//!
//! ```text
//! channel  0   1   2   3   4   5   6 ...
//! (l, m)  0,0 2,-2 2,-1 2,0 2,1 2,2 4,-4 ...
//! ```
//!
//! This layout is an external contract with the upstream SH encoder, not a
//! choice made here.

use crate::error::{Error, Result};

/// The degrees for which order parameters are computed.
pub const TARGET_DEGREES: [u32; 4] = [2, 4, 6, 8];

/// Maximum SH degree representable in a coefficient volume.
///
/// Closed enumeration: the channel count of a valid SH volume determines
/// the maximum degree, and only these four layouts exist. Anything else is
/// rejected up front as an unsupported channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxDegree {
    /// lmax = 2 (6 channels)
    L2,
    /// lmax = 4 (15 channels)
    L4,
    /// lmax = 6 (28 channels)
    L6,
    /// lmax = 8 (45 channels)
    L8,
}

impl MaxDegree {
    /// Determine lmax from the channel count of an SH volume.
    pub fn from_channel_count(count: usize) -> Result<Self> {
        match count {
            6 => Ok(Self::L2),
            15 => Ok(Self::L4),
            28 => Ok(Self::L6),
            45 => Ok(Self::L8),
            _ => Err(Error::UnsupportedChannelCount(count)),
        }
    }

    /// The maximum degree as a number.
    pub const fn degree(self) -> u32 {
        match self {
            Self::L2 => 2,
            Self::L4 => 4,
            Self::L6 => 6,
            Self::L8 => 8,
        }
    }

    /// Number of even-degree coefficients up to this lmax:
    /// (lmax / 2 + 1) * (lmax + 1).
    pub const fn channel_count(self) -> usize {
        let l = self.degree() as usize;
        (l / 2 + 1) * (l + 1)
    }
}

/// Enumerate the (degree, order) label of every coefficient channel.
///
/// Returns two equal-length sequences `(degrees, orders)` covering every
/// pair (l, m) with l even in `[0, lmax]` and m in `[-l, l]`, in increasing
/// l then increasing m. Index i labels channel i of the volume.
pub fn coefficient_labels(lmax: MaxDegree) -> (Vec<u32>, Vec<i32>) {
    let count = lmax.channel_count();
    let mut degrees = Vec::with_capacity(count);
    let mut orders = Vec::with_capacity(count);

    for ell in (0..=lmax.degree()).step_by(2) {
        for m in -(ell as i32)..=(ell as i32) {
            degrees.push(ell);
            orders.push(m);
        }
    }

    (degrees, orders)
}
