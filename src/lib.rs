//! Steinhardt rotational order parameters from spherical-harmonic NIfTI
//! volumes.
//!
//! Takes 4-D NIfTI images whose last axis holds even-degree spherical-
//! harmonic coefficients (6, 15, 28 or 45 channels for lmax 2/4/6/8) and
//! computes, per voxel, the rotationally invariant order parameters q2,
//! q4, q6 and q8:
//!
//! ```text
//! q(v) = sqrt( 4π / (2q + 1) · Σ_m c_{q,m}(v)² )
//! ```
//!
//! Each parameter is written as a 3-D volume next to the input, sharing
//! its spatial transform.
//!
//! # Example
//! ```ignore
//! let paths = steinhardt::batch::inputs_matching("normed_mifs/*.nii.gz")?;
//! let failures = steinhardt::batch::run(&paths);
//! ```

pub mod batch;
pub mod error;
pub mod harmonics;
pub mod nifti;
pub mod order;

pub use error::{Error, Result};
