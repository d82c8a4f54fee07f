//! Steinhardt order-parameter computation.
//!
//! For a target degree q, the order parameter at a voxel is
//!
//! ```text
//! q(v) = sqrt( 4π / (2q + 1) · Σ_m c_{q,m}(v)² )
//! ```
//!
//! where the sum runs over the channels labeled with degree q. The result
//! is a rotationally invariant summary of the SH energy at that degree.

use ndarray::{Array3, ArrayView4, Axis, Zip};
use std::f64::consts::PI;

/// Compute the order parameter of degree `q` over a 4-D SH volume.
///
/// `degrees` labels each channel of the last axis (see
/// [`crate::harmonics::coefficient_labels`]). Computation is in f64; NaN
/// or infinite coefficients propagate into the affected voxels.
///
/// If no channel carries degree `q` (e.g. q = 8 on an lmax = 4 volume) the
/// selection is empty and the result is a volume of zeros. That is a
/// documented consequence of the empty selection, not an error.
pub fn order_parameter(degrees: &[u32], sh: ArrayView4<'_, f64>, q: u32) -> Array3<f64> {
    let (nx, ny, nz, nc) = sh.dim();
    debug_assert_eq!(nc, degrees.len(), "one label per coefficient channel");

    let mut sum_sq = Array3::<f64>::zeros((nx, ny, nz));
    for (channel, _) in degrees.iter().enumerate().filter(|(_, &d)| d == q) {
        let coeffs = sh.index_axis(Axis(3), channel);
        Zip::from(&mut sum_sq).and(coeffs).for_each(|acc, &c| {
            *acc += c * c;
        });
    }

    let scale = 4.0 * PI / f64::from(2 * q + 1);
    sum_sq.mapv_inplace(|s| (scale * s).sqrt());
    sum_sq
}
