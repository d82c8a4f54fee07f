//! Per-file pipeline and batch driver.
//!
//! Each input file goes through validate → label → compute → write,
//! independently of every other file. Files fan out over the rayon pool;
//! a failure is logged and counted without touching the rest of the batch.

use crate::error::{Error, Result};
use crate::harmonics::{coefficient_labels, MaxDegree, TARGET_DEGREES};
use crate::nifti::{self, NiftiImage};
use crate::order::order_parameter;
use log::{debug, error};
use ndarray::{Array3, Ix4};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Where the upstream pipeline leaves normalized SH volumes.
pub const INPUT_PATTERN: &str = "normed_mifs/*.nii.gz";

/// Expand [`INPUT_PATTERN`] relative to the working directory.
pub fn discover_inputs() -> Result<Vec<PathBuf>> {
    inputs_matching(INPUT_PATTERN)
}

/// Expand a glob pattern into a sorted list of input paths.
pub fn inputs_matching(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries = glob::glob(pattern)
        .map_err(|e| Error::Configuration(format!("bad input pattern {pattern:?}: {e}")))?;

    let mut paths = Vec::new();
    for entry in entries {
        paths.push(entry.map_err(|e| Error::Io(e.into_error()))?);
    }
    paths.sort();
    Ok(paths)
}

/// Output path for degree `q`: the suffix is appended to the full input
/// path string (`a/b.nii.gz` → `a/b.nii.gzq2.nii.gz`), matching the naming
/// the downstream tooling expects.
pub fn output_path(input: &Path, q: u32) -> PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push(format!("q{q}.nii.gz"));
    PathBuf::from(name)
}

/// Run the full pipeline for one SH volume: validate the channel count,
/// label the coefficients, compute q2/q4/q6/q8 and write the four output
/// volumes next to the input.
///
/// The channel count is checked from the header alone, so an unsupported
/// file is rejected before any voxel data is decoded. All four volumes are
/// computed before the first write, so a failing file leaves no partial
/// output behind.
pub fn process_file(path: &Path) -> Result<()> {
    let header = nifti::load_header(path)?;
    let shape = header.shape();
    if shape.len() != 4 {
        return Err(Error::InvalidDimensions(format!(
            "expected a 4-D SH volume, got {}-D",
            shape.len()
        )));
    }
    let lmax = MaxDegree::from_channel_count(shape[3])?;
    debug!(
        "{}: {}x{}x{} voxels, {} channels (lmax {})",
        path.display(),
        shape[0],
        shape[1],
        shape[2],
        shape[3],
        lmax.degree()
    );

    let image = nifti::load(path)?;
    let sh = image
        .data()
        .view()
        .into_dimensionality::<Ix4>()
        .map_err(|e| Error::InvalidDimensions(e.to_string()))?;

    let (degrees, _orders) = coefficient_labels(lmax);

    let volumes: Vec<(u32, Array3<f64>)> = TARGET_DEGREES
        .iter()
        .map(|&q| (q, order_parameter(&degrees, sh, q)))
        .collect();

    for (q, volume) in volumes {
        let output = NiftiImage::scalar_like(volume, image.header());
        nifti::save(&output, output_path(path, q))?;
    }

    Ok(())
}

/// Process every file in `paths`, in parallel, isolating failures.
///
/// Returns the number of files that failed. Failures are logged; they do
/// not affect files processed before or after them.
pub fn run(paths: &[PathBuf]) -> usize {
    paths
        .par_iter()
        .filter(|path| match process_file(path) {
            Ok(()) => {
                debug!("{}: wrote q2/q4/q6/q8", path.display());
                false
            }
            Err(e) => {
                error!("{}: {e}", path.display());
                true
            }
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_appends_suffix() {
        let input = Path::new("normed_mifs/subject01.nii.gz");
        assert_eq!(
            output_path(input, 2),
            PathBuf::from("normed_mifs/subject01.nii.gzq2.nii.gz")
        );
        assert_eq!(
            output_path(input, 8),
            PathBuf::from("normed_mifs/subject01.nii.gzq8.nii.gz")
        );
    }

    #[test]
    fn test_missing_input_is_io_error() {
        let err = process_file(Path::new("no/such/volume.nii.gz")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
