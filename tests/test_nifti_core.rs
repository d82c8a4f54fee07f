//! Tests for core NIfTI functionality: load/save round-trips, corrupt
//! input handling and transform preservation.

use ndarray::{ArrayD, ShapeBuilder};
use steinhardt::nifti::{self, NiftiImage};
use tempfile::{NamedTempFile, TempDir};

fn identity_affine() -> [[f64; 4]; 4] {
    [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// Create a test image using the library's own constructors.
fn create_test_image(data: Vec<f64>, shape: Vec<usize>) -> NiftiImage {
    let c_order = ArrayD::from_shape_vec(shape.clone(), data).unwrap();
    let mut f_order = ArrayD::zeros(ndarray::IxDyn(&shape).f());
    f_order.assign(&c_order);
    NiftiImage::from_array(f_order, identity_affine())
}

#[test]
fn test_load_invalid_magic_bytes() {
    let img = create_test_image(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2, 1]);
    let file = NamedTempFile::new().unwrap();
    nifti::save(&img, file.path()).unwrap();

    // Corrupt the magic bytes in place.
    let mut file_data = std::fs::read(file.path()).unwrap();
    file_data[344..348].copy_from_slice(b"BAD!");
    std::fs::write(file.path(), file_data).unwrap();

    let err = nifti::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("invalid NIfTI magic"));
}

#[test]
fn test_load_unsupported_data_type() {
    let img = create_test_image(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2, 1]);
    let file = NamedTempFile::new().unwrap();
    nifti::save(&img, file.path()).unwrap();

    let mut file_data = std::fs::read(file.path()).unwrap();
    file_data[70..72].copy_from_slice(&9999i16.to_le_bytes());
    std::fs::write(file.path(), file_data).unwrap();

    let err = nifti::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("unsupported data type"));
}

#[test]
fn test_load_corrupted_file() {
    let img = create_test_image(vec![0.5; 64], vec![4, 4, 4]);
    let file = NamedTempFile::new().unwrap();
    nifti::save(&img, file.path()).unwrap();

    let original = std::fs::read(file.path()).unwrap();
    std::fs::write(file.path(), &original[..original.len() / 2]).unwrap();

    assert!(nifti::load(file.path()).is_err());
}

#[test]
fn test_roundtrip_uncompressed() {
    let values: Vec<f64> = (0..24).map(|v| v as f64 * 0.125).collect();
    let img = create_test_image(values, vec![2, 3, 4]);

    let file = NamedTempFile::new().unwrap();
    nifti::save(&img, file.path()).unwrap();
    let reloaded = nifti::load(file.path()).unwrap();

    assert_eq!(reloaded.shape(), img.shape());
    assert_eq!(reloaded.data(), img.data());
    assert_eq!(reloaded.affine(), img.affine());
}

#[test]
fn test_roundtrip_gzipped() {
    let values: Vec<f64> = (0..60).map(|v| (v as f64).sin()).collect();
    let img = create_test_image(values, vec![3, 4, 5]);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("volume.nii.gz");
    nifti::save(&img, &path).unwrap();
    let reloaded = nifti::load(&path).unwrap();

    assert_eq!(reloaded.shape(), img.shape());
    assert_eq!(reloaded.data(), img.data());
    assert_eq!(reloaded.affine(), img.affine());
}

#[test]
fn test_load_header_without_decoding() {
    let img = create_test_image(vec![1.0; 120], vec![2, 3, 4, 5]);

    let dir = TempDir::new().unwrap();
    for name in ["volume.nii", "volume.nii.gz"] {
        let path = dir.path().join(name);
        nifti::save(&img, &path).unwrap();
        let header = nifti::load_header(&path).unwrap();
        assert_eq!(header.shape(), vec![2, 3, 4, 5]);
    }
}

#[test]
fn test_save_preserves_custom_affine() {
    let affine = [
        [1.5, 0.0, 0.0, -32.0],
        [0.0, 1.5, 0.0, -48.5],
        [0.0, 0.0, 2.0, -20.0],
        [0.0, 0.0, 0.0, 1.0],
    ];
    let data = ArrayD::zeros(ndarray::IxDyn(&[4, 4, 4]).f());
    let img = NiftiImage::from_array(data, affine);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("volume.nii.gz");
    nifti::save(&img, &path).unwrap();
    let reloaded = nifti::load(&path).unwrap();

    assert_eq!(reloaded.affine(), affine);
    assert_eq!(reloaded.header().pixdim[1], 1.5);
    assert_eq!(reloaded.header().pixdim[3], 2.0);
}
