//! In-memory NIfTI image: header plus voxel data decoded to f64.
//!
//! Voxels are held in F-order (column-major), matching the on-disk NIfTI
//! layout, and are decoded eagerly at load time with `scl_slope` /
//! `scl_inter` rescaling applied.

use super::header::{DataType, NiftiHeader};
use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use ndarray::{Array3, ArrayD, IxDyn, ShapeBuilder};

/// A volumetric image: parsed header and f64 voxel array.
#[derive(Debug, Clone)]
pub struct NiftiImage {
    header: NiftiHeader,
    data: ArrayD<f64>,
}

impl NiftiImage {
    /// Build an image from an array and a spatial affine.
    ///
    /// The array is stored in F-order; the header gets the array's shape,
    /// an f64 datatype and an sform set from `affine`.
    pub fn from_array(data: ArrayD<f64>, affine: [[f64; 4]; 4]) -> Self {
        let mut header = NiftiHeader::default();
        header.ndim = data.ndim() as u8;
        header.dim = [1; 7];
        for (i, &d) in data.shape().iter().enumerate().take(7) {
            header.dim[i] = i16::try_from(d).unwrap_or(-1);
        }
        header.datatype = DataType::Float64;
        header.scl_slope = 1.0;
        header.scl_inter = 0.0;
        header.set_affine(affine);

        Self {
            header,
            data: to_f_order(&data),
        }
    }

    /// Build a 3-D scalar image that inherits the spatial transform of
    /// `reference` (sform, qform, pixdim and units carried unchanged).
    pub fn scalar_like(data: Array3<f64>, reference: &NiftiHeader) -> Self {
        let mut header = reference.clone();
        header.ndim = 3;
        header.dim = [1; 7];
        for (i, &d) in data.shape().iter().enumerate() {
            header.dim[i] = i16::try_from(d).unwrap_or(-1);
        }
        header.datatype = DataType::Float64;
        header.vox_offset = 352;
        header.scl_slope = 1.0;
        header.scl_inter = 0.0;
        header.little_endian = true;

        Self {
            header,
            data: to_f_order(&data.into_dyn()),
        }
    }

    pub(crate) fn from_parts(header: NiftiHeader, data: ArrayD<f64>) -> Self {
        Self { header, data }
    }

    /// The parsed header.
    pub fn header(&self) -> &NiftiHeader {
        &self.header
    }

    /// Voxel data, F-order, rescaled to f64.
    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    /// Image shape.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// The spatial transform of this image.
    pub fn affine(&self) -> [[f64; 4]; 4] {
        self.header.affine()
    }

    /// Encode the voxel data for writing, F-order, little endian, in the
    /// header's datatype.
    pub(crate) fn data_to_bytes(&self) -> Result<Vec<u8>> {
        if self.data.len() != self.header.num_voxels() {
            return Err(Error::InvalidDimensions(format!(
                "array holds {} voxels but header declares {}",
                self.data.len(),
                self.header.num_voxels()
            )));
        }

        let values = f_order_values(&self.data);
        Ok(encode_voxels(self.header.datatype, &values))
    }
}

/// Decode raw voxel bytes into an f64 array shaped per `header`.
///
/// Applies `scl_slope` / `scl_inter` when the header carries a usable
/// nonzero slope, matching the behavior of the common neuroimaging readers
/// the upstream pipeline relies on.
pub(crate) fn decode_voxels(header: &NiftiHeader, bytes: &[u8]) -> Result<ArrayD<f64>> {
    let expected = header.data_size();
    if bytes.len() < expected {
        return Err(Error::InvalidFileFormat(format!(
            "voxel data truncated: got {} bytes, need {}",
            bytes.len(),
            expected
        )));
    }
    let bytes = &bytes[..expected];

    let mut values = if header.is_little_endian() {
        decode_values::<LittleEndian>(header.datatype, bytes)
    } else {
        decode_values::<BigEndian>(header.datatype, bytes)
    };

    let slope = header.scl_slope;
    let inter = header.scl_inter;
    if slope != 0.0 && slope.is_finite() && (slope != 1.0 || inter != 0.0) {
        let (slope, inter) = (f64::from(slope), f64::from(inter));
        for v in &mut values {
            *v = *v * slope + inter;
        }
    }

    let shape = header.shape();
    ArrayD::from_shape_vec(IxDyn(&shape).f(), values)
        .map_err(|e| Error::InvalidDimensions(e.to_string()))
}

fn decode_values<E: ByteOrder>(datatype: DataType, bytes: &[u8]) -> Vec<f64> {
    match datatype {
        DataType::UInt8 => bytes.iter().map(|&b| f64::from(b)).collect(),
        DataType::Int16 => bytes
            .chunks_exact(2)
            .map(|c| f64::from(E::read_i16(c)))
            .collect(),
        DataType::Int32 => bytes
            .chunks_exact(4)
            .map(|c| f64::from(E::read_i32(c)))
            .collect(),
        DataType::Float32 => bytes
            .chunks_exact(4)
            .map(|c| f64::from(E::read_f32(c)))
            .collect(),
        DataType::Float64 => bytes.chunks_exact(8).map(E::read_f64).collect(),
    }
}

fn encode_voxels(datatype: DataType, values: &[f64]) -> Vec<u8> {
    let mut buf = vec![0u8; values.len() * datatype.byte_size()];
    match datatype {
        DataType::UInt8 => {
            for (slot, &v) in buf.iter_mut().zip(values) {
                *slot = v as u8;
            }
        }
        DataType::Int16 => {
            for (chunk, &v) in buf.chunks_exact_mut(2).zip(values) {
                LittleEndian::write_i16(chunk, v as i16);
            }
        }
        DataType::Int32 => {
            for (chunk, &v) in buf.chunks_exact_mut(4).zip(values) {
                LittleEndian::write_i32(chunk, v as i32);
            }
        }
        DataType::Float32 => {
            for (chunk, &v) in buf.chunks_exact_mut(4).zip(values) {
                LittleEndian::write_f32(chunk, v as f32);
            }
        }
        DataType::Float64 => {
            for (chunk, &v) in buf.chunks_exact_mut(8).zip(values) {
                LittleEndian::write_f64(chunk, v);
            }
        }
    }
    buf
}

fn to_f_order(data: &ArrayD<f64>) -> ArrayD<f64> {
    let mut f_order = ArrayD::zeros(data.raw_dim().f());
    f_order.assign(data);
    f_order
}

fn f_order_values(data: &ArrayD<f64>) -> Vec<f64> {
    let mut f_order = ArrayD::zeros(data.raw_dim().f());
    f_order.assign(data);
    let (values, _offset) = f_order.into_raw_vec_and_offset();
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn test_from_array_sets_dims_and_affine() {
        let data = Array4::<f64>::zeros((2, 3, 4, 6)).into_dyn();
        let affine = [
            [1.5, 0.0, 0.0, -10.0],
            [0.0, 1.5, 0.0, -20.0],
            [0.0, 0.0, 1.5, -30.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let img = NiftiImage::from_array(data, affine);
        assert_eq!(img.header().ndim, 4);
        assert_eq!(img.header().dim[..4], [2, 3, 4, 6]);
        assert_eq!(img.header().datatype, DataType::Float64);
        assert_eq!(img.affine(), affine);
    }

    #[test]
    fn test_scalar_like_inherits_transform() {
        let mut reference = NiftiHeader::default();
        reference.ndim = 4;
        reference.dim = [4, 4, 4, 15, 1, 1, 1];
        reference.srow_x = [2.0, 0.0, 0.0, -8.0];
        reference.qform_code = 1;
        reference.quatern = [0.1, 0.2, 0.3];

        let img = NiftiImage::scalar_like(Array3::zeros((4, 4, 4)), &reference);
        assert_eq!(img.header().ndim, 3);
        assert_eq!(img.header().dim[..4], [4, 4, 4, 1]);
        assert_eq!(img.header().srow_x, reference.srow_x);
        assert_eq!(img.header().quatern, reference.quatern);
        assert_eq!(img.header().datatype, DataType::Float64);
    }

    #[test]
    fn test_decode_applies_slope_and_intercept() {
        let mut header = NiftiHeader::default();
        header.ndim = 1;
        header.dim = [3, 1, 1, 1, 1, 1, 1];
        header.datatype = DataType::Int16;
        header.scl_slope = 0.5;
        header.scl_inter = 10.0;

        let mut bytes = vec![0u8; 6];
        LittleEndian::write_i16(&mut bytes[0..2], 2);
        LittleEndian::write_i16(&mut bytes[2..4], 4);
        LittleEndian::write_i16(&mut bytes[4..6], -6);

        let decoded = decode_voxels(&header, &bytes).unwrap();
        let values: Vec<f64> = decoded.iter().copied().collect();
        assert_eq!(values, vec![11.0, 12.0, 7.0]);
    }

    #[test]
    fn test_decode_zero_slope_means_unscaled() {
        let mut header = NiftiHeader::default();
        header.ndim = 1;
        header.dim = [2, 1, 1, 1, 1, 1, 1];
        header.datatype = DataType::UInt8;
        header.scl_slope = 0.0;
        header.scl_inter = 100.0;

        let decoded = decode_voxels(&header, &[3, 7]).unwrap();
        let values: Vec<f64> = decoded.iter().copied().collect();
        assert_eq!(values, vec![3.0, 7.0]);
    }

    #[test]
    fn test_decode_big_endian_values() {
        let mut header = NiftiHeader::default();
        header.ndim = 1;
        header.dim = [2, 1, 1, 1, 1, 1, 1];
        header.datatype = DataType::Float32;
        header.little_endian = false;

        let mut bytes = vec![0u8; 8];
        BigEndian::write_f32(&mut bytes[0..4], 1.5);
        BigEndian::write_f32(&mut bytes[4..8], -2.5);

        let decoded = decode_voxels(&header, &bytes).unwrap();
        let values: Vec<f64> = decoded.iter().copied().collect();
        assert_eq!(values, vec![1.5, -2.5]);
    }

    #[test]
    fn test_decode_truncated_data_rejected() {
        let mut header = NiftiHeader::default();
        header.ndim = 3;
        header.dim = [4, 4, 4, 1, 1, 1, 1];
        header.datatype = DataType::Float64;

        let err = decode_voxels(&header, &[0u8; 16]).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_data_roundtrip_through_bytes() {
        let data = Array4::from_shape_fn((2, 2, 2, 3), |(x, y, z, c)| {
            (x + 2 * y + 4 * z + 8 * c) as f64 * 0.25
        })
        .into_dyn();
        let img = NiftiImage::from_array(data.clone(), identity_affine());

        let bytes = img.data_to_bytes().unwrap();
        let decoded = decode_voxels(img.header(), &bytes).unwrap();
        assert_eq!(decoded, data);
    }

    fn identity_affine() -> [[f64; 4]; 4] {
        [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }
}
