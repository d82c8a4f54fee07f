//! NIfTI-1 header parsing and representation.
//!
//! Parses the 348-byte NIfTI-1 header with automatic endianness detection
//! and writes little-endian headers. NIfTI-2 and header extensions are out
//! of scope for this crate.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// NIfTI-1 header field byte offsets.
mod offsets {
    pub const SIZEOF_HDR: usize = 0;
    pub const DIM: usize = 40;
    pub const DATATYPE: usize = 70;
    pub const BITPIX: usize = 72;
    pub const PIXDIM: usize = 76;
    pub const VOX_OFFSET: usize = 108;
    pub const SCL_SLOPE: usize = 112;
    pub const SCL_INTER: usize = 116;
    pub const XYZT_UNITS: usize = 123;
    pub const DESCRIP: usize = 148;
    pub const QFORM_CODE: usize = 252;
    pub const SFORM_CODE: usize = 254;
    pub const QUATERN_B: usize = 256;
    pub const QUATERN_C: usize = 260;
    pub const QUATERN_D: usize = 264;
    pub const QOFFSET_X: usize = 268;
    pub const QOFFSET_Y: usize = 272;
    pub const QOFFSET_Z: usize = 276;
    pub const SROW_X: usize = 280;
    pub const SROW_Y: usize = 296;
    pub const SROW_Z: usize = 312;
    pub const MAGIC: usize = 344;
}

/// NIfTI voxel datatype codes decoded by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum DataType {
    /// Unsigned 8-bit integer
    UInt8 = 2,
    /// Signed 16-bit integer
    Int16 = 4,
    /// Signed 32-bit integer
    Int32 = 8,
    /// 32-bit floating point
    Float32 = 16,
    /// 64-bit floating point
    Float64 = 64,
}

impl DataType {
    /// Parse from a NIfTI datatype code.
    pub fn from_code(code: i16) -> Result<Self> {
        match code {
            2 => Ok(Self::UInt8),
            4 => Ok(Self::Int16),
            8 => Ok(Self::Int32),
            16 => Ok(Self::Float32),
            64 => Ok(Self::Float64),
            _ => Err(Error::UnsupportedDataType(code)),
        }
    }

    /// Size of each element in bytes.
    pub const fn byte_size(self) -> usize {
        match self {
            Self::UInt8 => 1,
            Self::Int16 => 2,
            Self::Int32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }
}

/// Parsed NIfTI-1 header.
///
/// Field types mirror the on-disk NIfTI-1 layout (16-bit dims, f32
/// geometry). The spatial transform fields (qform, sform, pixdim) are
/// carried through unchanged when deriving output headers, so written
/// volumes keep the source geometry bit for bit.
#[derive(Debug, Clone)]
pub struct NiftiHeader {
    /// Number of dimensions (1-7).
    pub ndim: u8,
    /// Size along each dimension.
    pub dim: [i16; 7],
    /// Voxel datatype.
    pub datatype: DataType,
    /// qfac at index 0, voxel sizes at 1..=ndim.
    pub pixdim: [f32; 8],
    /// Data offset in the file.
    pub vox_offset: i64,
    /// Data scaling slope (0 means no scaling).
    pub scl_slope: f32,
    /// Data scaling intercept.
    pub scl_inter: f32,
    /// Raw spatial/temporal units code, carried through unchanged.
    pub xyzt_units: u8,
    /// Description string (up to 79 bytes).
    pub descrip: String,
    /// qform transform code.
    pub qform_code: i16,
    /// sform transform code.
    pub sform_code: i16,
    /// Quaternion parameters b, c, d for the qform.
    pub quatern: [f32; 3],
    /// Translation parameters for the qform.
    pub qoffset: [f32; 3],
    /// First row of the sform affine.
    pub srow_x: [f32; 4],
    /// Second row of the sform affine.
    pub srow_y: [f32; 4],
    /// Third row of the sform affine.
    pub srow_z: [f32; 4],
    /// File endianness (true = little endian).
    pub(crate) little_endian: bool,
}

impl Default for NiftiHeader {
    fn default() -> Self {
        Self {
            ndim: 3,
            dim: [1, 1, 1, 1, 1, 1, 1],
            datatype: DataType::Float32,
            pixdim: [1.0; 8],
            vox_offset: 352,
            scl_slope: 1.0,
            scl_inter: 0.0,
            xyzt_units: 2, // millimeters
            descrip: String::new(),
            qform_code: 0,
            sform_code: 1,
            quatern: [0.0; 3],
            qoffset: [0.0; 3],
            srow_x: [1.0, 0.0, 0.0, 0.0],
            srow_y: [0.0, 1.0, 0.0, 0.0],
            srow_z: [0.0, 0.0, 1.0, 0.0],
            little_endian: true,
        }
    }
}

impl NiftiHeader {
    /// Size of the NIfTI-1 header in bytes.
    pub const SIZE: usize = 348;

    /// Read a header from bytes with automatic endianness detection.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(Error::InvalidFileFormat(format!(
                "header too short: got {} bytes, need {}",
                bytes.len(),
                Self::SIZE
            )));
        }

        // sizeof_hdr doubles as the endianness probe
        let sizeof_hdr_le = LittleEndian::read_i32(&bytes[0..4]);
        let sizeof_hdr_be = BigEndian::read_i32(&bytes[0..4]);

        if sizeof_hdr_le == 348 {
            Self::parse::<LittleEndian>(bytes, true)
        } else if sizeof_hdr_be == 348 {
            Self::parse::<BigEndian>(bytes, false)
        } else {
            Err(Error::InvalidMagic([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
    }

    #[allow(clippy::wildcard_imports)]
    fn parse<E: ByteOrder>(bytes: &[u8], little_endian: bool) -> Result<Self> {
        use offsets::*;

        let magic = &bytes[MAGIC..MAGIC + 4];
        if magic != b"n+1\0" && magic != b"ni1\0" {
            return Err(Error::InvalidMagic([
                magic[0], magic[1], magic[2], magic[3],
            ]));
        }

        let ndim_raw = E::read_i16(&bytes[DIM..DIM + 2]);
        if !(1..=7).contains(&ndim_raw) {
            return Err(Error::InvalidDimensions(format!(
                "ndim must be 1..=7, got {}",
                ndim_raw
            )));
        }
        let ndim = ndim_raw as u8;

        let mut dim = [0i16; 7];
        for (i, dim_val) in dim.iter_mut().enumerate() {
            let offset = DIM + 2 + i * 2;
            *dim_val = E::read_i16(&bytes[offset..offset + 2]);
            if i < ndim as usize && *dim_val < 1 {
                return Err(Error::InvalidDimensions(format!(
                    "dimension {} must be positive, got {}",
                    i, *dim_val
                )));
            }
        }

        let datatype = DataType::from_code(E::read_i16(&bytes[DATATYPE..DATATYPE + 2]))?;
        let bitpix = E::read_i16(&bytes[BITPIX..BITPIX + 2]);
        let expected_bitpix = (datatype.byte_size() * 8) as i16;
        if bitpix != expected_bitpix {
            return Err(Error::InvalidDimensions(format!(
                "bitpix {} does not match datatype (expected {})",
                bitpix, expected_bitpix
            )));
        }

        let mut pixdim = [0.0f32; 8];
        for (i, pix_val) in pixdim.iter_mut().enumerate() {
            let offset = PIXDIM + i * 4;
            *pix_val = E::read_f32(&bytes[offset..offset + 4]);
        }

        let vox_offset_raw = E::read_f32(&bytes[VOX_OFFSET..VOX_OFFSET + 4]);
        if !vox_offset_raw.is_finite() || vox_offset_raw.fract() != 0.0 {
            return Err(Error::InvalidDimensions(format!(
                "vox_offset must be a finite integer, got {}",
                vox_offset_raw
            )));
        }

        let descrip = String::from_utf8_lossy(&bytes[DESCRIP..DESCRIP + 80])
            .trim_end_matches('\0')
            .to_string();

        let header = Self {
            ndim,
            dim,
            datatype,
            pixdim,
            vox_offset: vox_offset_raw as i64,
            scl_slope: E::read_f32(&bytes[SCL_SLOPE..SCL_SLOPE + 4]),
            scl_inter: E::read_f32(&bytes[SCL_INTER..SCL_INTER + 4]),
            xyzt_units: bytes[XYZT_UNITS],
            descrip,
            qform_code: E::read_i16(&bytes[QFORM_CODE..QFORM_CODE + 2]),
            sform_code: E::read_i16(&bytes[SFORM_CODE..SFORM_CODE + 2]),
            quatern: [
                E::read_f32(&bytes[QUATERN_B..QUATERN_B + 4]),
                E::read_f32(&bytes[QUATERN_C..QUATERN_C + 4]),
                E::read_f32(&bytes[QUATERN_D..QUATERN_D + 4]),
            ],
            qoffset: [
                E::read_f32(&bytes[QOFFSET_X..QOFFSET_X + 4]),
                E::read_f32(&bytes[QOFFSET_Y..QOFFSET_Y + 4]),
                E::read_f32(&bytes[QOFFSET_Z..QOFFSET_Z + 4]),
            ],
            srow_x: read_row::<E>(&bytes[SROW_X..SROW_X + 16]),
            srow_y: read_row::<E>(&bytes[SROW_Y..SROW_Y + 16]),
            srow_z: read_row::<E>(&bytes[SROW_Z..SROW_Z + 16]),
            little_endian,
        };

        header.validate()?;
        Ok(header)
    }

    /// Write a little-endian NIfTI-1 header.
    #[allow(clippy::wildcard_imports)]
    pub fn to_bytes(&self) -> Vec<u8> {
        use offsets::*;

        let mut buf = vec![0u8; Self::SIZE];

        LittleEndian::write_i32(&mut buf[SIZEOF_HDR..SIZEOF_HDR + 4], 348);

        LittleEndian::write_i16(&mut buf[DIM..DIM + 2], self.ndim as i16);
        for i in 0..7 {
            let offset = DIM + 2 + i * 2;
            LittleEndian::write_i16(&mut buf[offset..offset + 2], self.dim[i]);
        }

        LittleEndian::write_i16(&mut buf[DATATYPE..DATATYPE + 2], self.datatype as i16);
        LittleEndian::write_i16(
            &mut buf[BITPIX..BITPIX + 2],
            (self.datatype.byte_size() * 8) as i16,
        );

        for (i, &value) in self.pixdim.iter().enumerate() {
            let offset = PIXDIM + i * 4;
            LittleEndian::write_f32(&mut buf[offset..offset + 4], value);
        }

        LittleEndian::write_f32(&mut buf[VOX_OFFSET..VOX_OFFSET + 4], self.vox_offset as f32);
        LittleEndian::write_f32(&mut buf[SCL_SLOPE..SCL_SLOPE + 4], self.scl_slope);
        LittleEndian::write_f32(&mut buf[SCL_INTER..SCL_INTER + 4], self.scl_inter);
        buf[XYZT_UNITS] = self.xyzt_units;

        let descrip_bytes = self.descrip.as_bytes();
        let len = descrip_bytes.len().min(79);
        buf[DESCRIP..DESCRIP + len].copy_from_slice(&descrip_bytes[..len]);

        LittleEndian::write_i16(&mut buf[QFORM_CODE..QFORM_CODE + 2], self.qform_code);
        LittleEndian::write_i16(&mut buf[SFORM_CODE..SFORM_CODE + 2], self.sform_code);

        LittleEndian::write_f32(&mut buf[QUATERN_B..QUATERN_B + 4], self.quatern[0]);
        LittleEndian::write_f32(&mut buf[QUATERN_C..QUATERN_C + 4], self.quatern[1]);
        LittleEndian::write_f32(&mut buf[QUATERN_D..QUATERN_D + 4], self.quatern[2]);

        LittleEndian::write_f32(&mut buf[QOFFSET_X..QOFFSET_X + 4], self.qoffset[0]);
        LittleEndian::write_f32(&mut buf[QOFFSET_Y..QOFFSET_Y + 4], self.qoffset[1]);
        LittleEndian::write_f32(&mut buf[QOFFSET_Z..QOFFSET_Z + 4], self.qoffset[2]);

        write_row(&mut buf[SROW_X..SROW_X + 16], &self.srow_x);
        write_row(&mut buf[SROW_Y..SROW_Y + 16], &self.srow_y);
        write_row(&mut buf[SROW_Z..SROW_Z + 16], &self.srow_z);

        buf[MAGIC..MAGIC + 4].copy_from_slice(b"n+1\0");

        buf
    }

    /// The 4x4 spatial transform: sform if set, else qform, else a
    /// pixdim-scaled identity.
    pub fn affine(&self) -> [[f64; 4]; 4] {
        if self.sform_code > 0 {
            [
                row_f64(&self.srow_x),
                row_f64(&self.srow_y),
                row_f64(&self.srow_z),
                [0.0, 0.0, 0.0, 1.0],
            ]
        } else if self.qform_code > 0 {
            self.qform_to_affine()
        } else {
            [
                [f64::from(self.pixdim[1]), 0.0, 0.0, 0.0],
                [0.0, f64::from(self.pixdim[2]), 0.0, 0.0],
                [0.0, 0.0, f64::from(self.pixdim[3]), 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ]
        }
    }

    /// Set the sform from a 4x4 affine and refresh pixdim from its column
    /// norms.
    pub fn set_affine(&mut self, affine: [[f64; 4]; 4]) {
        for col in 0..4 {
            self.srow_x[col] = affine[0][col] as f32;
            self.srow_y[col] = affine[1][col] as f32;
            self.srow_z[col] = affine[2][col] as f32;
        }
        self.sform_code = 1;

        for col in 0..3 {
            let norm = (affine[0][col] * affine[0][col]
                + affine[1][col] * affine[1][col]
                + affine[2][col] * affine[2][col])
                .sqrt();
            self.pixdim[col + 1] = norm as f32;
        }
    }

    /// Convert the quaternion representation to an affine matrix.
    #[allow(clippy::many_single_char_names)]
    fn qform_to_affine(&self) -> [[f64; 4]; 4] {
        let b = f64::from(self.quatern[0]);
        let c = f64::from(self.quatern[1]);
        let d = f64::from(self.quatern[2]);
        let a = (1.0 - b * b - c * c - d * d).max(0.0).sqrt();

        let qfac = if self.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let i = f64::from(self.pixdim[1].abs());
        let j = f64::from(self.pixdim[2]);
        let k = f64::from(self.pixdim[3]) * qfac;

        [
            [
                (a * a + b * b - c * c - d * d) * i,
                2.0 * (b * c - a * d) * j,
                2.0 * (b * d + a * c) * k,
                f64::from(self.qoffset[0]),
            ],
            [
                2.0 * (b * c + a * d) * i,
                (a * a - b * b + c * c - d * d) * j,
                2.0 * (c * d - a * b) * k,
                f64::from(self.qoffset[1]),
            ],
            [
                2.0 * (b * d - a * c) * i,
                2.0 * (c * d + a * b) * j,
                (a * a - b * b - c * c + d * d) * k,
                f64::from(self.qoffset[2]),
            ],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }

    /// Image shape (up to ndim elements).
    pub fn shape(&self) -> Vec<usize> {
        self.dim[..self.ndim as usize]
            .iter()
            .map(|&d| d as usize)
            .collect()
    }

    /// Total number of voxels.
    pub fn num_voxels(&self) -> usize {
        self.dim[..self.ndim as usize]
            .iter()
            .map(|&d| d as usize)
            .product()
    }

    /// Total size of the voxel data in bytes.
    pub fn data_size(&self) -> usize {
        self.num_voxels() * self.datatype.byte_size()
    }

    /// Returns true if the file is little endian.
    pub fn is_little_endian(&self) -> bool {
        self.little_endian
    }

    /// Validate basic NIfTI invariants.
    pub fn validate(&self) -> Result<()> {
        if self.ndim == 0 || self.ndim > 7 {
            return Err(Error::InvalidDimensions(format!(
                "ndim must be 1..=7, got {}",
                self.ndim
            )));
        }

        for i in 0..self.ndim as usize {
            if self.dim[i] < 1 {
                return Err(Error::InvalidDimensions(format!(
                    "dimension {} must be positive, got {}",
                    i, self.dim[i]
                )));
            }
        }

        // Spatial spacings must be usable; higher-dimension pixdims are
        // frequently 0 in the wild and are not consulted here.
        for i in 0..(self.ndim as usize).min(3) {
            let spacing = self.pixdim[i + 1];
            if !spacing.is_finite() || spacing <= 0.0 {
                return Err(Error::InvalidDimensions(format!(
                    "pixdim[{}] must be finite and > 0, got {}",
                    i + 1,
                    spacing
                )));
            }
        }

        if self.vox_offset < Self::SIZE as i64 {
            return Err(Error::InvalidDimensions(format!(
                "vox_offset {} before header end ({})",
                self.vox_offset,
                Self::SIZE
            )));
        }

        let mut voxels: usize = 1;
        for i in 0..self.ndim as usize {
            voxels = voxels
                .checked_mul(self.dim[i] as usize)
                .ok_or_else(|| Error::InvalidDimensions("dimension product overflow".into()))?;
        }
        voxels
            .checked_mul(self.datatype.byte_size())
            .ok_or_else(|| Error::InvalidDimensions("data size overflow".into()))?;

        Ok(())
    }
}

fn read_row<E: ByteOrder>(bytes: &[u8]) -> [f32; 4] {
    [
        E::read_f32(&bytes[0..4]),
        E::read_f32(&bytes[4..8]),
        E::read_f32(&bytes[8..12]),
        E::read_f32(&bytes[12..16]),
    ]
}

fn write_row(buf: &mut [u8], row: &[f32; 4]) {
    for (i, &v) in row.iter().enumerate() {
        LittleEndian::write_f32(&mut buf[i * 4..i * 4 + 4], v);
    }
}

fn row_f64(row: &[f32; 4]) -> [f64; 4] {
    [
        f64::from(row[0]),
        f64::from(row[1]),
        f64::from(row[2]),
        f64::from(row[3]),
    ]
}
