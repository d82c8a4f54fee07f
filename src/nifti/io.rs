//! NIfTI file reading and writing.
//!
//! Uncompressed `.nii` files are memory-mapped; `.nii.gz` files are
//! decompressed single-shot with libdeflate (sized from the gzip ISIZE
//! trailer) with a streaming flate2 fallback for multi-member or oversized
//! payloads.

use super::header::NiftiHeader;
use super::image::{decode_voxels, NiftiImage};
use crate::error::{Error, Result};
use flate2::bufread::{GzDecoder, MultiGzDecoder};
use libdeflater::{CompressionLvl, Compressor, DecompressionError, Decompressor};
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const GZIP_BUFFER_SIZE: usize = 256 * 1024;

fn is_gzipped(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "gz")
}

fn estimate_gzip_uncompressed_size(compressed: &[u8]) -> usize {
    // ISIZE per RFC 1952: "original input size modulo 2^32".
    // Only reliable for single-member gzip < 4GB.
    if compressed.len() >= 4 {
        let trailer = &compressed[compressed.len() - 4..];
        u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]) as usize
    } else {
        compressed.len() * 4
    }
}

fn decompress_gzip_streaming(compressed: &[u8]) -> Result<Vec<u8>> {
    let cursor = std::io::Cursor::new(compressed);
    let mut decoder = MultiGzDecoder::new(BufReader::with_capacity(GZIP_BUFFER_SIZE, cursor));

    let estimated = estimate_gzip_uncompressed_size(compressed);
    let mut output = Vec::with_capacity(estimated);

    decoder
        .read_to_end(&mut output)
        .map_err(|e| Error::Decompression(format!("gzip stream decode failed: {e}")))?;
    Ok(output)
}

/// Single-shot decompression via libdeflate, falling back to streaming
/// decode when the ISIZE estimate is insufficient (multi-member gzip or
/// payloads > 4GB).
fn decompress_gzip(compressed: &[u8]) -> Result<Vec<u8>> {
    let estimated = estimate_gzip_uncompressed_size(compressed).max(NiftiHeader::SIZE);
    let mut output = vec![0u8; estimated];

    let mut decompressor = Decompressor::new();
    match decompressor.gzip_decompress(compressed, &mut output) {
        Ok(written) => {
            output.truncate(written);
            Ok(output)
        }
        Err(DecompressionError::InsufficientSpace) => decompress_gzip_streaming(compressed),
        Err(e) => Err(Error::Decompression(format!("{}", e))),
    }
}

fn ensure_no_extensions(bytes: &[u8], header: &NiftiHeader) -> Result<()> {
    let vox_offset = header.vox_offset as usize;
    if vox_offset >= NiftiHeader::SIZE + 4 && bytes.len() >= NiftiHeader::SIZE + 4 {
        let extension_flag = bytes[NiftiHeader::SIZE];
        if extension_flag != 0 {
            return Err(Error::InvalidFileFormat(
                "NIfTI extensions are not supported".to_string(),
            ));
        }
    }
    Ok(())
}

fn parse_nifti_bytes(bytes: &[u8]) -> Result<NiftiImage> {
    let header = NiftiHeader::from_bytes(bytes)?;
    ensure_no_extensions(bytes, &header)?;

    let offset = header.vox_offset as usize;
    if bytes.len() < offset {
        return Err(Error::InvalidFileFormat(format!(
            "file truncated before voxel data: {} bytes, vox_offset {}",
            bytes.len(),
            offset
        )));
    }

    let data = decode_voxels(&header, &bytes[offset..])?;
    Ok(NiftiImage::from_parts(header, data))
}

/// Load a NIfTI image from file.
///
/// Supports `.nii` and `.nii.gz`, chosen by extension.
pub fn load<P: AsRef<Path>>(path: P) -> Result<NiftiImage> {
    let path = path.as_ref();
    if is_gzipped(path) {
        load_gzipped(path)
    } else {
        load_uncompressed(path)
    }
}

#[allow(unsafe_code)]
fn load_uncompressed(path: &Path) -> Result<NiftiImage> {
    let file = File::open(path)?;
    // SAFETY: the mapping is read-only and dropped before this function
    // returns; external modification could yield stale data but no UB.
    let mmap = unsafe { Mmap::map(&file)? };
    parse_nifti_bytes(&mmap)
}

fn load_gzipped(path: &Path) -> Result<NiftiImage> {
    let compressed = std::fs::read(path)?;
    let decompressed = decompress_gzip(&compressed)?;

    match parse_nifti_bytes(&decompressed) {
        Ok(image) => Ok(image),
        // The ISIZE shortcut can come up short for unusual streams; retry
        // with the streaming decoder before giving up.
        Err(Error::InvalidFileFormat(_)) => {
            let decompressed = decompress_gzip_streaming(&compressed)?;
            parse_nifti_bytes(&decompressed)
        }
        Err(e) => Err(e),
    }
}

/// Load only the header (fast metadata inspection, no voxel decode).
#[allow(unsafe_code)]
pub fn load_header<P: AsRef<Path>>(path: P) -> Result<NiftiHeader> {
    let path = path.as_ref();

    if is_gzipped(path) {
        let file = File::open(path)?;
        let mut decoder = GzDecoder::new(BufReader::new(file));
        let mut header_buf = vec![0u8; NiftiHeader::SIZE];
        decoder.read_exact(&mut header_buf)?;
        NiftiHeader::from_bytes(&header_buf)
    } else {
        let file = File::open(path)?;
        // SAFETY: read-only mapping, dropped on return.
        let mmap = unsafe { Mmap::map(&file)? };
        NiftiHeader::from_bytes(&mmap)
    }
}

/// Save a NIfTI image to file.
///
/// Format is determined by extension (`.nii` or `.nii.gz`).
pub fn save<P: AsRef<Path>>(image: &NiftiImage, path: P) -> Result<()> {
    image.header().validate()?;

    let path = path.as_ref();
    if is_gzipped(path) {
        save_gzipped(image, path)
    } else {
        save_uncompressed(image, path)
    }
}

fn assemble_file_bytes(image: &NiftiImage) -> Result<Vec<u8>> {
    let header_bytes = image.header().to_bytes();
    let padding = image.header().vox_offset as usize - NiftiHeader::SIZE;
    let data = image.data_to_bytes()?;

    let mut bytes = Vec::with_capacity(header_bytes.len() + padding + data.len());
    bytes.extend_from_slice(&header_bytes);
    bytes.resize(bytes.len() + padding, 0u8);
    bytes.extend_from_slice(&data);
    Ok(bytes)
}

fn save_uncompressed(image: &NiftiImage, path: &Path) -> Result<()> {
    let bytes = assemble_file_bytes(image)?;
    let file = File::create(path)?;
    let mut writer = BufWriter::with_capacity(1024 * 1024, file);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

fn save_gzipped(image: &NiftiImage, path: &Path) -> Result<()> {
    let uncompressed = assemble_file_bytes(image)?;

    // Level 1 trades a few percent of ratio for much faster writes.
    let mut compressor = Compressor::new(CompressionLvl::fastest());
    let max_compressed_size = compressor.gzip_compress_bound(uncompressed.len());
    let mut compressed = vec![0u8; max_compressed_size];

    let actual_size = compressor
        .gzip_compress(&uncompressed, &mut compressed)
        .map_err(|e| Error::Io(std::io::Error::other(format!("compression failed: {e:?}"))))?;
    compressed.truncate(actual_size);

    let mut file = File::create(path)?;
    file.write_all(&compressed)?;
    Ok(())
}
