//! Crate-wide error type and `Result` alias.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while reading, validating or writing volumes.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying filesystem or stream failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not carry a recognized NIfTI-1 magic string.
    #[error("invalid NIfTI magic: {0:?}")]
    InvalidMagic([u8; 4]),

    /// The header declares a voxel datatype this crate does not decode.
    #[error("unsupported data type code: {0}")]
    UnsupportedDataType(i16),

    /// Dimension counts, sizes or strides are inconsistent.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Structural problems other than dimensions (extensions, truncation).
    #[error("invalid file format: {0}")]
    InvalidFileFormat(String),

    /// A gzip stream could not be decoded.
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// The last axis does not hold a known spherical-harmonic layout.
    #[error("unsupported channel count: {0} (expected 6, 15, 28 or 45)")]
    UnsupportedChannelCount(usize),

    /// Driver-level misconfiguration (e.g. an unusable input pattern).
    #[error("configuration error: {0}")]
    Configuration(String),
}
