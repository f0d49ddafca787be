//! Container-level error types
//!
//! These are the only errors that abort opening a pak. Per-page, per-entry and
//! per-field problems have their own types in the modules that produce them.

use thiserror::Error;

/// Fatal error while opening a container
#[derive(Debug, Error)]
pub enum PakError {
    /// Invalid container magic bytes
    #[error("invalid container magic: expected \"RPak\", got {0:02X?}")]
    InvalidMagic([u8; 4]),

    /// Container version this crate cannot read
    #[error("unsupported container version {0} (supported: 7, 8)")]
    UnsupportedVersion(u16),

    /// Asset entry size does not match the container version
    #[error("invalid asset entry size {actual} for container version {version} (expected {expected})")]
    InvalidEntrySize {
        /// Container version
        version: u16,
        /// Size the version requires
        expected: u32,
        /// Size found in the header
        actual: u32,
    },

    /// A fixed region of the container runs past the end of the file
    #[error("container truncated: {region} needs {needed} bytes at offset {offset}, file has {available}")]
    Truncated {
        /// Name of the region being read
        region: &'static str,
        /// Start of the region
        offset: usize,
        /// Bytes the region needs
        needed: usize,
        /// Bytes available in the file
        available: usize,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for container operations
pub type PakResult<T> = Result<T, PakError>;
