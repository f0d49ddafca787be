//! Block decompression for compressed pages
//!
//! The page store only knows the [`BlockDecompressor`] contract: a compressed
//! block and the size it should expand to go in, the decompressed bytes come
//! out. Two implementations ship with the crate:
//!
//! - [`NativeDecompressor`]: the engine's native codec, bound at most once per
//!   process from a routine the caller locates
//! - [`DeflateDecompressor`]: zlib via flate2, with [`deflate::compress_block`]
//!   as the matching reference encoder
//!
//! A result shorter than the expected size is returned as-is, never padded.
//! Deciding whether a short result is acceptable is the caller's job.

pub mod deflate;
pub mod native;

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use deflate::DeflateDecompressor;
pub use native::{DecompressRoutine, NativeDecompressor};

/// Decompression failure for one block
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecompressError {
    /// The codec reported a non-positive result
    #[error("codec returned {0}")]
    CodecFailed(i64),

    /// The codec produced no output
    #[error("codec produced no output")]
    Empty,

    /// The codec rejected the input stream
    #[error("corrupt block: {0}")]
    Corrupt(String),

    /// Requested output size is above the page size limit
    #[error("expected size {size} exceeds limit of {limit} bytes")]
    TooLarge {
        /// Requested size
        size: usize,
        /// Configured limit
        limit: usize,
    },

    /// No native codec has been bound in this process
    #[error("no decompressor available")]
    Unavailable,
}

/// Result type for block decompression
pub type DecompressResult<T> = Result<T, DecompressError>;

/// Turns one compressed block into at most `expected_size` bytes
pub trait BlockDecompressor: Send + Sync {
    /// Decompress `compressed`; the result holds exactly as many bytes as the
    /// codec produced, which can be fewer than `expected_size`
    fn decompress(&self, compressed: &[u8], expected_size: usize) -> DecompressResult<Vec<u8>>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

impl fmt::Debug for dyn BlockDecompressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockDecompressor({})", self.name())
    }
}

/// Decompressor used when nothing else is configured
///
/// Every call fails with [`DecompressError::Unavailable`], so compressed pages
/// fail individually while uncompressed pages stay readable.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableDecompressor;

impl BlockDecompressor for UnavailableDecompressor {
    fn decompress(&self, _compressed: &[u8], _expected_size: usize) -> DecompressResult<Vec<u8>> {
        Err(DecompressError::Unavailable)
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

/// The native codec if one has been bound, otherwise [`UnavailableDecompressor`]
pub fn default_decompressor() -> Arc<dyn BlockDecompressor> {
    match NativeDecompressor::bound() {
        Some(native) => Arc::new(*native),
        None => Arc::new(UnavailableDecompressor),
    }
}

pub(crate) fn check_expected_size(expected_size: usize) -> DecompressResult<()> {
    if expected_size > crate::limits::MAX_PAGE_SIZE {
        return Err(DecompressError::TooLarge {
            size: expected_size,
            limit: crate::limits::MAX_PAGE_SIZE,
        });
    }
    Ok(())
}
