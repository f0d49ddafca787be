//! zlib block codec
//!
//! Used for containers repacked with zlib pages and as the reference encoder
//! when checking the decompression contract.

use flate2::Compression;
use flate2::read::{ZlibDecoder, ZlibEncoder};
use std::io::Read;

use super::{BlockDecompressor, DecompressError, DecompressResult, check_expected_size};

/// zlib implementation of [`BlockDecompressor`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DeflateDecompressor;

impl BlockDecompressor for DeflateDecompressor {
    fn decompress(&self, compressed: &[u8], expected_size: usize) -> DecompressResult<Vec<u8>> {
        check_expected_size(expected_size)?;

        // Never produce more than the caller asked for
        let mut decoder = ZlibDecoder::new(compressed).take(expected_size as u64);
        let mut out = Vec::with_capacity(expected_size);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| DecompressError::Corrupt(format!("zlib decompression failed: {e}")))?;

        if out.is_empty() && expected_size > 0 {
            return Err(DecompressError::Empty);
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "zlib"
    }
}

/// Compress a block with zlib at the default level
pub fn compress_block(data: &[u8]) -> DecompressResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(data, Compression::default());
    let mut compressed = Vec::new();
    encoder
        .read_to_end(&mut compressed)
        .map_err(|e| DecompressError::Corrupt(format!("zlib compression failed: {e}")))?;
    Ok(compressed)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_round_trip() {
        let data = b"page payload page payload page payload".repeat(16);
        let compressed = compress_block(&data).unwrap();
        assert!(compressed.len() < data.len());

        let decompressed = DeflateDecompressor
            .decompress(&compressed, data.len())
            .unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_short_output_is_not_padded() {
        let data = vec![7u8; 100];
        let compressed = compress_block(&data).unwrap();

        let decompressed = DeflateDecompressor.decompress(&compressed, 400).unwrap();
        assert_eq!(decompressed.len(), 100);
    }

    #[test]
    fn test_output_capped_at_expected_size() {
        let data = vec![7u8; 100];
        let compressed = compress_block(&data).unwrap();

        let decompressed = DeflateDecompressor.decompress(&compressed, 40).unwrap();
        assert_eq!(decompressed, vec![7u8; 40]);
    }

    #[test]
    fn test_garbage_input_fails() {
        let result = DeflateDecompressor.decompress(&[0xDE, 0xAD, 0xBE, 0xEF], 64);
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn round_trip_any_block(data in prop::collection::vec(any::<u8>(), 1..4096)) {
            let compressed = compress_block(&data).unwrap();
            let decompressed = DeflateDecompressor.decompress(&compressed, data.len()).unwrap();
            prop_assert_eq!(decompressed, data);
        }
    }
}
