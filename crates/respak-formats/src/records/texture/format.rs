//! Texture pixel formats
//!
//! Format codes index a fixed table of 62 engine formats. Block compressed
//! formats use 4x4 blocks; everything else is one pixel per block.

use serde::Serialize;
use std::fmt;

/// Block geometry of one pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    /// Format name
    pub name: &'static str,
    /// Block width in pixels
    pub block_width: u32,
    /// Block height in pixels
    pub block_height: u32,
    /// Bytes per block
    pub bytes_per_block: u32,
}

const fn bc(name: &'static str, bytes_per_block: u32) -> FormatInfo {
    FormatInfo {
        name,
        block_width: 4,
        block_height: 4,
        bytes_per_block,
    }
}

const fn px(name: &'static str, bytes_per_pixel: u32) -> FormatInfo {
    FormatInfo {
        name,
        block_width: 1,
        block_height: 1,
        bytes_per_block: bytes_per_pixel,
    }
}

/// Every format, indexed by format code
pub const FORMATS: [FormatInfo; 62] = [
    bc("BC1_UNORM", 8),
    bc("BC1_UNORM_SRGB", 8),
    bc("BC2_UNORM", 16),
    bc("BC2_UNORM_SRGB", 16),
    bc("BC3_UNORM", 16),
    bc("BC3_UNORM_SRGB", 16),
    bc("BC4_UNORM", 8),
    bc("BC4_SNORM", 8),
    bc("BC5_UNORM", 16),
    bc("BC5_SNORM", 16),
    bc("BC6H_UF16", 16),
    bc("BC6H_SF16", 16),
    bc("BC7_UNORM", 16),
    bc("BC7_UNORM_SRGB", 16),
    px("R32G32B32A32_FLOAT", 16),
    px("R32G32B32A32_UINT", 16),
    px("R32G32B32A32_SINT", 16),
    px("R32G32B32_FLOAT", 12),
    px("R32G32B32_UINT", 12),
    px("R32G32B32_SINT", 12),
    px("R16G16B16A16_FLOAT", 8),
    px("R16G16B16A16_UNORM", 8),
    px("R16G16B16A16_UINT", 8),
    px("R16G16B16A16_SNORM", 8),
    px("R16G16B16A16_SINT", 8),
    px("R32G32_FLOAT", 8),
    px("R32G32_UINT", 8),
    px("R32G32_SINT", 8),
    px("R10G10B10A2_UNORM", 4),
    px("R10G10B10A2_UINT", 4),
    px("R11G11B10_FLOAT", 4),
    px("R8G8B8A8_UNORM", 4),
    px("R8G8B8A8_UNORM_SRGB", 4),
    px("R8G8B8A8_UINT", 4),
    px("R8G8B8A8_SNORM", 4),
    px("R8G8B8A8_SINT", 4),
    px("R16G16_FLOAT", 4),
    px("R16G16_UNORM", 4),
    px("R16G16_UINT", 4),
    px("R16G16_SNORM", 4),
    px("R16G16_SINT", 4),
    px("R32_FLOAT", 4),
    px("R32_UINT", 4),
    px("R32_SINT", 4),
    px("R8G8_UNORM", 2),
    px("R8G8_UINT", 2),
    px("R8G8_SNORM", 2),
    px("R8G8_SINT", 2),
    px("R16_FLOAT", 2),
    px("R16_UNORM", 2),
    px("R16_UINT", 2),
    px("R16_SNORM", 2),
    px("R16_SINT", 2),
    px("R8_UNORM", 1),
    px("R8_UINT", 1),
    px("R8_SNORM", 1),
    px("R8_SINT", 1),
    px("A8_UNORM", 1),
    px("R9G9B9E5_SHAREDEXP", 4),
    px("R10G10B10_XR_BIAS_A2_UNORM", 4),
    px("D32_FLOAT", 4),
    px("D16_UNORM", 2),
];

/// Pixel format code of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct TextureFormat(pub u16);

impl TextureFormat {
    /// Block geometry, `None` for codes outside the table
    pub fn info(self) -> Option<&'static FormatInfo> {
        FORMATS.get(self.0 as usize)
    }

    /// Whether the format uses 4x4 compressed blocks
    pub fn is_block_compressed(self) -> bool {
        self.info().is_some_and(|i| i.block_width > 1)
    }

    /// Bytes of one mip level with the given pixel size, before alignment
    pub fn level_size(self, width: u32, height: u32) -> Option<u64> {
        let info = self.info()?;
        let blocks_x = width.max(1).div_ceil(info.block_width) as u64;
        let blocks_y = height.max(1).div_ceil(info.block_height) as u64;
        Some(blocks_x * blocks_y * info.bytes_per_block as u64)
    }
}

impl fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.info() {
            Some(info) => f.write_str(info.name),
            None => write!(f, "UNKNOWN({})", self.0),
        }
    }
}

impl From<TextureFormat> for String {
    fn from(format: TextureFormat) -> Self {
        format.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        assert_eq!(TextureFormat(0).to_string(), "BC1_UNORM");
        assert_eq!(TextureFormat(13).to_string(), "BC7_UNORM_SRGB");
        assert_eq!(TextureFormat(31).to_string(), "R8G8B8A8_UNORM");
        assert_eq!(TextureFormat(61).to_string(), "D16_UNORM");
        assert_eq!(TextureFormat(62).to_string(), "UNKNOWN(62)");
    }

    #[test]
    fn test_level_sizes() {
        // 256x256 BC1: 64x64 blocks of 8 bytes
        assert_eq!(TextureFormat(0).level_size(256, 256), Some(32_768));
        // Partial blocks round up
        assert_eq!(TextureFormat(12).level_size(2, 2), Some(16));
        assert_eq!(TextureFormat(31).level_size(3, 5), Some(60));
        assert_eq!(TextureFormat(53).level_size(0, 0), Some(1));
        assert_eq!(TextureFormat(200).level_size(4, 4), None);
    }

    #[test]
    fn test_block_compression() {
        assert!((0..14).all(|code| TextureFormat(code).is_block_compressed()));
        assert!((14..62).all(|code| !TextureFormat(code).is_block_compressed()));
    }
}
