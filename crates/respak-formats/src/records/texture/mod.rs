//! Textures (`txtr`)
//!
//! Mip 0 is the largest level. The first `optional_streamed_mips` levels live
//! in the optional stream file, the next `streamed_mips` in the primary stream
//! file, and the remaining permanent levels are resident in the asset's data
//! blob, concatenated largest first.

mod format;

pub use format::{FORMATS, FormatInfo, TextureFormat};

use binrw::{BinRead, BinWrite};
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, warn};

use super::{DecodeContext, DecodeError, DecodeResult, unsupported};
use crate::directory::AssetEntry;
use crate::limits::MAX_MIP_LEVELS;
use crate::page::PageStore;
use crate::pointer::PagePtr;
use crate::reader;
use crate::stream::{StreamCategory, StreamSet, StreamUnit};

/// Size of a texture header
pub const TEXTURE_HEADER_SIZE: usize = 56;

/// Every mip level starts on this boundary
pub const MIP_ALIGNMENT: u64 = 16;

/// Texture header, shared by versions 8 to 10
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct TextureHeader {
    /// GUID repeated from the directory
    pub guid: u64,
    /// Texture name
    pub name: PagePtr,
    /// Width of mip 0
    pub width: u16,
    /// Height of mip 0
    pub height: u16,
    /// Depth
    pub depth: u16,
    /// Format code
    pub format: u16,
    /// Bytes of resident data
    pub data_size: u32,
    /// Texture flags
    pub flags: u8,
    /// Levels in the optional stream file
    pub optional_streamed_mips: u8,
    /// Array slices
    pub array_size: u8,
    /// Layer count
    pub layer_count: u8,
    /// Usage hint
    pub usage: u8,
    /// Levels resident in the data blob
    pub permanent_mips: u8,
    /// Levels in the primary stream file
    pub streamed_mips: u8,
    /// Unused
    pub reserved: [u8; 21],
}

/// Where a mip level is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MipLocation {
    /// In the data blob at this offset
    Resident {
        /// Offset from the start of the data blob
        offset: u64,
    },
    /// In a stream file
    Streamed(StreamCategory),
}

/// One mip level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MipInfo {
    /// Level, 0 is the largest
    pub level: usize,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bytes including alignment padding
    pub size: u64,
    /// Storage location
    pub location: MipLocation,
}

/// A decoded texture
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Texture {
    /// Asset GUID
    pub guid: u64,
    /// Texture name, when it resolves
    pub name: Option<String>,
    /// Width of mip 0
    pub width: u16,
    /// Height of mip 0
    pub height: u16,
    /// Depth
    pub depth: u16,
    /// Pixel format
    pub format: TextureFormat,
    /// Bytes of resident data
    pub data_size: u32,
    /// Texture flags
    pub flags: u8,
    /// Array slices
    pub array_size: u8,
    /// Layer count
    pub layer_count: u8,
    /// Usage hint
    pub usage: u8,
    /// Levels in the optional stream file
    pub optional_streamed_mips: u8,
    /// Levels in the primary stream file
    pub streamed_mips: u8,
    /// Levels resident in the data blob
    pub permanent_mips: u8,
    /// Mip levels, largest first; empty when the format is unknown
    pub mips: Vec<MipInfo>,
    /// Data blob holding the resident levels
    pub data: PagePtr,
    /// Packed primary stream locator
    pub stream_locator: u64,
    /// Packed optional stream locator
    pub optional_stream_locator: u64,
}

fn align(size: u64) -> u64 {
    size.div_ceil(MIP_ALIGNMENT) * MIP_ALIGNMENT
}

impl Texture {
    fn from_header(
        entry: &AssetEntry,
        header: &TextureHeader,
        name: Option<String>,
    ) -> DecodeResult<Self> {
        let total = header.optional_streamed_mips as usize
            + header.streamed_mips as usize
            + header.permanent_mips as usize;
        if total > MAX_MIP_LEVELS {
            return Err(DecodeError::Malformed(format!(
                "{total} mip levels declared, at most {MAX_MIP_LEVELS} supported"
            )));
        }

        let format = TextureFormat(header.format);
        let optional = header.optional_streamed_mips as usize;
        let streamed = optional + header.streamed_mips as usize;
        let slices = u64::from(header.array_size.max(1));

        let mut mips = Vec::with_capacity(total);
        let mut resident_offset = 0u64;
        for level in 0..total {
            let width = (u32::from(header.width) >> level).max(1);
            let height = (u32::from(header.height) >> level).max(1);
            let Some(bytes) = format.level_size(width, height) else {
                warn!(
                    "texture {:016X} has unknown format {}, mip table omitted",
                    entry.guid, header.format
                );
                mips.clear();
                break;
            };
            let size = align(bytes * slices);
            let location = if level < optional {
                MipLocation::Streamed(StreamCategory::Optional)
            } else if level < streamed {
                MipLocation::Streamed(StreamCategory::Primary)
            } else {
                let offset = resident_offset;
                resident_offset += size;
                MipLocation::Resident { offset }
            };
            mips.push(MipInfo {
                level,
                width,
                height,
                size,
                location,
            });
        }

        if !mips.is_empty() && resident_offset != u64::from(header.data_size) {
            debug!(
                "texture {:016X}: resident mips need {resident_offset} bytes, header says {}",
                entry.guid, header.data_size
            );
        }

        Ok(Self {
            guid: entry.guid,
            name,
            width: header.width,
            height: header.height,
            depth: header.depth,
            format,
            data_size: header.data_size,
            flags: header.flags,
            array_size: header.array_size,
            layer_count: header.layer_count,
            usage: header.usage,
            optional_streamed_mips: header.optional_streamed_mips,
            streamed_mips: header.streamed_mips,
            permanent_mips: header.permanent_mips,
            mips,
            data: entry.data,
            stream_locator: entry.stream_locator,
            optional_stream_locator: entry.optional_stream_locator,
        })
    }

    /// Mip level `level`
    pub fn mip(&self, level: usize) -> Option<&MipInfo> {
        self.mips.get(level)
    }

    /// Unit table for the stream resolver, one unit per streamed level
    pub fn stream_units(&self) -> Vec<StreamUnit> {
        self.mips
            .iter()
            .filter_map(|mip| match mip.location {
                MipLocation::Streamed(category) => Some(StreamUnit {
                    size: mip.size,
                    category,
                }),
                MipLocation::Resident { .. } => None,
            })
            .collect()
    }

    fn unavailable(level: usize, reason: impl Into<String>) -> DecodeError {
        DecodeError::MipUnavailable {
            level,
            reason: reason.into(),
        }
    }

    /// Bytes of a resident mip level
    pub fn resident_mip(&self, store: &PageStore, level: usize) -> DecodeResult<Bytes> {
        let mip = self
            .mip(level)
            .ok_or_else(|| Self::unavailable(level, "no such level"))?;
        let MipLocation::Resident { offset } = mip.location else {
            return Err(Self::unavailable(level, "level is streamed"));
        };
        let data = store
            .resolve(self.data)
            .ok_or(DecodeError::MissingSection("texture data"))?;
        let start = offset as usize;
        let len = mip.size as usize;
        reader::slice(&data, start, len)
            .map_err(|e| Self::unavailable(level, e.to_string()))?;
        Ok(data.slice(start..start + len))
    }

    /// Bytes of any mip level, reading streamed levels through `streams`
    ///
    /// Streamed levels that cannot be read come back zero-filled.
    pub fn load_mip(
        &self,
        store: &PageStore,
        streams: &StreamSet,
        level: usize,
    ) -> DecodeResult<Bytes> {
        let mip = self
            .mip(level)
            .ok_or_else(|| Self::unavailable(level, "no such level"))?;
        match mip.location {
            MipLocation::Resident { .. } => self.resident_mip(store, level),
            MipLocation::Streamed(category) => {
                let base = match category {
                    StreamCategory::Primary => self.stream_locator,
                    StreamCategory::Optional => self.optional_stream_locator,
                };
                // Streamed levels come first, so the level is the unit index
                streams
                    .resolve_unit(base, level, &self.stream_units())
                    .map_err(|e| Self::unavailable(level, e.to_string()))
            }
        }
    }
}

/// Decode a `txtr` asset
pub fn decode(ctx: &DecodeContext<'_>, entry: &AssetEntry) -> DecodeResult<Texture> {
    if !(8..=10).contains(&entry.version) {
        return Err(unsupported(entry));
    }
    let bytes = ctx.header(entry)?;
    let header = reader::read_struct::<TextureHeader>(&bytes, 0)?;
    let name = ctx
        .store
        .resolve(header.name)
        .and_then(|tail| reader::read_cstring(&tail, 0).ok());
    Texture::from_header(entry, &header, name)
}
