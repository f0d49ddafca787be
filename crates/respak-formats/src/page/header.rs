//! Container header and page directory structures

use binrw::{BinRead, BinWrite};
use serde::Serialize;

use crate::error::{PakError, PakResult};

/// Container magic bytes
pub const PAK_MAGIC: [u8; 4] = *b"RPak";

/// Size of the fixed container header
pub const HEADER_SIZE: usize = 48;

/// Size of one page directory entry
pub const PAGE_DESCRIPTOR_SIZE: usize = 16;

/// Page flag: payload is compressed
pub const PAGE_FLAG_COMPRESSED: u32 = 0x1;

/// Container format revisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PakVersion {
    /// Version 7: 72-byte asset entries, no per-entry timestamp
    V7,
    /// Version 8: 80-byte asset entries with a creation timestamp
    V8,
}

impl PakVersion {
    /// Map the on-disk version number
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            7 => Some(Self::V7),
            8 => Some(Self::V8),
            _ => None,
        }
    }

    /// On-disk version number
    pub const fn as_raw(self) -> u16 {
        match self {
            Self::V7 => 7,
            Self::V8 => 8,
        }
    }

    /// Size of one asset directory entry for this revision
    pub const fn asset_entry_size(self) -> u32 {
        match self {
            Self::V7 => 72,
            Self::V8 => 80,
        }
    }
}

/// Fixed header at the start of every container
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite, Serialize)]
#[br(little)]
#[bw(little)]
pub struct ContainerHeader {
    /// Magic bytes (always "RPak")
    pub magic: [u8; 4],
    /// Container version
    pub version: u16,
    /// Container flags (informational)
    pub flags: u16,
    /// Creation time as a Windows FILETIME
    pub created_time: u64,
    /// Content hash (informational, not verified)
    pub content_hash: u64,
    /// Number of pages
    pub page_count: u32,
    /// Number of asset directory entries
    pub asset_count: u32,
    /// Size of one asset directory entry
    pub asset_entry_size: u32,
    /// Size of the primary stream path block
    pub stream_paths_size: u16,
    /// Size of the optional stream path block
    pub optional_stream_paths_size: u16,
    /// Container size declared by the writer
    pub declared_size: u64,
}

impl ContainerHeader {
    /// Check magic, version and entry size
    pub fn validate(&self) -> PakResult<PakVersion> {
        if self.magic != PAK_MAGIC {
            return Err(PakError::InvalidMagic(self.magic));
        }

        let version =
            PakVersion::from_raw(self.version).ok_or(PakError::UnsupportedVersion(self.version))?;

        if self.asset_entry_size != version.asset_entry_size() {
            return Err(PakError::InvalidEntrySize {
                version: self.version,
                expected: version.asset_entry_size(),
                actual: self.asset_entry_size,
            });
        }

        Ok(version)
    }
}

/// One page directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite, Serialize)]
#[br(little)]
#[bw(little)]
pub struct PageDescriptor {
    /// Size of the page once materialized
    pub uncompressed_size: u32,
    /// Size of the payload in the file when compressed
    pub stored_size: u32,
    /// Page flags
    pub flags: u32,
    /// Alignment the engine uses when placing the page in memory
    pub alignment: u32,
}

impl PageDescriptor {
    /// Whether the payload must go through the block decompressor
    pub const fn is_compressed(&self) -> bool {
        self.flags & PAGE_FLAG_COMPRESSED != 0
    }

    /// Bytes the payload occupies in the file
    pub const fn payload_size(&self) -> u32 {
        if self.is_compressed() {
            self.stored_size
        } else {
            self.uncompressed_size
        }
    }
}
