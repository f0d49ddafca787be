//! Asset directory entry structures

use binrw::{BinRead, BinWrite};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::pointer::PagePtr;

/// Size of the entry fields shared by every container version
pub const ENTRY_BASE_SIZE: usize = 72;

/// Asset directory entry as stored on disk (without the v8 timestamp)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct RawAssetEntry {
    /// Stable 64-bit identifier
    pub guid: u64,
    /// Header blob
    pub header: PagePtr,
    /// Data blob
    pub data: PagePtr,
    /// Packed primary stream locator
    pub stream_locator: u64,
    /// Packed optional stream locator
    pub optional_stream_locator: u64,
    /// Index of the first dependent in the relation table
    pub first_dependent: u32,
    /// Index of the first dependency in the relation table
    pub first_dependency: u32,
    /// Number of assets depending on this one
    pub dependent_count: u32,
    /// Number of assets this one depends on
    pub dependency_count: u32,
    /// Size of the header blob
    pub header_size: u32,
    /// Asset format version
    pub version: u32,
    /// Type tag, four ASCII bytes packed little-endian
    pub type_tag: u32,
    /// Reserved
    pub reserved: u32,
}

/// Pack four ASCII bytes into a type tag
pub const fn tag(bytes: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*bytes)
}

/// Render a type tag as text, escaping non-printable bytes
pub fn fourcc(type_tag: u32) -> String {
    type_tag
        .to_le_bytes()
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() {
                char::from(b).to_string()
            } else {
                format!("\\x{b:02X}")
            }
        })
        .collect()
}

/// Known asset types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AssetType {
    /// `dtbl`
    DataTable,
    /// `stlt`
    SettingsLayout,
    /// `stgs`
    Settings,
    /// `txtr`
    Texture,
    /// `matl`
    Material,
    /// `mdl_`
    Model,
    /// `arig`
    AnimationRig,
    /// `aseq`
    AnimationSequence,
    /// `anir`
    AnimationRecording,
    /// `shdr`
    Shader,
    /// `shds`
    ShaderSet,
    /// `uimg`
    UiImageAtlas,
    /// `rson`
    Rson,
    /// `subt`
    Subtitles,
    /// Anything else, with the raw tag
    Other(u32),
}

impl AssetType {
    const KNOWN: [(Self, [u8; 4]); 14] = [
        (Self::DataTable, *b"dtbl"),
        (Self::SettingsLayout, *b"stlt"),
        (Self::Settings, *b"stgs"),
        (Self::Texture, *b"txtr"),
        (Self::Material, *b"matl"),
        (Self::Model, *b"mdl_"),
        (Self::AnimationRig, *b"arig"),
        (Self::AnimationSequence, *b"aseq"),
        (Self::AnimationRecording, *b"anir"),
        (Self::Shader, *b"shdr"),
        (Self::ShaderSet, *b"shds"),
        (Self::UiImageAtlas, *b"uimg"),
        (Self::Rson, *b"rson"),
        (Self::Subtitles, *b"subt"),
    ];

    /// Classify a raw type tag
    pub fn from_tag(type_tag: u32) -> Self {
        Self::KNOWN
            .iter()
            .find(|(_, bytes)| tag(bytes) == type_tag)
            .map_or(Self::Other(type_tag), |(kind, _)| *kind)
    }

    /// Raw type tag
    pub fn tag(self) -> u32 {
        match self {
            Self::Other(raw) => raw,
            known => Self::KNOWN
                .iter()
                .find(|(kind, _)| *kind == known)
                .map_or(0, |(_, bytes)| tag(bytes)),
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&fourcc(self.tag()))
    }
}

/// Structural problem found while reading one directory entry
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum DirectoryIssue {
    /// Entry bytes could not be parsed
    #[error("entry bytes unreadable")]
    Unreadable,

    /// Header pointer names a page that does not exist
    #[error("header page {page} does not exist")]
    HeaderPageMissing {
        /// Page index
        page: i32,
    },

    /// Header blob does not fit in its page
    #[error("header {offset}+{size} exceeds page {page} of {page_size} bytes")]
    HeaderOutOfBounds {
        /// Page index
        page: i32,
        /// Offset in the page
        offset: i32,
        /// Declared header size
        size: u32,
        /// Page size
        page_size: u32,
    },

    /// Data pointer names a page that does not exist
    #[error("data page {page} does not exist")]
    DataPageMissing {
        /// Page index
        page: i32,
    },

    /// Data pointer offset is outside its page
    #[error("data offset {offset} outside page {page} of {page_size} bytes")]
    DataOutOfBounds {
        /// Page index
        page: i32,
        /// Offset in the page
        offset: i32,
        /// Page size
        page_size: u32,
    },
}

/// Whether an entry's references passed the structural checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EntryValidity {
    /// All references point inside the page directory
    Valid,
    /// Kept in the catalog but marked malformed
    Invalid(DirectoryIssue),
}

impl EntryValidity {
    /// `true` for [`EntryValidity::Valid`]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// One row of the asset directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetEntry {
    /// Position in the directory
    pub index: usize,
    /// Stable 64-bit identifier
    pub guid: u64,
    /// Classified type
    pub asset_type: AssetType,
    /// Raw type tag
    pub type_tag: u32,
    /// Asset format version
    pub version: u32,
    /// Header blob
    pub header: PagePtr,
    /// Size of the header blob
    pub header_size: u32,
    /// Data blob
    pub data: PagePtr,
    /// Packed primary stream locator
    pub stream_locator: u64,
    /// Packed optional stream locator
    pub optional_stream_locator: u64,
    /// Index of the first dependent in the relation table
    pub first_dependent: u32,
    /// Index of the first dependency in the relation table
    pub first_dependency: u32,
    /// Number of assets depending on this one
    pub dependent_count: u32,
    /// Number of assets this one depends on
    pub dependency_count: u32,
    /// Creation time as a Windows FILETIME
    pub created_time: u64,
    /// Result of the structural checks
    pub validity: EntryValidity,
}

impl AssetEntry {
    pub(crate) fn from_raw(index: usize, raw: RawAssetEntry, created_time: u64) -> Self {
        Self {
            index,
            guid: raw.guid,
            asset_type: AssetType::from_tag(raw.type_tag),
            type_tag: raw.type_tag,
            version: raw.version,
            header: raw.header,
            header_size: raw.header_size,
            data: raw.data,
            stream_locator: raw.stream_locator,
            optional_stream_locator: raw.optional_stream_locator,
            first_dependent: raw.first_dependent,
            first_dependency: raw.first_dependency,
            dependent_count: raw.dependent_count,
            dependency_count: raw.dependency_count,
            created_time,
            validity: EntryValidity::Valid,
        }
    }

    pub(crate) fn unreadable(index: usize) -> Self {
        Self {
            index,
            guid: 0,
            asset_type: AssetType::Other(0),
            type_tag: 0,
            version: 0,
            header: PagePtr::NULL,
            header_size: 0,
            data: PagePtr::NULL,
            stream_locator: 0,
            optional_stream_locator: 0,
            first_dependent: 0,
            first_dependency: 0,
            dependent_count: 0,
            dependency_count: 0,
            created_time: 0,
            validity: EntryValidity::Invalid(DirectoryIssue::Unreadable),
        }
    }

    /// Type tag as text
    pub fn type_name(&self) -> String {
        fourcc(self.type_tag)
    }
}
