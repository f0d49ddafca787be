//! Versioned record decoders
//!
//! Each asset type has its own module. Layouts are selected by the entry's
//! declared version and, for data tables, by its creation timestamp. Types
//! without a decoder come back as [`DecodedRecord::Opaque`].

pub mod datatable;
pub mod settings;
pub mod settings_layout;
pub mod texture;

pub use datatable::{ColumnLayout, ColumnType, DataTable, DataTableColumn, DataTableValue};
pub use settings::{Settings, SettingsEntry, SettingsValue};
pub use settings_layout::{SettingsField, SettingsFieldType, SettingsLayout};
pub use texture::{MipInfo, MipLocation, Texture, TextureFormat};

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::DecodeLimits;
use crate::directory::{AssetCatalog, AssetEntry, AssetType, DirectoryIssue, EntryValidity};
use crate::page::PageStore;
use crate::reader::ReadError;

/// Why an asset could not be decoded
///
/// The asset stays in the catalog; callers show it as present but
/// unparseable and attach this error as the reason.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// Header pointer is null or does not resolve
    #[error("no header data")]
    MissingHeader,

    /// Directory checks already rejected the entry
    #[error("entry is malformed: {0}")]
    InvalidEntry(DirectoryIssue),

    /// Layout version this crate does not know
    #[error("unsupported {asset_type} version {version}")]
    UnsupportedVersion {
        /// Asset type
        asset_type: AssetType,
        /// Declared version
        version: u32,
    },

    /// A pointer the layout cannot do without is null or dangling
    #[error("missing {0}")]
    MissingSection(&'static str),

    /// A referenced asset is not in the container
    #[error("asset {0:016X} not found")]
    UnknownAsset(u64),

    /// A referenced asset has the wrong type
    #[error("asset {guid:016X} is {actual}, expected {expected}")]
    WrongType {
        /// Referenced asset
        guid: u64,
        /// Type required by the reference
        expected: AssetType,
        /// Type found in the directory
        actual: AssetType,
    },

    /// A texture mip level cannot be produced
    #[error("mip {level} unavailable: {reason}")]
    MipUnavailable {
        /// Requested level
        level: usize,
        /// What went wrong
        reason: String,
    },

    /// A fixed part of the record is unreadable
    #[error("malformed record: {0}")]
    Read(#[from] ReadError),

    /// The record is self-inconsistent
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Result type for record decoding
pub type DecodeResult<T> = Result<T, DecodeError>;

/// A decoded asset
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodedRecord {
    /// `dtbl`
    DataTable(DataTable),
    /// `stlt`
    SettingsLayout(SettingsLayout),
    /// `stgs`
    Settings(Settings),
    /// `txtr`
    Texture(Texture),
    /// Any other type; the header blob is exposed as is
    Opaque {
        /// Asset type
        asset_type: AssetType,
        /// Declared version
        version: u32,
        /// Header blob
        header: Bytes,
    },
}

impl DecodedRecord {
    /// Short name of the record kind
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DataTable(_) => "datatable",
            Self::SettingsLayout(_) => "settings_layout",
            Self::Settings(_) => "settings",
            Self::Texture(_) => "texture",
            Self::Opaque { .. } => "opaque",
        }
    }
}

/// Everything a decoder may consult besides the entry itself
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'a> {
    /// Pages of the container
    pub store: &'a PageStore,
    /// Directory, for cross-asset references
    pub catalog: &'a AssetCatalog,
    /// Caps on decoded collections
    pub limits: DecodeLimits,
}

impl<'a> DecodeContext<'a> {
    /// Bundle a store, its catalog and limits
    pub const fn new(store: &'a PageStore, catalog: &'a AssetCatalog, limits: DecodeLimits) -> Self {
        Self {
            store,
            catalog,
            limits,
        }
    }

    /// Header blob of `entry`, cut to the declared header size
    pub fn header(&self, entry: &AssetEntry) -> DecodeResult<Bytes> {
        if let EntryValidity::Invalid(issue) = &entry.validity {
            return Err(DecodeError::InvalidEntry(issue.clone()));
        }
        let tail = self
            .store
            .resolve(entry.header)
            .ok_or(DecodeError::MissingHeader)?;
        let size = entry.header_size as usize;
        if size == 0 || size > tail.len() {
            Ok(tail)
        } else {
            Ok(tail.slice(..size))
        }
    }

    /// Catalog entry for `guid`, which must be of `expected` type
    pub fn dependency(&self, guid: u64, expected: AssetType) -> DecodeResult<&'a AssetEntry> {
        let entry = self
            .catalog
            .get(guid)
            .ok_or(DecodeError::UnknownAsset(guid))?;
        if entry.asset_type != expected {
            return Err(DecodeError::WrongType {
                guid,
                expected,
                actual: entry.asset_type,
            });
        }
        Ok(entry)
    }
}

/// Decode one asset, dispatching on its type
pub fn decode(ctx: &DecodeContext<'_>, entry: &AssetEntry) -> DecodeResult<DecodedRecord> {
    debug!(
        "decoding {:016X} ({} v{})",
        entry.guid,
        entry.type_name(),
        entry.version
    );
    match entry.asset_type {
        AssetType::DataTable => datatable::decode(ctx, entry).map(DecodedRecord::DataTable),
        AssetType::SettingsLayout => {
            settings_layout::decode(ctx, entry).map(DecodedRecord::SettingsLayout)
        }
        AssetType::Settings => settings::decode(ctx, entry).map(DecodedRecord::Settings),
        AssetType::Texture => texture::decode(ctx, entry).map(DecodedRecord::Texture),
        other => Ok(DecodedRecord::Opaque {
            asset_type: other,
            version: entry.version,
            header: ctx.header(entry)?,
        }),
    }
}

fn unsupported(entry: &AssetEntry) -> DecodeError {
    DecodeError::UnsupportedVersion {
        asset_type: entry.asset_type,
        version: entry.version,
    }
}
