//! External stream files
//!
//! Large variable-resolution data (texture mips, mostly) lives outside the
//! container in sibling stream files. There are two independent sets: the
//! primary stream files and the optional high-quality ones. Each asset carries
//! one packed locator per set; the low 12 bits pick the file from the
//! container's path list and the rest is the byte offset of the asset's first
//! unit.
//!
//! Units of one category are stored back to back, so a unit's offset is the
//! locator offset plus the sizes of the preceding units of that category.
//! Whenever a unit cannot be read the resolver substitutes zeros of the
//! expected size instead of failing, because later consumers rely on every
//! unit being present.

use bytes::Bytes;
use memmap2::Mmap;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::limits::MAX_STREAM_UNIT_SIZE;

/// Low bits of a packed locator holding the file index
pub const LOCATOR_FILE_INDEX_MASK: u64 = 0xFFF;

/// Locator value meaning "not streamed"
pub const LOCATOR_ABSENT: u64 = u64::MAX;

/// Stream resolver errors
#[derive(Debug, Error)]
pub enum StreamError {
    /// Unit index past the end of the unit table
    #[error("stream unit {index} out of range ({count} units)")]
    UnitOutOfRange {
        /// Requested unit
        index: usize,
        /// Units in the table
        count: usize,
    },

    /// Unit larger than the resolver is willing to allocate
    #[error("stream unit of {size} bytes exceeds limit of {limit} bytes")]
    UnitTooLarge {
        /// Unit size
        size: u64,
        /// Limit
        limit: u64,
    },

    /// Range read past the end of a stream file
    #[error("read of {len} bytes at {offset} exceeds stream file of {available} bytes")]
    ShortRead {
        /// Requested offset
        offset: u64,
        /// Requested length
        len: u64,
        /// File length
        available: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for stream operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Which stream file set a unit lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StreamCategory {
    /// Primary stream files
    Primary,
    /// Optional high-quality stream files
    Optional,
}

/// One entry of a unit size table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamUnit {
    /// Size of the unit in bytes
    pub size: u64,
    /// Stream file set holding the unit
    pub category: StreamCategory,
}

/// Decoded stream locator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamLocator {
    /// Index into the container's stream path list
    pub file_index: usize,
    /// Byte offset of the first unit
    pub offset: u64,
}

impl StreamLocator {
    /// Decode a packed locator; `0` and [`LOCATOR_ABSENT`] mean "not streamed"
    pub fn from_raw(raw: u64) -> Option<Self> {
        if raw == 0 || raw == LOCATOR_ABSENT {
            return None;
        }
        Some(Self {
            file_index: (raw & LOCATOR_FILE_INDEX_MASK) as usize,
            offset: raw & !LOCATOR_FILE_INDEX_MASK,
        })
    }

    /// Pack into the on-disk form
    pub const fn to_raw(self) -> u64 {
        (self.offset & !LOCATOR_FILE_INDEX_MASK) | (self.file_index as u64 & LOCATOR_FILE_INDEX_MASK)
    }
}

/// A stream file opened for range reads
pub enum StreamFile {
    /// Memory-mapped file on disk
    Mapped {
        /// Where the file was opened from
        path: PathBuf,
        /// Mapping of the whole file
        map: Mmap,
    },
    /// Buffer already in memory
    Memory(Bytes),
}

impl std::fmt::Debug for StreamFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mapped { path, map } => f
                .debug_struct("Mapped")
                .field("path", path)
                .field("len", &map.len())
                .finish(),
            Self::Memory(bytes) => f.debug_tuple("Memory").field(&bytes.len()).finish(),
        }
    }
}

impl StreamFile {
    /// Map a file from disk
    pub fn open(path: impl AsRef<Path>) -> StreamResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            // Empty files cannot be mapped on every platform
            return Ok(Self::Memory(Bytes::new()));
        }

        #[allow(unsafe_code)]
        // SAFETY: the mapping is read-only; stream files are not modified
        // while a container is open.
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self::Mapped {
            path: path.to_path_buf(),
            map,
        })
    }

    /// Wrap an in-memory buffer
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Memory(data.into())
    }

    /// Length of the file
    pub fn len(&self) -> u64 {
        match self {
            Self::Mapped { map, .. } => map.len() as u64,
            Self::Memory(bytes) => bytes.len() as u64,
        }
    }

    /// Whether the file is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read `len` bytes at `offset`
    pub fn read_range(&self, offset: u64, len: u64) -> StreamResult<Bytes> {
        let available = self.len();
        let short = StreamError::ShortRead {
            offset,
            len,
            available,
        };
        let end = match offset.checked_add(len) {
            Some(end) if end <= available => end,
            _ => return Err(short),
        };
        let (start, end) = (offset as usize, end as usize);

        Ok(match self {
            Self::Mapped { map, .. } => Bytes::copy_from_slice(&map[start..end]),
            Self::Memory(bytes) => bytes.slice(start..end),
        })
    }
}

/// Both sets of stream files belonging to one container
#[derive(Debug, Default)]
pub struct StreamSet {
    primary: Vec<Option<StreamFile>>,
    optional: Vec<Option<StreamFile>>,
}

/// Location of a stored stream path next to the container
///
/// Only the file name of `stored` is kept; stored paths are relative to the
/// game root and may use either separator.
pub fn derive_stream_path(dir: &Path, stored: &str) -> PathBuf {
    let name = stored.rsplit(['/', '\\']).next().unwrap_or(stored);
    dir.join(name)
}

fn open_all(dir: &Path, stored: &[String]) -> Vec<Option<StreamFile>> {
    stored
        .iter()
        .map(|stored| {
            let path = derive_stream_path(dir, stored);
            match StreamFile::open(&path) {
                Ok(file) => {
                    debug!("opened stream file {} ({} bytes)", path.display(), file.len());
                    Some(file)
                }
                Err(e) => {
                    warn!("stream file {} unavailable: {e}", path.display());
                    None
                }
            }
        })
        .collect()
}

impl StreamSet {
    /// A set with no files; every unit resolves to a placeholder
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from already opened files, indexed like the container's path lists
    pub fn from_files(primary: Vec<Option<StreamFile>>, optional: Vec<Option<StreamFile>>) -> Self {
        Self { primary, optional }
    }

    /// Open every listed stream file found in `dir`
    ///
    /// Missing files are logged and left absent.
    pub fn open_in(dir: &Path, primary: &[String], optional: &[String]) -> Self {
        let set = Self {
            primary: open_all(dir, primary),
            optional: open_all(dir, optional),
        };
        info!(
            "stream files: {}/{} primary, {}/{} optional",
            set.primary.iter().flatten().count(),
            primary.len(),
            set.optional.iter().flatten().count(),
            optional.len()
        );
        set
    }

    /// Stream file `index` of a category, if it was opened
    pub fn file(&self, category: StreamCategory, index: usize) -> Option<&StreamFile> {
        let files = match category {
            StreamCategory::Primary => &self.primary,
            StreamCategory::Optional => &self.optional,
        };
        files.get(index).and_then(Option::as_ref)
    }

    /// Bytes of unit `unit_index` from the unit table `units`
    ///
    /// `base_offset` is the packed locator for the unit's category. Absent
    /// locators, unopened files and short reads produce a zero-filled buffer
    /// of the unit's size. Only an invalid unit request is an error.
    pub fn resolve_unit(
        &self,
        base_offset: u64,
        unit_index: usize,
        units: &[StreamUnit],
    ) -> StreamResult<Bytes> {
        let unit = units.get(unit_index).ok_or(StreamError::UnitOutOfRange {
            index: unit_index,
            count: units.len(),
        })?;
        if unit.size > MAX_STREAM_UNIT_SIZE {
            return Err(StreamError::UnitTooLarge {
                size: unit.size,
                limit: MAX_STREAM_UNIT_SIZE,
            });
        }
        let placeholder = || Bytes::from(vec![0u8; unit.size as usize]);

        let Some(locator) = StreamLocator::from_raw(base_offset) else {
            debug!("unit {unit_index} not streamed, using placeholder");
            return Ok(placeholder());
        };

        let Some(file) = self.file(unit.category, locator.file_index) else {
            warn!(
                "{:?} stream file {} not open, zero-filling unit {unit_index}",
                unit.category, locator.file_index
            );
            return Ok(placeholder());
        };

        let preceding = units[..unit_index]
            .iter()
            .filter(|u| u.category == unit.category)
            .try_fold(0u64, |acc, u| acc.checked_add(u.size));
        let Some(offset) = preceding.and_then(|p| p.checked_add(locator.offset)) else {
            warn!("unit {unit_index} offset overflows, zero-filling");
            return Ok(placeholder());
        };

        match file.read_range(offset, unit.size) {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                warn!("unit {unit_index}: {e}; zero-filling");
                Ok(placeholder())
            }
        }
    }
}
