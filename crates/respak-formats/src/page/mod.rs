//! Page store
//!
//! Splits an opened container into its indexed pages. Uncompressed pages are
//! zero-copy views of the container bytes; compressed pages go through the
//! configured [`BlockDecompressor`] the first time they are requested and are
//! memoized afterwards, failures included. A page that fails does not affect
//! any other page.

pub mod header;

use bytes::Bytes;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::compression::{BlockDecompressor, DecompressError};
use crate::error::{PakError, PakResult};
use crate::reader;

pub use header::{
    ContainerHeader, HEADER_SIZE, PAGE_DESCRIPTOR_SIZE, PAGE_FLAG_COMPRESSED, PAK_MAGIC,
    PageDescriptor, PakVersion,
};

/// Why a page could not be materialized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    /// Index past the end of the page directory
    #[error("page {index} not found ({count} pages)")]
    NotFound {
        /// Requested page
        index: usize,
        /// Pages in the container
        count: usize,
    },

    /// Payload runs past the end of the container
    #[error("page {index} payload at {offset}+{size} exceeds container of {available} bytes")]
    Truncated {
        /// Page index
        index: usize,
        /// Payload offset in the container
        offset: usize,
        /// Payload size
        size: usize,
        /// Container size
        available: usize,
    },

    /// The block decompressor failed
    #[error("page {index} decompression failed: {source}")]
    Decompression {
        /// Page index
        index: usize,
        /// Codec failure
        source: DecompressError,
    },

    /// Decompressed size differs from the page directory
    #[error("page {index} decompressed to {actual} bytes, expected {expected}")]
    SizeMismatch {
        /// Page index
        index: usize,
        /// Size from the page directory
        expected: usize,
        /// Size produced by the codec
        actual: usize,
    },
}

/// Indexed pages of one opened container
pub struct PageStore {
    data: Bytes,
    header: ContainerHeader,
    version: PakVersion,
    descriptors: Vec<PageDescriptor>,
    payload_offsets: Vec<usize>,
    pages: Vec<OnceLock<Result<Bytes, PageError>>>,
    stream_paths: Vec<String>,
    optional_stream_paths: Vec<String>,
    directory_offset: usize,
    decompressor: Arc<dyn BlockDecompressor>,
}

impl std::fmt::Debug for PageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageStore")
            .field("version", &self.version)
            .field("pages", &self.descriptors.len())
            .field("container_len", &self.data.len())
            .field("decompressor", &self.decompressor.name())
            .finish_non_exhaustive()
    }
}

fn region<'a>(data: &'a [u8], name: &'static str, offset: usize, len: usize) -> PakResult<&'a [u8]> {
    reader::slice(data, offset, len).map_err(|_| PakError::Truncated {
        region: name,
        offset,
        needed: len,
        available: data.len(),
    })
}

impl PageStore {
    /// Parse the container header and page directory
    ///
    /// Pages are not materialized here; see [`Self::page`].
    pub fn open(
        data: impl Into<Bytes>,
        decompressor: Arc<dyn BlockDecompressor>,
    ) -> PakResult<Self> {
        let data: Bytes = data.into();

        let header_bytes = region(&data, "header", 0, HEADER_SIZE)?;
        let header: ContainerHeader = reader::read_struct(header_bytes, 0).map_err(|_| {
            PakError::Truncated {
                region: "header",
                offset: 0,
                needed: HEADER_SIZE,
                available: data.len(),
            }
        })?;
        let version = header.validate()?;

        let page_count = header.page_count as usize;
        let directory_len = page_count
            .checked_mul(PAGE_DESCRIPTOR_SIZE)
            .ok_or(PakError::Truncated {
                region: "page directory",
                offset: HEADER_SIZE,
                needed: usize::MAX,
                available: data.len(),
            })?;
        let directory = region(&data, "page directory", HEADER_SIZE, directory_len)?;
        let descriptors = (0..page_count)
            .map(|i| reader::read_indexed::<PageDescriptor>(directory, i, PAGE_DESCRIPTOR_SIZE))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| PakError::Truncated {
                region: "page directory",
                offset: HEADER_SIZE,
                needed: directory_len,
                available: data.len(),
            })?;

        let mut cursor = HEADER_SIZE + directory_len;
        let paths_len = header.stream_paths_size as usize;
        let stream_paths = reader::split_cstrings(region(&data, "stream paths", cursor, paths_len)?);
        cursor += paths_len;

        let optional_len = header.optional_stream_paths_size as usize;
        let optional_stream_paths = reader::split_cstrings(region(
            &data,
            "optional stream paths",
            cursor,
            optional_len,
        )?);
        cursor += optional_len;

        let directory_offset = cursor;
        let entries_len = (header.asset_count as usize)
            .checked_mul(header.asset_entry_size as usize)
            .ok_or(PakError::Truncated {
                region: "asset directory",
                offset: directory_offset,
                needed: usize::MAX,
                available: data.len(),
            })?;
        region(&data, "asset directory", directory_offset, entries_len)?;

        // Payloads follow the directory in page order
        let mut payload_offsets = Vec::with_capacity(page_count);
        let mut offset = directory_offset + entries_len;
        for descriptor in &descriptors {
            payload_offsets.push(offset);
            offset = offset.saturating_add(descriptor.payload_size() as usize);
        }

        if header.declared_size != data.len() as u64 {
            warn!(
                "container declares {} bytes but holds {}",
                header.declared_size,
                data.len()
            );
        }

        info!(
            "opened container v{}: {} pages, {} assets, {} stream files ({} optional)",
            version.as_raw(),
            page_count,
            header.asset_count,
            stream_paths.len(),
            optional_stream_paths.len()
        );

        Ok(Self {
            data,
            header,
            version,
            descriptors,
            payload_offsets,
            pages: (0..page_count).map(|_| OnceLock::new()).collect(),
            stream_paths,
            optional_stream_paths,
            directory_offset,
            decompressor,
        })
    }

    /// Container header
    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// Container format revision
    pub fn version(&self) -> PakVersion {
        self.version
    }

    /// Number of pages in the page directory
    pub fn page_count(&self) -> usize {
        self.descriptors.len()
    }

    /// Page directory entry for `index`
    pub fn descriptor(&self, index: usize) -> Option<&PageDescriptor> {
        self.descriptors.get(index)
    }

    /// Whole page directory
    pub fn descriptors(&self) -> &[PageDescriptor] {
        &self.descriptors
    }

    /// Relative paths of the primary stream files
    pub fn stream_paths(&self) -> &[String] {
        &self.stream_paths
    }

    /// Relative paths of the optional stream files
    pub fn optional_stream_paths(&self) -> &[String] {
        &self.optional_stream_paths
    }

    /// Raw bytes of the asset directory
    pub fn directory_bytes(&self) -> Bytes {
        let len = self.header.asset_count as usize * self.header.asset_entry_size as usize;
        self.data
            .slice(self.directory_offset..self.directory_offset + len)
    }

    /// Whether `index` has already been materialized (successfully or not)
    pub fn is_materialized(&self, index: usize) -> bool {
        self.pages.get(index).is_some_and(|slot| slot.get().is_some())
    }

    /// Materialized page bytes, or the reason the page is unavailable
    ///
    /// Repeated calls for the same index return the same bytes; the
    /// decompressor runs at most once per page.
    pub fn try_page(&self, index: usize) -> Result<Bytes, PageError> {
        let slot = self.pages.get(index).ok_or(PageError::NotFound {
            index,
            count: self.pages.len(),
        })?;
        slot.get_or_init(|| self.materialize(index)).clone()
    }

    /// Materialized page bytes, `None` if the page is missing or failed
    pub fn page(&self, index: usize) -> Option<Bytes> {
        self.try_page(index).ok()
    }

    fn materialize(&self, index: usize) -> Result<Bytes, PageError> {
        let result = self.load_page(index);
        match &result {
            Ok(page) => debug!("materialized page {} ({} bytes)", index, page.len()),
            Err(e) => warn!("{e}"),
        }
        result
    }

    fn load_page(&self, index: usize) -> Result<Bytes, PageError> {
        let count = self.descriptors.len();
        let (descriptor, offset) = self
            .descriptors
            .get(index)
            .zip(self.payload_offsets.get(index))
            .ok_or(PageError::NotFound { index, count })?;

        let size = descriptor.payload_size() as usize;
        let end = offset
            .checked_add(size)
            .filter(|&end| end <= self.data.len())
            .ok_or(PageError::Truncated {
                index,
                offset: *offset,
                size,
                available: self.data.len(),
            })?;

        if !descriptor.is_compressed() {
            return Ok(self.data.slice(*offset..end));
        }

        let expected = descriptor.uncompressed_size as usize;
        let decompressed = self
            .decompressor
            .decompress(&self.data[*offset..end], expected)
            .map_err(|source| PageError::Decompression { index, source })?;

        if decompressed.len() != expected {
            return Err(PageError::SizeMismatch {
                index,
                expected,
                actual: decompressed.len(),
            });
        }

        Ok(Bytes::from(decompressed))
    }
}
