//! Synthetic containers for unit tests
//!
//! Lays out a container exactly as the readers expect it: header, page
//! directory, stream path blocks, asset directory, page payloads.

use binrw::{BinWrite, BinWriterExt};
use std::io::Cursor;
use std::sync::Arc;

use crate::compression::{DeflateDecompressor, deflate};
use crate::directory::{RawAssetEntry, tag};
use crate::page::{ContainerHeader, PAGE_FLAG_COMPRESSED, PAK_MAGIC, PageDescriptor, PageStore};
use crate::pointer::PagePtr;

/// Serialize a binrw structure little-endian
pub fn to_bytes<T>(value: &T) -> Vec<u8>
where
    T: BinWrite,
    for<'a> <T as BinWrite>::Args<'a>: Default,
{
    let mut cursor = Cursor::new(Vec::new());
    value
        .write_le(&mut cursor)
        .expect("writing to memory succeeds");
    cursor.into_inner()
}

/// Growable page body that hands out offsets as data is appended
#[derive(Debug, Default, Clone)]
pub struct PageBuf {
    bytes: Vec<u8>,
}

impl PageBuf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current length, which is also the offset of the next append
    pub fn offset(&self) -> i32 {
        self.bytes.len() as i32
    }

    pub fn align(&mut self, alignment: usize) -> &mut Self {
        while self.bytes.len() % alignment != 0 {
            self.bytes.push(0);
        }
        self
    }

    pub fn push(&mut self, data: &[u8]) -> i32 {
        let offset = self.offset();
        self.bytes.extend_from_slice(data);
        offset
    }

    pub fn push_struct<T>(&mut self, value: &T) -> i32
    where
        T: BinWrite,
        for<'a> <T as BinWrite>::Args<'a>: Default,
    {
        self.push(&to_bytes(value))
    }

    pub fn push_cstr(&mut self, text: &str) -> i32 {
        let offset = self.push(text.as_bytes());
        self.bytes.push(0);
        offset
    }

    pub fn reserve(&mut self, len: usize) -> i32 {
        let offset = self.offset();
        self.bytes.resize(self.bytes.len() + len, 0);
        offset
    }

    pub fn write_at(&mut self, offset: i32, data: &[u8]) {
        let start = offset as usize;
        self.bytes[start..start + data.len()].copy_from_slice(data);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Directory entry under construction
#[derive(Debug, Clone)]
pub struct TestAsset {
    raw: RawAssetEntry,
    created_time: u64,
}

impl TestAsset {
    pub fn new(guid: u64, type_tag: &[u8; 4], version: u32) -> Self {
        Self {
            raw: RawAssetEntry {
                guid,
                header: PagePtr::NULL,
                data: PagePtr::NULL,
                stream_locator: 0,
                optional_stream_locator: 0,
                first_dependent: 0,
                first_dependency: 0,
                dependent_count: 0,
                dependency_count: 0,
                header_size: 0,
                version,
                type_tag: tag(type_tag),
                reserved: 0,
            },
            created_time: 0,
        }
    }

    pub fn header(mut self, ptr: PagePtr, size: u32) -> Self {
        self.raw.header = ptr;
        self.raw.header_size = size;
        self
    }

    pub fn data(mut self, ptr: PagePtr) -> Self {
        self.raw.data = ptr;
        self
    }

    pub fn created(mut self, created_time: u64) -> Self {
        self.created_time = created_time;
        self
    }

    pub fn streams(mut self, primary: u64, optional: u64) -> Self {
        self.raw.stream_locator = primary;
        self.raw.optional_stream_locator = optional;
        self
    }

    pub fn dependencies(mut self, dependencies: u32, dependents: u32) -> Self {
        self.raw.dependency_count = dependencies;
        self.raw.dependent_count = dependents;
        self
    }
}

/// Builder for a whole container
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    version: u16,
    created_time: u64,
    pages: Vec<(PageDescriptor, Vec<u8>)>,
    assets: Vec<TestAsset>,
    stream_paths: Vec<String>,
    optional_stream_paths: Vec<String>,
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            version: 8,
            created_time: 0,
            pages: Vec::new(),
            assets: Vec::new(),
            stream_paths: Vec::new(),
            optional_stream_paths: Vec::new(),
        }
    }

    pub fn version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    pub fn created_time(mut self, created_time: u64) -> Self {
        self.created_time = created_time;
        self
    }

    pub fn page(mut self, data: Vec<u8>) -> Self {
        let descriptor = PageDescriptor {
            uncompressed_size: data.len() as u32,
            stored_size: data.len() as u32,
            flags: 0,
            alignment: 8,
        };
        self.pages.push((descriptor, data));
        self
    }

    pub fn compressed_page(self, data: Vec<u8>) -> Self {
        let declared = data.len() as u32;
        self.compressed_page_declaring(data, declared)
    }

    pub fn compressed_page_declaring(mut self, data: Vec<u8>, declared_size: u32) -> Self {
        let compressed = deflate::compress_block(&data).expect("compression succeeds");
        let descriptor = PageDescriptor {
            uncompressed_size: declared_size,
            stored_size: compressed.len() as u32,
            flags: PAGE_FLAG_COMPRESSED,
            alignment: 8,
        };
        self.pages.push((descriptor, compressed));
        self
    }

    /// A page flagged compressed whose payload is not a valid zlib stream
    pub fn corrupt_compressed_page(mut self, payload: Vec<u8>) -> Self {
        let descriptor = PageDescriptor {
            uncompressed_size: payload.len() as u32 * 4,
            stored_size: payload.len() as u32,
            flags: PAGE_FLAG_COMPRESSED,
            alignment: 8,
        };
        self.pages.push((descriptor, payload));
        self
    }

    pub fn stream_path(mut self, path: &str) -> Self {
        self.stream_paths.push(path.to_string());
        self
    }

    pub fn optional_stream_path(mut self, path: &str) -> Self {
        self.optional_stream_paths.push(path.to_string());
        self
    }

    pub fn asset(mut self, asset: TestAsset) -> Self {
        self.assets.push(asset);
        self
    }

    fn path_block(paths: &[String]) -> Vec<u8> {
        let mut block = Vec::new();
        for path in paths {
            block.extend_from_slice(path.as_bytes());
            block.push(0);
        }
        block
    }

    pub fn build(&self) -> Vec<u8> {
        let entry_size: u32 = if self.version == 7 { 72 } else { 80 };
        let paths = Self::path_block(&self.stream_paths);
        let optional_paths = Self::path_block(&self.optional_stream_paths);

        let header = ContainerHeader {
            magic: PAK_MAGIC,
            version: self.version,
            flags: 0,
            created_time: self.created_time,
            content_hash: 0,
            page_count: self.pages.len() as u32,
            asset_count: self.assets.len() as u32,
            asset_entry_size: entry_size,
            stream_paths_size: paths.len() as u16,
            optional_stream_paths_size: optional_paths.len() as u16,
            declared_size: 0,
        };

        let mut cursor = Cursor::new(Vec::new());
        cursor.write_le(&header).expect("write header");
        for (descriptor, _) in &self.pages {
            cursor.write_le(descriptor).expect("write page descriptor");
        }
        let mut out = cursor.into_inner();
        out.extend_from_slice(&paths);
        out.extend_from_slice(&optional_paths);

        for asset in &self.assets {
            out.extend_from_slice(&to_bytes(&asset.raw));
            if entry_size == 80 {
                out.extend_from_slice(&asset.created_time.to_le_bytes());
            }
        }
        for (_, payload) in &self.pages {
            out.extend_from_slice(payload);
        }

        let len = out.len() as u64;
        out[0x28..0x30].copy_from_slice(&len.to_le_bytes());
        out
    }

    pub fn build_store(&self) -> PageStore {
        PageStore::open(self.build(), Arc::new(DeflateDecompressor)).expect("valid container")
    }
}

/// Store holding one uncompressed page
pub fn single_page_store(data: Vec<u8>) -> PageStore {
    ContainerBuilder::new().page(data).build_store()
}
