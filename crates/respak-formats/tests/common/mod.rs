//! Synthetic container fixtures built through the public API
#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use binrw::{BinWrite, BinWriterExt};
use respak_formats::PagePtr;
use respak_formats::compression::deflate::compress_block;
use respak_formats::directory::{RawAssetEntry, tag};
use respak_formats::page::{ContainerHeader, PAGE_FLAG_COMPRESSED, PAK_MAGIC, PageDescriptor};
use std::io::Cursor;

pub fn le_bytes<T>(value: &T) -> Vec<u8>
where
    T: BinWrite,
    for<'a> <T as BinWrite>::Args<'a>: Default,
{
    let mut cursor = Cursor::new(Vec::new());
    value.write_le(&mut cursor).unwrap();
    cursor.into_inner()
}

/// Page body with offset bookkeeping
#[derive(Debug, Default)]
pub struct Page(pub Vec<u8>);

impl Page {
    pub fn at(&self) -> i32 {
        self.0.len() as i32
    }

    pub fn put(&mut self, data: &[u8]) -> i32 {
        let at = self.at();
        self.0.extend_from_slice(data);
        at
    }

    pub fn put_cstr(&mut self, text: &str) -> i32 {
        let at = self.put(text.as_bytes());
        self.0.push(0);
        at
    }

    pub fn put_le<T>(&mut self, value: &T) -> i32
    where
        T: BinWrite,
        for<'a> <T as BinWrite>::Args<'a>: Default,
    {
        self.put(&le_bytes(value))
    }

    pub fn pad_to(&mut self, alignment: usize) {
        while self.0.len() % alignment != 0 {
            self.0.push(0);
        }
    }
}

pub struct Asset {
    pub guid: u64,
    pub type_tag: [u8; 4],
    pub version: u32,
    pub header: PagePtr,
    pub header_size: u32,
    pub data: PagePtr,
    pub streams: (u64, u64),
    pub created_time: u64,
}

impl Asset {
    pub fn new(guid: u64, type_tag: &[u8; 4], version: u32, header: PagePtr, size: u32) -> Self {
        Self {
            guid,
            type_tag: *type_tag,
            version,
            header,
            header_size: size,
            data: PagePtr::NULL,
            streams: (0, 0),
            created_time: 0,
        }
    }
}

#[derive(Default)]
pub struct Fixture {
    pub version: u16,
    pub created_time: u64,
    pub pages: Vec<(PageDescriptor, Vec<u8>)>,
    pub assets: Vec<Asset>,
    pub stream_paths: Vec<String>,
    pub optional_stream_paths: Vec<String>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            version: 8,
            ..Self::default()
        }
    }

    pub fn page(&mut self, page: Page) -> i32 {
        let data = page.0;
        self.pages.push((
            PageDescriptor {
                uncompressed_size: data.len() as u32,
                stored_size: data.len() as u32,
                flags: 0,
                alignment: 8,
            },
            data,
        ));
        self.pages.len() as i32 - 1
    }

    pub fn compressed_page(&mut self, page: Page) -> i32 {
        let packed = compress_block(&page.0).unwrap();
        self.pages.push((
            PageDescriptor {
                uncompressed_size: page.0.len() as u32,
                stored_size: packed.len() as u32,
                flags: PAGE_FLAG_COMPRESSED,
                alignment: 8,
            },
            packed,
        ));
        self.pages.len() as i32 - 1
    }

    /// Flagged compressed but not a zlib stream
    pub fn broken_page(&mut self, len: u32) -> i32 {
        self.pages.push((
            PageDescriptor {
                uncompressed_size: len * 2,
                stored_size: len,
                flags: PAGE_FLAG_COMPRESSED,
                alignment: 8,
            },
            vec![0x5A; len as usize],
        ));
        self.pages.len() as i32 - 1
    }

    pub fn build(&self) -> Vec<u8> {
        let block = |paths: &[String]| -> Vec<u8> {
            paths
                .iter()
                .flat_map(|p| p.bytes().chain(std::iter::once(0)))
                .collect()
        };
        let paths = block(&self.stream_paths);
        let optional = block(&self.optional_stream_paths);
        let entry_size: u32 = if self.version == 7 { 72 } else { 80 };

        let mut out = Cursor::new(Vec::new());
        out.write_le(&ContainerHeader {
            magic: PAK_MAGIC,
            version: self.version,
            flags: 0,
            created_time: self.created_time,
            content_hash: 0,
            page_count: self.pages.len() as u32,
            asset_count: self.assets.len() as u32,
            asset_entry_size: entry_size,
            stream_paths_size: paths.len() as u16,
            optional_stream_paths_size: optional.len() as u16,
            declared_size: 0,
        })
        .unwrap();
        for (descriptor, _) in &self.pages {
            out.write_le(descriptor).unwrap();
        }
        let mut out = out.into_inner();
        out.extend_from_slice(&paths);
        out.extend_from_slice(&optional);

        for asset in &self.assets {
            out.extend(le_bytes(&RawAssetEntry {
                guid: asset.guid,
                header: asset.header,
                data: asset.data,
                stream_locator: asset.streams.0,
                optional_stream_locator: asset.streams.1,
                first_dependent: 0,
                first_dependency: 0,
                dependent_count: 0,
                dependency_count: 0,
                header_size: asset.header_size,
                version: asset.version,
                type_tag: tag(&asset.type_tag),
                reserved: 0,
            }));
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
}
