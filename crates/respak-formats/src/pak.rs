//! Opened container: page store, catalog and stream files together

use bytes::Bytes;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::compression::{BlockDecompressor, default_decompressor};
use crate::config::PakConfig;
use crate::directory::{AssetCatalog, AssetEntry, AssetType};
use crate::error::PakResult;
use crate::page::PageStore;
use crate::records::{self, DecodeContext, DecodeError, DecodeResult, DecodedRecord, Texture};
use crate::stream::StreamSet;

/// An opened container
///
/// Owns everything needed to decode its assets. Dropping it releases the
/// decompressed page cache and closes the stream files.
#[derive(Debug)]
pub struct PakFile {
    path: Option<PathBuf>,
    config: PakConfig,
    store: PageStore,
    catalog: AssetCatalog,
    streams: StreamSet,
}

fn map_file(path: &Path) -> PakResult<Bytes> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(Bytes::new());
    }

    #[allow(unsafe_code)]
    // SAFETY: read-only mapping of a container that is not modified while open
    let map = unsafe { Mmap::map(&file)? };
    Ok(Bytes::from_owner(map))
}

impl PakFile {
    /// Open a container with the process-wide decompressor
    pub fn open(path: impl AsRef<Path>, config: PakConfig) -> PakResult<Self> {
        Self::open_with(path, config, default_decompressor())
    }

    /// Open a container with a specific decompressor
    ///
    /// Stream files are looked up next to the container unless the config
    /// names another directory.
    pub fn open_with(
        path: impl AsRef<Path>,
        config: PakConfig,
        decompressor: Arc<dyn BlockDecompressor>,
    ) -> PakResult<Self> {
        let path = path.as_ref();
        info!("opening {}", path.display());
        let mut pak = Self::from_bytes(map_file(path)?, config, decompressor)?;

        if pak.config.open_streams {
            let dir = pak
                .config
                .stream_dir
                .clone()
                .or_else(|| path.parent().map(Path::to_path_buf))
                .unwrap_or_default();
            pak.streams = StreamSet::open_in(
                &dir,
                pak.store.stream_paths(),
                pak.store.optional_stream_paths(),
            );
        }
        pak.path = Some(path.to_path_buf());
        Ok(pak)
    }

    /// Open a container already in memory; no stream files are opened
    pub fn from_bytes(
        data: impl Into<Bytes>,
        config: PakConfig,
        decompressor: Arc<dyn BlockDecompressor>,
    ) -> PakResult<Self> {
        let store = PageStore::open(data, decompressor)?;
        let catalog = AssetCatalog::read(&store);
        Ok(Self {
            path: None,
            config,
            store,
            catalog,
            streams: StreamSet::empty(),
        })
    }

    /// Replace the stream files
    #[must_use]
    pub fn with_streams(mut self, streams: StreamSet) -> Self {
        self.streams = streams;
        self
    }

    /// Where the container was opened from
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Configuration in effect
    pub fn config(&self) -> &PakConfig {
        &self.config
    }

    /// Page store
    pub fn store(&self) -> &PageStore {
        &self.store
    }

    /// Asset catalog
    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }

    /// Directory entries in container order
    pub fn entries(&self) -> &[AssetEntry] {
        self.catalog.entries()
    }

    /// Entry for `guid`
    pub fn entry(&self, guid: u64) -> Option<&AssetEntry> {
        self.catalog.get(guid)
    }

    /// Stream files
    pub fn streams(&self) -> &StreamSet {
        &self.streams
    }

    /// Bytes of page `index`, decompressing on first use
    ///
    /// Lets a consumer walk pointers the decoders do not follow.
    pub fn page_data(&self, index: usize) -> Option<Bytes> {
        self.store.page(index)
    }

    fn context(&self) -> DecodeContext<'_> {
        DecodeContext::new(&self.store, &self.catalog, self.config.limits)
    }

    /// Decode one entry
    pub fn decode(&self, entry: &AssetEntry) -> DecodeResult<DecodedRecord> {
        records::decode(&self.context(), entry)
    }

    /// Decode the entry for `guid`
    pub fn decode_guid(&self, guid: u64) -> DecodeResult<DecodedRecord> {
        let entry = self.entry(guid).ok_or(DecodeError::UnknownAsset(guid))?;
        self.decode(entry)
    }

    /// Decode the texture `guid`
    pub fn texture(&self, guid: u64) -> DecodeResult<Texture> {
        let ctx = self.context();
        let entry = ctx.dependency(guid, AssetType::Texture)?;
        records::texture::decode(&ctx, entry)
    }

    /// Bytes of mip `level` of texture `guid`, resident or streamed
    pub fn load_texture_mip(&self, guid: u64, level: usize) -> DecodeResult<Bytes> {
        self.texture(guid)?
            .load_mip(&self.store, &self.streams, level)
    }
}
