//! Asset directory reader and catalog
//!
//! The directory is a flat array of fixed-size entries that follows the page
//! directory and stream path blocks. Entries are never dropped; malformed ones
//! are kept with an invalid marker.

mod entry;

pub use entry::{
    AssetEntry, AssetType, DirectoryIssue, ENTRY_BASE_SIZE, EntryValidity, RawAssetEntry, fourcc,
    tag,
};

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::page::{PageDescriptor, PageStore, PakVersion};
use crate::pointer::PagePtr;
use crate::reader;

/// Read every directory entry in container order
///
/// Entries whose references do not fit the page directory are kept and marked
/// [`EntryValidity::Invalid`].
pub fn read_directory(store: &PageStore) -> Vec<AssetEntry> {
    let header = store.header();
    let entry_size = header.asset_entry_size as usize;
    let count = header.asset_count as usize;
    let directory = store.directory_bytes();

    let mut entries = Vec::with_capacity(count);
    for index in 0..count {
        let base = index * entry_size;
        let raw = match reader::read_struct::<RawAssetEntry>(&directory, base) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("asset entry {index} unreadable: {e}");
                entries.push(AssetEntry::unreadable(index));
                continue;
            }
        };

        let created_time = match store.version() {
            PakVersion::V8 => reader::read_u64(&directory, base + ENTRY_BASE_SIZE)
                .unwrap_or(header.created_time),
            PakVersion::V7 => header.created_time,
        };

        let mut entry = AssetEntry::from_raw(index, raw, created_time);
        if let Err(issue) = check_references(&entry, store.descriptors()) {
            warn!(
                "asset {:016X} ({}) marked invalid: {issue}",
                entry.guid,
                entry.type_name()
            );
            entry.validity = EntryValidity::Invalid(issue);
        }
        entries.push(entry);
    }

    debug!("read {} asset entries", entries.len());
    entries
}

fn page_size(descriptors: &[PageDescriptor], ptr: PagePtr) -> Option<u32> {
    usize::try_from(ptr.index)
        .ok()
        .and_then(|i| descriptors.get(i))
        .map(|d| d.uncompressed_size)
}

fn check_references(entry: &AssetEntry, descriptors: &[PageDescriptor]) -> Result<(), DirectoryIssue> {
    // A null header is reported by the decoders as "no header data"
    if !entry.header.is_null() {
        let page_size = page_size(descriptors, entry.header).ok_or(
            DirectoryIssue::HeaderPageMissing {
                page: entry.header.index,
            },
        )?;
        let fits = u32::try_from(entry.header.offset)
            .ok()
            .and_then(|offset| offset.checked_add(entry.header_size))
            .is_some_and(|end| end <= page_size);
        if !fits {
            return Err(DirectoryIssue::HeaderOutOfBounds {
                page: entry.header.index,
                offset: entry.header.offset,
                size: entry.header_size,
                page_size,
            });
        }
    }

    if !entry.data.is_null() {
        let page_size = page_size(descriptors, entry.data).ok_or(
            DirectoryIssue::DataPageMissing {
                page: entry.data.index,
            },
        )?;
        let fits = u32::try_from(entry.data.offset).is_ok_and(|offset| offset <= page_size);
        if !fits {
            return Err(DirectoryIssue::DataOutOfBounds {
                page: entry.data.index,
                offset: entry.data.offset,
                page_size,
            });
        }
    }

    Ok(())
}

/// Catalog of a container's assets
///
/// Keeps container order for listing and a GUID index for cross-references.
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    entries: Vec<AssetEntry>,
    by_guid: HashMap<u64, usize>,
}

impl AssetCatalog {
    /// Read the directory of `store` into a catalog
    pub fn read(store: &PageStore) -> Self {
        Self::from_entries(read_directory(store))
    }

    /// Build a catalog from entries in container order
    ///
    /// When GUIDs repeat, lookups return the first occurrence.
    pub fn from_entries(entries: Vec<AssetEntry>) -> Self {
        let mut by_guid = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            if by_guid.contains_key(&entry.guid) {
                warn!("duplicate asset guid {:016X} at entry {position}", entry.guid);
                continue;
            }
            by_guid.insert(entry.guid, position);
        }
        Self { entries, by_guid }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in container order
    pub fn entries(&self) -> &[AssetEntry] {
        &self.entries
    }

    /// Iterate entries in container order
    pub fn iter(&self) -> impl Iterator<Item = &AssetEntry> {
        self.entries.iter()
    }

    /// Look up an entry by GUID
    pub fn get(&self, guid: u64) -> Option<&AssetEntry> {
        self.by_guid.get(&guid).and_then(|&i| self.entries.get(i))
    }

    /// Entry at a directory position
    pub fn by_index(&self, index: usize) -> Option<&AssetEntry> {
        self.entries.get(index)
    }

    /// Entries of one type, in container order
    pub fn of_type(&self, asset_type: AssetType) -> impl Iterator<Item = &AssetEntry> {
        self.entries
            .iter()
            .filter(move |e| e.asset_type == asset_type)
    }

    /// Number of entries marked invalid
    pub fn invalid_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.validity.is_valid()).count()
    }
}

impl<'a> IntoIterator for &'a AssetCatalog {
    type Item = &'a AssetEntry;
    type IntoIter = std::slice::Iter<'a, AssetEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::{ContainerBuilder, TestAsset};

    #[test]
    fn test_entries_in_container_order() {
        let store = ContainerBuilder::new()
            .page(vec![0; 64])
            .asset(TestAsset::new(0x30, b"dtbl", 1).header(PagePtr::new(0, 0), 32))
            .asset(TestAsset::new(0x10, b"stlt", 0).header(PagePtr::new(0, 32), 16))
            .asset(TestAsset::new(0x20, b"txtr", 8).header(PagePtr::new(0, 8), 8))
            .build_store();

        let catalog = AssetCatalog::read(&store);
        assert_eq!(catalog.len(), 3);
        let guids: Vec<u64> = catalog.iter().map(|e| e.guid).collect();
        assert_eq!(guids, vec![0x30, 0x10, 0x20]);
        assert_eq!(catalog.get(0x10).unwrap().asset_type, AssetType::SettingsLayout);
        assert_eq!(catalog.get(0x20).unwrap().index, 2);
        assert!(catalog.get(0x99).is_none());
        assert_eq!(catalog.of_type(AssetType::DataTable).count(), 1);
        assert_eq!(catalog.invalid_count(), 0);
    }

    #[test]
    fn test_malformed_entries_retained() {
        let store = ContainerBuilder::new()
            .page(vec![0; 32])
            .asset(TestAsset::new(1, b"dtbl", 1).header(PagePtr::new(5, 0), 32))
            .asset(TestAsset::new(2, b"dtbl", 1).header(PagePtr::new(0, 16), 32))
            .asset(
                TestAsset::new(3, b"txtr", 8)
                    .header(PagePtr::new(0, 0), 16)
                    .data(PagePtr::new(0, 64)),
            )
            .asset(
                TestAsset::new(4, b"txtr", 8)
                    .header(PagePtr::new(0, 0), 16)
                    .data(PagePtr::new(2, 0)),
            )
            .asset(TestAsset::new(5, b"dtbl", 1).header(PagePtr::new(0, 0), 32))
            .build_store();

        let catalog = AssetCatalog::read(&store);
        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.invalid_count(), 4);
        assert_eq!(
            catalog.get(1).unwrap().validity,
            EntryValidity::Invalid(DirectoryIssue::HeaderPageMissing { page: 5 })
        );
        assert!(matches!(
            catalog.get(2).unwrap().validity,
            EntryValidity::Invalid(DirectoryIssue::HeaderOutOfBounds { .. })
        ));
        assert!(matches!(
            catalog.get(3).unwrap().validity,
            EntryValidity::Invalid(DirectoryIssue::DataOutOfBounds { .. })
        ));
        assert_eq!(
            catalog.get(4).unwrap().validity,
            EntryValidity::Invalid(DirectoryIssue::DataPageMissing { page: 2 })
        );
        assert!(catalog.get(5).unwrap().validity.is_valid());
    }

    #[test]
    fn test_created_time_per_version() {
        let v8 = ContainerBuilder::new()
            .created_time(111)
            .page(vec![0; 16])
            .asset(
                TestAsset::new(1, b"dtbl", 1)
                    .header(PagePtr::new(0, 0), 16)
                    .created(222),
            )
            .build_store();
        assert_eq!(read_directory(&v8)[0].created_time, 222);

        let v7 = ContainerBuilder::new()
            .version(7)
            .created_time(111)
            .page(vec![0; 16])
            .asset(
                TestAsset::new(1, b"dtbl", 1)
                    .header(PagePtr::new(0, 0), 16)
                    .created(222),
            )
            .build_store();
        let entries = read_directory(&v7);
        assert_eq!(entries[0].created_time, 111);
        assert_eq!(entries[0].guid, 1);
    }

    #[test]
    fn test_duplicate_guid_first_wins() {
        let store = ContainerBuilder::new()
            .page(vec![0; 16])
            .asset(TestAsset::new(7, b"dtbl", 1).header(PagePtr::new(0, 0), 8))
            .asset(TestAsset::new(7, b"stlt", 0).header(PagePtr::new(0, 0), 8))
            .build_store();
        let catalog = AssetCatalog::read(&store);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get(7).unwrap().asset_type, AssetType::DataTable);
    }

    #[test]
    fn test_dependency_counts_preserved() {
        let store = ContainerBuilder::new()
            .page(vec![0; 16])
            .asset(
                TestAsset::new(9, b"matl", 3)
                    .header(PagePtr::new(0, 0), 8)
                    .dependencies(4, 2),
            )
            .build_store();
        let entry = &read_directory(&store)[0];
        assert_eq!(entry.dependency_count, 4);
        assert_eq!(entry.dependent_count, 2);
        assert_eq!(entry.asset_type, AssetType::Material);
    }
}
