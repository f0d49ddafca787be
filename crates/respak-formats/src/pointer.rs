//! Page references and their resolution
//!
//! A [`PagePtr`] is the 8-byte `(page index, byte offset)` pair used by every
//! record layout. Pointers are never followed eagerly; resolution happens on
//! demand against a [`PageStore`] and may fail without aborting the caller.

use binrw::{BinRead, BinWrite};
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

use crate::page::{PageError, PageStore};

/// Size of a page reference on the wire
pub const PAGE_PTR_SIZE: usize = 8;

/// Two-field reference into a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, BinRead, BinWrite, Serialize)]
#[br(little)]
#[bw(little)]
pub struct PagePtr {
    /// Zero-based page index, negative for null
    pub index: i32,
    /// Byte offset inside the page
    pub offset: i32,
}

impl PagePtr {
    /// The canonical null reference
    pub const NULL: Self = Self {
        index: -1,
        offset: 0,
    };

    /// Create a reference
    pub const fn new(index: i32, offset: i32) -> Self {
        Self { index, offset }
    }

    /// Whether this reference denotes "absent"
    pub const fn is_null(self) -> bool {
        self.index < 0
    }

    /// Same page, offset moved by `delta` bytes
    pub fn advanced(self, delta: usize) -> Option<Self> {
        let delta = i32::try_from(delta).ok()?;
        Some(Self {
            index: self.index,
            offset: self.offset.checked_add(delta)?,
        })
    }
}

impl std::fmt::Display for PagePtr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "{}:0x{:X}", self.index, self.offset)
        }
    }
}

/// Why a pointer could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The pointer is null
    #[error("null page reference")]
    Null,

    /// The page index is not in the page directory
    #[error("page {index} does not exist ({count} pages)")]
    MissingPage {
        /// Requested page
        index: i32,
        /// Pages in the container
        count: usize,
    },

    /// The page exists but could not be materialized
    #[error("page {index} unavailable: {source}")]
    PageUnavailable {
        /// Requested page
        index: i32,
        /// Materialization failure
        source: PageError,
    },

    /// Offset outside the page
    #[error("offset {offset} outside page {index} of {len} bytes")]
    OutOfBounds {
        /// Page index
        index: i32,
        /// Requested offset
        offset: i32,
        /// Page length
        len: usize,
    },
}

/// Resolve `ptr` to the tail of its page starting at the pointer's offset
///
/// Returns `None` for null pointers, missing or failed pages, and offsets
/// outside the page.
pub fn resolve(store: &PageStore, ptr: PagePtr) -> Option<Bytes> {
    store.resolve(ptr)
}

impl PageStore {
    /// Resolve a pointer, reporting why resolution failed
    pub fn try_resolve(&self, ptr: PagePtr) -> Result<Bytes, ResolveError> {
        if ptr.is_null() {
            return Err(ResolveError::Null);
        }
        let count = self.page_count();
        let index = usize::try_from(ptr.index).map_err(|_| ResolveError::Null)?;
        if index >= count {
            return Err(ResolveError::MissingPage {
                index: ptr.index,
                count,
            });
        }
        let page = self
            .try_page(index)
            .map_err(|source| ResolveError::PageUnavailable {
                index: ptr.index,
                source,
            })?;

        match usize::try_from(ptr.offset) {
            Ok(offset) if offset < page.len() => Ok(page.slice(offset..)),
            _ => Err(ResolveError::OutOfBounds {
                index: ptr.index,
                offset: ptr.offset,
                len: page.len(),
            }),
        }
    }

    /// Resolve a pointer, treating every failure as "absent"
    pub fn resolve(&self, ptr: PagePtr) -> Option<Bytes> {
        self.try_resolve(ptr).ok()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::{ContainerBuilder, single_page_store};
    use proptest::prelude::*;

    #[test]
    fn test_null_pointer() {
        let store = single_page_store(vec![1, 2, 3, 4]);
        assert!(PagePtr::NULL.is_null());
        assert_eq!(store.try_resolve(PagePtr::NULL), Err(ResolveError::Null));
        assert!(resolve(&store, PagePtr::new(-7, 0)).is_none());
    }

    #[test]
    fn test_resolve_tail_of_page() {
        let store = single_page_store(vec![10, 11, 12, 13, 14]);
        let tail = store.resolve(PagePtr::new(0, 2)).unwrap();
        assert_eq!(&tail[..], &[12, 13, 14]);
    }

    #[test]
    fn test_resolve_failures() {
        let store = single_page_store(vec![0; 8]);
        assert!(matches!(
            store.try_resolve(PagePtr::new(3, 0)),
            Err(ResolveError::MissingPage { index: 3, count: 1 })
        ));
        assert!(matches!(
            store.try_resolve(PagePtr::new(0, 8)),
            Err(ResolveError::OutOfBounds { .. })
        ));
        assert!(matches!(
            store.try_resolve(PagePtr::new(0, -1)),
            Err(ResolveError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_failed_page_resolves_to_none() {
        let store = ContainerBuilder::new()
            .corrupt_compressed_page(vec![0xAB; 16])
            .build_store();
        assert!(matches!(
            store.try_resolve(PagePtr::new(0, 0)),
            Err(ResolveError::PageUnavailable { index: 0, .. })
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(PagePtr::NULL.to_string(), "null");
        assert_eq!(PagePtr::new(2, 0x40).to_string(), "2:0x40");
    }

    proptest! {
        #[test]
        fn resolve_matches_page_tail(
            page in prop::collection::vec(any::<u8>(), 1..512),
            offset in 0i32..600,
        ) {
            let store = single_page_store(page.clone());
            let resolved = store.resolve(PagePtr::new(0, offset));
            if (offset as usize) < page.len() {
                let resolved = resolved.expect("in-range offset resolves");
                prop_assert_eq!(&resolved[..], &page[offset as usize..]);
            } else {
                prop_assert!(resolved.is_none());
            }
        }

        #[test]
        fn negative_index_is_always_null(index in i32::MIN..0, offset in any::<i32>()) {
            let store = single_page_store(vec![0; 4]);
            prop_assert!(store.resolve(PagePtr::new(index, offset)).is_none());
        }
    }
}
