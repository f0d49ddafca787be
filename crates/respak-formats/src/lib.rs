//! Decoders for paged game asset containers ("paks")
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::doc_markdown)] // Format-specific terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::float_cmp)] // Binary format requirements
#![allow(clippy::derive_partial_eq_without_eq)] // Binary format structs
#![allow(clippy::redundant_closure_for_method_calls)] // Iterator chains
//! A pak is a single binary archive split into indexed memory pages. Pages may
//! be compressed with an external codec. Every record inside the pak refers to
//! its variable-length parts through `(page, offset)` pairs, so decoding an
//! asset means walking a small pointer graph across pages.
//!
//! # Layers
//!
//! - **Compression**: [`compression::BlockDecompressor`] contract plus the
//!   native routine binding and a zlib codec
//! - **Pages**: [`page::PageStore`] materializes pages lazily, once each
//! - **Pointers**: [`pointer::PagePtr`] resolved against the page store
//! - **Directory**: [`directory::AssetCatalog`] built from the entry table
//! - **Records**: versioned decoders for data tables, settings layouts,
//!   settings values and textures in [`records`]
//! - **Streams**: [`stream::StreamSet`] range reads into sibling stream files
//!
//! # Failure model
//!
//! Only container-level problems (bad magic, unsupported version, truncated
//! directory) fail [`PakFile::open`]. Everything below that degrades locally:
//! a broken page fails alone, a malformed entry stays in the catalog marked
//! invalid, an unresolvable pointer turns one field into "absent", and a short
//! stream read becomes a zero-filled placeholder.
//!
//! # Example
//!
//! ```no_run
//! use respak_formats::{PakConfig, PakFile};
//!
//! let pak = PakFile::open("common.rpak", PakConfig::default())?;
//! for entry in pak.entries() {
//!     match pak.decode(entry) {
//!         Ok(record) => println!("{:016X} {}", entry.guid, record.kind()),
//!         Err(e) => println!("{:016X} unparseable: {e}", entry.guid),
//!     }
//! }
//! # Ok::<(), respak_formats::PakError>(())
//! ```

#![warn(missing_docs)]

pub mod compression;
pub mod config;
pub mod directory;
mod error;
pub mod limits;
mod pak;
pub mod page;
pub mod pointer;
pub mod reader;
pub mod records;
pub mod stream;

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod test_utils;

pub use config::{DecodeLimits, PakConfig};
pub use directory::{AssetCatalog, AssetEntry, AssetType, EntryValidity};
pub use error::{PakError, PakResult};
pub use pak::PakFile;
pub use page::PageStore;
pub use pointer::PagePtr;
pub use records::{DecodeError, DecodedRecord};
