//! Configuration for opening and decoding containers

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::limits;

/// Caps applied while decoding records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeLimits {
    /// Data table rows materialized per table
    pub max_table_rows: usize,

    /// Elements decoded per settings array
    pub max_array_elements: usize,

    /// Nesting depth for arrays of records
    pub max_nesting_depth: usize,

    /// Entries and array elements decoded per settings asset, all levels
    /// together
    pub max_settings_entries: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_table_rows: limits::MAX_TABLE_ROWS,
            max_array_elements: limits::MAX_ARRAY_ELEMENTS,
            max_nesting_depth: limits::MAX_NESTING_DEPTH,
            max_settings_entries: limits::MAX_SETTINGS_ENTRIES,
        }
    }
}

/// Configuration for [`crate::PakFile`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PakConfig {
    /// Decoder caps
    pub limits: DecodeLimits,

    /// Open the sibling stream files named in the container
    pub open_streams: bool,

    /// Look for stream files here instead of next to the container
    pub stream_dir: Option<PathBuf>,
}

impl Default for PakConfig {
    fn default() -> Self {
        Self {
            limits: DecodeLimits::default(),
            open_streams: true,
            stream_dir: None,
        }
    }
}

impl PakConfig {
    /// Set the number of data table rows to materialize
    #[must_use]
    pub const fn with_max_table_rows(mut self, rows: usize) -> Self {
        self.limits.max_table_rows = rows;
        self
    }

    /// Set the number of elements decoded per settings array
    #[must_use]
    pub const fn with_max_array_elements(mut self, elements: usize) -> Self {
        self.limits.max_array_elements = elements;
        self
    }

    /// Enable or disable opening stream files
    #[must_use]
    pub const fn with_streams(mut self, enable: bool) -> Self {
        self.open_streams = enable;
        self
    }

    /// Look for stream files in `dir`
    #[must_use]
    pub fn with_stream_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.stream_dir = Some(dir.as_ref().to_path_buf());
        self
    }
}
