//! Safety caps shared by every decoder
//!
//! Real containers include stripped and engine-internal assets whose counts
//! cannot be trusted. All loops over declared counts are bounded by one of
//! these constants.

/// Largest page a decompressor may be asked to produce (256 MiB)
pub const MAX_PAGE_SIZE: usize = 256 * 1024 * 1024;

/// Longest NUL-terminated string read from a page
pub const MAX_STRING_LENGTH: usize = 4096;

/// Data table rows materialized by default
pub const MAX_TABLE_ROWS: usize = 500;

/// Data table columns read before giving up
pub const MAX_TABLE_COLUMNS: usize = 1024;

/// Elements decoded per settings array by default
pub const MAX_ARRAY_ELEMENTS: usize = 256;

/// Nesting depth for arrays of records inside settings values
pub const MAX_NESTING_DEPTH: usize = 8;

/// Consecutive sub-layout headers read for one settings layout
pub const MAX_SUB_LAYOUTS: usize = 32;

/// Sub-layout headers decoded for one settings layout, all levels together
pub const MAX_LAYOUT_NODES: usize = 1024;

/// Entries and array elements decoded for one settings asset by default
pub const MAX_SETTINGS_ENTRIES: usize = 65_536;

/// Field counts above this mark a sub-layout header as implausible
pub const MAX_PLAUSIBLE_FIELD_COUNT: u32 = 10_000;

/// Mip levels a texture may declare
pub const MAX_MIP_LEVELS: usize = 16;

/// Largest unit the stream resolver will read or zero-fill (512 MiB)
pub const MAX_STREAM_UNIT_SIZE: u64 = 512 * 1024 * 1024;
