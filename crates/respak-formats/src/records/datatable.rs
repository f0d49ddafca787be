//! Data tables (`dtbl`)
//!
//! A table is a column descriptor array plus a row array of fixed stride.
//! Each column names a type and the byte offset of its cell inside a row.
//! String and asset cells hold a page pointer to a NUL-terminated string.

use binrw::{BinRead, BinWrite};
use serde::Serialize;
use tracing::warn;

use super::{DecodeContext, DecodeError, DecodeResult, unsupported};
use crate::directory::AssetEntry;
use crate::limits::{MAX_TABLE_COLUMNS, MAX_TABLE_ROWS};
use crate::page::PageStore;
use crate::pointer::PagePtr;
use crate::reader::{self, ReadResult};

/// Start of the window in which version 1 tables use wide column descriptors
///
/// Windows FILETIME.
pub const WIDE_COLUMN_LAYOUT_INTRODUCED: u64 = 132_566_976_000_000_000;

/// End of that window; later version 1 tables are compact again
pub const WIDE_COLUMN_LAYOUT_RETIRED: u64 = 132_645_600_000_000_000;

/// Table header of versions 0 and 1 (32 bytes)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct DataTableHeaderV1 {
    /// Column count
    pub num_columns: u32,
    /// Row count
    pub num_rows: u32,
    /// Column descriptor array
    pub columns: PagePtr,
    /// Row array
    pub rows: PagePtr,
    /// Bytes per row
    pub row_stride: u32,
    /// Padding
    pub reserved: u32,
}

/// Table header of version 2 (40 bytes)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct DataTableHeaderV2 {
    /// Column count
    pub num_columns: u32,
    /// Row count
    pub num_rows: u32,
    /// Table flags
    pub flags: u8,
    /// Padding
    pub reserved0: [u8; 7],
    /// Column descriptor array
    pub columns: PagePtr,
    /// Row array
    pub rows: PagePtr,
    /// Bytes per row
    pub row_stride: u32,
    /// Padding
    pub reserved1: u32,
}

/// Fields common to both header shapes
#[derive(Debug, Clone, Copy)]
struct TableShape {
    num_columns: u32,
    num_rows: u32,
    flags: Option<u8>,
    columns: PagePtr,
    rows: PagePtr,
    row_stride: u32,
}

impl From<DataTableHeaderV1> for TableShape {
    fn from(h: DataTableHeaderV1) -> Self {
        Self {
            num_columns: h.num_columns,
            num_rows: h.num_rows,
            flags: None,
            columns: h.columns,
            rows: h.rows,
            row_stride: h.row_stride,
        }
    }
}

impl From<DataTableHeaderV2> for TableShape {
    fn from(h: DataTableHeaderV2) -> Self {
        Self {
            num_columns: h.num_columns,
            num_rows: h.num_rows,
            flags: Some(h.flags),
            columns: h.columns,
            rows: h.rows,
            row_stride: h.row_stride,
        }
    }
}

/// Column descriptor without the reserved word (16 bytes)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct CompactColumn {
    /// Column name
    pub name: PagePtr,
    /// Raw column type
    pub column_type: u32,
    /// Offset of the cell inside a row
    pub row_offset: u32,
}

/// Column descriptor with a reserved word after the name (24 bytes)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct WideColumn {
    /// Column name
    pub name: PagePtr,
    /// Unused
    pub reserved: u64,
    /// Raw column type
    pub column_type: u32,
    /// Offset of the cell inside a row
    pub row_offset: u32,
}

/// Column descriptor shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnLayout {
    /// 16-byte descriptors
    Compact,
    /// 24-byte descriptors
    Wide,
}

impl ColumnLayout {
    /// Pick the descriptor shape for a table
    ///
    /// Only version 1 tables created strictly inside the wide window use
    /// 24-byte descriptors. Tables before and after it are compact.
    pub const fn select(version: u32, created_time: u64) -> Self {
        if version == 1
            && created_time > WIDE_COLUMN_LAYOUT_INTRODUCED
            && created_time < WIDE_COLUMN_LAYOUT_RETIRED
        {
            Self::Wide
        } else {
            Self::Compact
        }
    }

    /// Bytes per column descriptor
    pub const fn descriptor_size(self) -> usize {
        match self {
            Self::Compact => 16,
            Self::Wide => 24,
        }
    }

    fn read(self, data: &[u8], index: usize) -> ReadResult<(PagePtr, u32, u32)> {
        match self {
            Self::Compact => reader::read_indexed::<CompactColumn>(data, index, 16)
                .map(|c| (c.name, c.column_type, c.row_offset)),
            Self::Wide => reader::read_indexed::<WideColumn>(data, index, 24)
                .map(|c| (c.name, c.column_type, c.row_offset)),
        }
    }
}

/// Cell type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnType {
    /// 4-byte boolean
    Bool,
    /// `i32`
    Int,
    /// `f32`
    Float,
    /// Three `f32`
    Vector,
    /// Pointer to a string
    String,
    /// Pointer to an asset path
    Asset,
    /// Pointer to an asset path that is not precached
    AssetNoPrecache,
    /// Type code this crate does not know
    Unknown(u32),
}

impl ColumnType {
    /// Classify a raw type code
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Bool,
            1 => Self::Int,
            2 => Self::Float,
            3 => Self::Vector,
            4 => Self::String,
            5 => Self::Asset,
            6 => Self::AssetNoPrecache,
            other => Self::Unknown(other),
        }
    }

    /// Bytes a cell of this type occupies in a row
    pub const fn width(self) -> Option<usize> {
        match self {
            Self::Bool | Self::Int | Self::Float => Some(4),
            Self::Vector => Some(12),
            Self::String | Self::Asset | Self::AssetNoPrecache => Some(8),
            Self::Unknown(_) => None,
        }
    }
}

/// One column of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataTableColumn {
    /// Column name, when it resolves
    pub name: Option<String>,
    /// Cell type
    pub column_type: ColumnType,
    /// Offset of the cell inside a row
    pub row_offset: u32,
}

/// One cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DataTableValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// Three-component vector
    Vector([f32; 3]),
    /// String, `None` when the pointer does not resolve
    String(Option<String>),
    /// Asset path
    Asset(Option<String>),
    /// Asset path, not precached
    AssetNoPrecache(Option<String>),
    /// Column of unknown type; the cell is not interpreted
    Unknown(u32),
    /// Cell lies outside the row data
    Missing,
}

/// A decoded data table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataTable {
    /// Asset version
    pub version: u32,
    /// Column descriptor shape that was used
    pub layout: ColumnLayout,
    /// Version 2 flags
    pub flags: Option<u8>,
    /// Declared column count
    pub num_columns: u32,
    /// Declared row count
    pub num_rows: u32,
    /// Bytes per row
    pub row_stride: u32,
    /// Columns that could be read
    pub columns: Vec<DataTableColumn>,
    /// Materialized rows, at most the configured row cap
    pub rows: Vec<Vec<DataTableValue>>,
}

impl DataTable {
    /// Whether fewer rows were materialized than declared
    pub fn is_truncated(&self) -> bool {
        self.rows.len() < self.num_rows as usize
    }

    /// Position of the first column named `name`
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.as_deref() == Some(name))
    }

    /// Cell at `row`, `column`
    pub fn cell(&self, row: usize, column: usize) -> Option<&DataTableValue> {
        self.rows.get(row).and_then(|r| r.get(column))
    }
}

fn read_header(entry: &AssetEntry, header: &[u8]) -> DecodeResult<TableShape> {
    match entry.version {
        0 | 1 => Ok(reader::read_struct::<DataTableHeaderV1>(header, 0)?.into()),
        2 => Ok(reader::read_struct::<DataTableHeaderV2>(header, 0)?.into()),
        _ => Err(unsupported(entry)),
    }
}

fn read_string(store: &PageStore, ptr: PagePtr) -> Option<String> {
    let tail = store.resolve(ptr)?;
    reader::read_cstring(&tail, 0).ok()
}

fn read_cell(
    store: &PageStore,
    rows: &[u8],
    offset: usize,
    column_type: ColumnType,
) -> ReadResult<DataTableValue> {
    let string = |offset: usize| -> ReadResult<Option<String>> {
        let ptr = reader::read_struct::<PagePtr>(rows, offset)?;
        Ok(read_string(store, ptr))
    };
    Ok(match column_type {
        ColumnType::Bool => DataTableValue::Bool(reader::read_u32(rows, offset)? != 0),
        ColumnType::Int => DataTableValue::Int(reader::read_i32(rows, offset)?),
        ColumnType::Float => DataTableValue::Float(reader::read_f32(rows, offset)?),
        ColumnType::Vector => DataTableValue::Vector(reader::read_f32_array::<3>(rows, offset)?),
        ColumnType::String => DataTableValue::String(string(offset)?),
        ColumnType::Asset => DataTableValue::Asset(string(offset)?),
        ColumnType::AssetNoPrecache => DataTableValue::AssetNoPrecache(string(offset)?),
        ColumnType::Unknown(raw) => DataTableValue::Unknown(raw),
    })
}

/// Decode a `dtbl` asset
pub fn decode(ctx: &DecodeContext<'_>, entry: &AssetEntry) -> DecodeResult<DataTable> {
    let header = ctx.header(entry)?;
    let shape = read_header(entry, &header)?;
    let layout = ColumnLayout::select(entry.version, entry.created_time);

    let mut columns = Vec::new();
    if shape.num_columns > 0 {
        let descriptors = ctx
            .store
            .resolve(shape.columns)
            .ok_or(DecodeError::MissingSection("column descriptors"))?;
        let wanted = (shape.num_columns as usize).min(MAX_TABLE_COLUMNS);
        if wanted < shape.num_columns as usize {
            warn!(
                "table {:016X} declares {} columns, reading {wanted}",
                entry.guid, shape.num_columns
            );
        }
        for index in 0..wanted {
            match layout.read(&descriptors, index) {
                Ok((name, column_type, row_offset)) => columns.push(DataTableColumn {
                    name: read_string(ctx.store, name),
                    column_type: ColumnType::from_raw(column_type),
                    row_offset,
                }),
                Err(e) => {
                    warn!("table {:016X} column {index}: {e}", entry.guid);
                    break;
                }
            }
        }
    }

    let row_count = (shape.num_rows as usize).min(ctx.limits.max_table_rows);
    // max_table_rows is caller supplied; only the default sizes the hint
    let mut rows = Vec::with_capacity(row_count.min(MAX_TABLE_ROWS));
    if row_count > 0 && !columns.is_empty() {
        let row_data = ctx
            .store
            .resolve(shape.rows)
            .ok_or(DecodeError::MissingSection("rows"))?;
        let stride = shape.row_stride as usize;
        for row in 0..row_count {
            let row_start = row * stride;
            let cells = columns
                .iter()
                .map(|column| {
                    row_start
                        .checked_add(column.row_offset as usize)
                        .and_then(|offset| {
                            read_cell(ctx.store, &row_data, offset, column.column_type).ok()
                        })
                        .unwrap_or(DataTableValue::Missing)
                })
                .collect();
            rows.push(cells);
        }
    }

    Ok(DataTable {
        version: entry.version,
        layout,
        flags: shape.flags,
        num_columns: shape.num_columns,
        num_rows: shape.num_rows,
        row_stride: shape.row_stride,
        columns,
        rows,
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::DecodeLimits;
    use crate::directory::AssetCatalog;
    use crate::test_utils::{ContainerBuilder, PageBuf, TestAsset, to_bytes};

    const INSIDE_WINDOW: u64 = WIDE_COLUMN_LAYOUT_INTRODUCED + 1;

    fn column(name: i32, column_type: u32, row_offset: u32) -> CompactColumn {
        CompactColumn {
            name: PagePtr::new(0, name),
            column_type,
            row_offset,
        }
    }

    /// Page 0 holds header, columns, strings and an int+string row array
    fn int_string_table(version: u32, created: u64, rows: u32) -> ContainerBuilder {
        let mut page = PageBuf::new();
        let header_at = page.reserve(32);
        let id_name = page.push_cstr("id");
        let label_name = page.push_cstr("label");
        let labels: Vec<i32> = ["zero", "one", "two"]
            .iter()
            .map(|s| page.push_cstr(s))
            .collect();
        page.align(8);

        let columns_at = if ColumnLayout::select(version, created) == ColumnLayout::Wide {
            let at = page.offset();
            for (name, ty, off) in [(id_name, 1, 0), (label_name, 4, 4)] {
                page.push_struct(&WideColumn {
                    name: PagePtr::new(0, name),
                    reserved: 0,
                    column_type: ty,
                    row_offset: off,
                });
            }
            at
        } else {
            let at = page.push_struct(&column(id_name, 1, 0));
            page.push_struct(&column(label_name, 4, 4));
            at
        };

        let rows_at = page.offset();
        for (i, label) in labels.iter().enumerate() {
            page.push(&(100 + i as i32).to_le_bytes());
            page.push_struct(&PagePtr::new(0, *label));
        }

        let header = DataTableHeaderV1 {
            num_columns: 2,
            num_rows: rows,
            columns: PagePtr::new(0, columns_at),
            rows: PagePtr::new(0, rows_at),
            row_stride: 12,
            reserved: 0,
        };
        page.write_at(header_at, &to_bytes(&header));

        ContainerBuilder::new().page(page.into_bytes()).asset(
            TestAsset::new(0xD7B1, b"dtbl", version)
                .header(PagePtr::new(0, header_at), 32)
                .created(created),
        )
    }

    fn decode_first(builder: &ContainerBuilder, limits: DecodeLimits) -> DecodeResult<DataTable> {
        let store = builder.build_store();
        let catalog = AssetCatalog::read(&store);
        let ctx = DecodeContext::new(&store, &catalog, limits);
        decode(&ctx, &catalog.entries()[0])
    }

    #[test]
    fn test_layout_selection() {
        assert_eq!(ColumnLayout::select(1, INSIDE_WINDOW), ColumnLayout::Wide);
        assert_eq!(ColumnLayout::select(1, INSIDE_WINDOW).descriptor_size(), 24);
        assert_eq!(
            ColumnLayout::select(1, WIDE_COLUMN_LAYOUT_INTRODUCED),
            ColumnLayout::Compact
        );
        assert_eq!(
            ColumnLayout::select(1, WIDE_COLUMN_LAYOUT_RETIRED),
            ColumnLayout::Compact
        );
        assert_eq!(
            ColumnLayout::select(1, WIDE_COLUMN_LAYOUT_RETIRED + 1),
            ColumnLayout::Compact
        );
        assert_eq!(ColumnLayout::select(0, INSIDE_WINDOW), ColumnLayout::Compact);
        assert_eq!(ColumnLayout::select(2, INSIDE_WINDOW), ColumnLayout::Compact);
        assert_eq!(ColumnLayout::Compact.descriptor_size(), 16);
    }

    #[test]
    fn test_column_widths() {
        let widths: Vec<_> = (0..7).map(|raw| ColumnType::from_raw(raw).width()).collect();
        assert_eq!(
            widths,
            vec![Some(4), Some(4), Some(4), Some(12), Some(8), Some(8), Some(8)]
        );
        assert_eq!(ColumnType::from_raw(99), ColumnType::Unknown(99));
        assert_eq!(ColumnType::Unknown(99).width(), None);
    }

    #[test]
    fn test_int_string_rows() {
        let table = decode_first(&int_string_table(1, 0, 3), DecodeLimits::default()).unwrap();
        assert_eq!(table.layout, ColumnLayout::Compact);
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.columns[1].name.as_deref(), Some("label"));
        assert_eq!(table.columns[1].column_type, ColumnType::String);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(
            table.rows[1],
            vec![
                DataTableValue::Int(101),
                DataTableValue::String(Some("one".to_string()))
            ]
        );
        assert_eq!(table.column_index("label"), Some(1));
        assert_eq!(table.cell(2, 0), Some(&DataTableValue::Int(102)));
        assert!(!table.is_truncated());
    }

    #[test]
    fn test_wide_descriptors_in_window() {
        let table =
            decode_first(&int_string_table(1, INSIDE_WINDOW, 3), DecodeLimits::default()).unwrap();
        assert_eq!(table.layout, ColumnLayout::Wide);
        assert_eq!(table.columns[0].name.as_deref(), Some("id"));
        assert_eq!(
            table.rows[2][1],
            DataTableValue::String(Some("two".to_string()))
        );
    }

    #[test]
    fn test_row_cap_preserves_declared_count() {
        let limits = DecodeLimits {
            max_table_rows: 2,
            ..DecodeLimits::default()
        };
        let table = decode_first(&int_string_table(0, 0, 3), limits).unwrap();
        assert_eq!(table.num_rows, 3);
        assert_eq!(table.rows.len(), 2);
        assert!(table.is_truncated());
    }

    #[test]
    fn test_huge_row_cap_with_hostile_row_count() {
        let mut page = PageBuf::new();
        let header_at = page.push_struct(&DataTableHeaderV1 {
            num_columns: 0,
            num_rows: u32::MAX,
            columns: PagePtr::NULL,
            rows: PagePtr::NULL,
            row_stride: 4,
            reserved: 0,
        });
        let builder = ContainerBuilder::new()
            .page(page.into_bytes())
            .asset(TestAsset::new(1, b"dtbl", 0).header(PagePtr::new(0, header_at), 32));
        let limits = DecodeLimits {
            max_table_rows: usize::MAX,
            ..DecodeLimits::default()
        };

        let table = decode_first(&builder, limits).unwrap();
        assert_eq!(table.num_rows, u32::MAX);
        assert!(table.rows.is_empty());
        assert!(table.is_truncated());
    }

    #[test]
    fn test_rows_past_page_end_are_missing() {
        // Five rows declared, three present: the last two degrade cell by cell
        let table = decode_first(&int_string_table(1, 0, 5), DecodeLimits::default()).unwrap();
        assert_eq!(table.rows.len(), 5);
        assert_eq!(
            table.rows[4],
            vec![DataTableValue::Missing, DataTableValue::Missing]
        );
        assert_eq!(table.rows[0][0], DataTableValue::Int(100));
    }

    #[test]
    fn test_version_two_header() {
        let mut page = PageBuf::new();
        let header_at = page.reserve(40);
        let name = page.push_cstr("scale");
        page.align(8);
        let columns_at = page.push_struct(&column(name, 2, 0));
        let rows_at = page.push(&1.5f32.to_le_bytes());
        let header = DataTableHeaderV2 {
            num_columns: 1,
            num_rows: 1,
            flags: 3,
            reserved0: [0; 7],
            columns: PagePtr::new(0, columns_at),
            rows: PagePtr::new(0, rows_at),
            row_stride: 4,
            reserved1: 0,
        };
        page.write_at(header_at, &to_bytes(&header));
        let builder = ContainerBuilder::new()
            .page(page.into_bytes())
            .asset(TestAsset::new(1, b"dtbl", 2).header(PagePtr::new(0, header_at), 40));

        let table = decode_first(&builder, DecodeLimits::default()).unwrap();
        assert_eq!(table.flags, Some(3));
        assert_eq!(table.rows, vec![vec![DataTableValue::Float(1.5)]]);
    }

    #[test]
    fn test_missing_rows_section() {
        let mut page = PageBuf::new();
        let header_at = page.reserve(32);
        let columns_at = page.push_struct(&column(-1, 1, 0));
        let header = DataTableHeaderV1 {
            num_columns: 1,
            num_rows: 4,
            columns: PagePtr::new(0, columns_at),
            rows: PagePtr::NULL,
            row_stride: 4,
            reserved: 0,
        };
        page.write_at(header_at, &to_bytes(&header));
        let builder = ContainerBuilder::new()
            .page(page.into_bytes())
            .asset(TestAsset::new(1, b"dtbl", 1).header(PagePtr::new(0, header_at), 32));

        assert_eq!(
            decode_first(&builder, DecodeLimits::default()),
            Err(DecodeError::MissingSection("rows"))
        );
    }
}
