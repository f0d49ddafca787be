//! Settings layouts (`stlt`)
//!
//! A layout is the schema for settings values: named, typed fields at byte
//! offsets inside a value buffer. Fields are reached through a bucket map
//! whose slots index into the field data table. Array fields describe their
//! elements with a sub-layout; sub-layout headers follow each other at a
//! separate pointer and have the same shape as the top-level header.

use binrw::{BinRead, BinWrite};
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, warn};

use super::{DecodeContext, DecodeError, DecodeResult, unsupported};
use crate::directory::AssetEntry;
use crate::limits::{MAX_LAYOUT_NODES, MAX_PLAUSIBLE_FIELD_COUNT, MAX_SUB_LAYOUTS};
use crate::page::PageStore;
use crate::pointer::PagePtr;
use crate::reader;

/// Size of a layout header
pub const LAYOUT_HEADER_SIZE: usize = 72;

/// Size of a bucket map slot
pub const BUCKET_SLOT_SIZE: usize = 4;

/// Size of a field data slot
pub const FIELD_SLOT_SIZE: usize = 8;

/// Mask for the value offset in a packed field slot
const VALUE_OFFSET_MASK: u32 = 0x00FF_FFFF;

/// Layout header, shared by top-level layouts and sub-layouts
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct LayoutHeader {
    /// Layout name
    pub name: PagePtr,
    /// Field data table
    pub field_data: PagePtr,
    /// Bucket map
    pub bucket_map: PagePtr,
    /// Number of bucket map slots
    pub hash_table_size: u32,
    /// Number of fields
    pub field_count: u32,
    /// Probe step scale of the field hash
    pub hash_step_scale: u32,
    /// Seed of the field hash
    pub hash_seed: u32,
    /// Element count for static arrays using this layout
    pub array_value_count: u32,
    /// Size of a value buffer, which is also the array element size
    pub value_buffer_size: u32,
    /// Field names and help text
    pub string_table: PagePtr,
    /// First sub-layout header
    pub sub_layouts: PagePtr,
    /// Size of trailing extra data
    pub extra_data_size: u32,
    /// Unused
    pub reserved: u32,
}

/// Bucket map slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct BucketSlot {
    /// Field data slot index
    pub bucket: u16,
    /// Help text offset in the string table, zero for none
    pub help_text: u16,
}

/// Field data slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct FieldSlot {
    /// Raw field type
    pub field_type: u16,
    /// Name offset in the string table
    pub name: u16,
    /// Value offset (low 24 bits) and sub-layout index (high 8 bits)
    pub packed: u32,
}

impl FieldSlot {
    /// Offset of the value inside the value buffer
    pub const fn value_offset(self) -> u32 {
        self.packed & VALUE_OFFSET_MASK
    }

    /// Sub-layout describing array elements
    pub const fn sub_layout(self) -> u8 {
        (self.packed >> 24) as u8
    }
}

/// Type of a settings field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SettingsFieldType {
    /// One byte, non-zero is true
    Bool,
    /// `i32`
    Int,
    /// `f32`
    Float,
    /// Two `f32`
    Float2,
    /// Three `f32`
    Float3,
    /// Pointer to a string
    String,
    /// Pointer to an asset path
    Asset,
    /// Pointer to an asset path that is not precached
    AssetNoPrecache,
    /// Inline array, element count from the sub-layout
    StaticArray,
    /// Count and offset of an out-of-line array
    DynamicArray,
    /// Type code this crate does not know
    Unknown(u16),
}

impl SettingsFieldType {
    /// Classify a raw type code
    pub const fn from_raw(raw: u16) -> Self {
        match raw {
            0 => Self::Bool,
            1 => Self::Int,
            2 => Self::Float,
            3 => Self::Float2,
            4 => Self::Float3,
            5 => Self::String,
            6 => Self::Asset,
            7 => Self::AssetNoPrecache,
            8 => Self::StaticArray,
            9 => Self::DynamicArray,
            other => Self::Unknown(other),
        }
    }

    /// Bytes the field occupies in its value buffer
    ///
    /// `None` for static arrays, whose size depends on the sub-layout.
    pub const fn inline_size(self) -> Option<usize> {
        match self {
            Self::Bool => Some(1),
            Self::Int | Self::Float => Some(4),
            Self::Float2
            | Self::String
            | Self::Asset
            | Self::AssetNoPrecache
            | Self::DynamicArray => Some(8),
            Self::Float3 => Some(12),
            Self::StaticArray | Self::Unknown(_) => None,
        }
    }
}

/// One field of a layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsField {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: SettingsFieldType,
    /// Offset of the value in the value buffer
    pub offset: u32,
    /// Sub-layout describing array elements
    pub sub_layout: u8,
    /// Help text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
}

/// A decoded layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsLayout {
    /// Layout name, when it resolves
    pub name: Option<String>,
    /// Declared field count
    pub field_count: u32,
    /// Number of bucket map slots
    pub hash_table_size: u32,
    /// Probe step scale of the field hash
    pub hash_step_scale: u32,
    /// Seed of the field hash
    pub hash_seed: u32,
    /// Element count for static arrays using this layout
    pub array_value_count: u32,
    /// Size of one value buffer
    pub value_buffer_size: u32,
    /// Size of trailing extra data
    pub extra_data_size: u32,
    /// Fields sorted by offset
    pub fields: Vec<SettingsField>,
    /// Sub-layouts, indexed by [`SettingsField::sub_layout`]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_layouts: Vec<SettingsLayout>,
}

impl SettingsLayout {
    /// Field named `name`
    pub fn field(&self, name: &str) -> Option<&SettingsField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Sub-layout at `index`
    pub fn sub_layout(&self, index: u8) -> Option<&Self> {
        self.sub_layouts.get(index as usize)
    }

    fn with_fields(header: &LayoutHeader, name: Option<String>, fields: Vec<SettingsField>) -> Self {
        Self {
            name,
            field_count: header.field_count,
            hash_table_size: header.hash_table_size,
            hash_step_scale: header.hash_step_scale,
            hash_seed: header.hash_seed,
            array_value_count: header.array_value_count,
            value_buffer_size: header.value_buffer_size,
            extra_data_size: header.extra_data_size,
            fields,
            sub_layouts: Vec::new(),
        }
    }
}

fn read_name(store: &PageStore, ptr: PagePtr) -> Option<String> {
    let tail = store.resolve(ptr)?;
    reader::read_cstring(&tail, 0).ok()
}

/// Resolve the field list of one header
fn read_fields(store: &PageStore, header: &LayoutHeader) -> DecodeResult<Vec<SettingsField>> {
    if header.field_count == 0 {
        return Ok(Vec::new());
    }
    let section = |ptr: PagePtr, what: &'static str| {
        store
            .resolve(ptr)
            .ok_or(DecodeError::MissingSection(what))
    };
    let buckets: Bytes = section(header.bucket_map, "bucket map")?;
    let slots: Bytes = section(header.field_data, "field data")?;
    let strings: Bytes = section(header.string_table, "string table")?;

    let count = header.field_count.min(MAX_PLAUSIBLE_FIELD_COUNT) as usize;
    let mut fields = Vec::with_capacity(count);
    for i in 0..count {
        let bucket = match reader::read_indexed::<BucketSlot>(&buckets, i, BUCKET_SLOT_SIZE) {
            Ok(bucket) => bucket,
            Err(e) => {
                debug!("bucket slot {i}: {e}");
                continue;
            }
        };
        let slot = match reader::read_indexed::<FieldSlot>(
            &slots,
            bucket.bucket as usize,
            FIELD_SLOT_SIZE,
        ) {
            Ok(slot) => slot,
            Err(e) => {
                debug!("field slot {}: {e}", bucket.bucket);
                continue;
            }
        };

        let name = reader::read_cstring(&strings, slot.name as usize).unwrap_or_default();
        if name.is_empty() {
            continue;
        }
        let help_text = match bucket.help_text {
            0 => None,
            offset => reader::read_cstring(&strings, offset as usize)
                .ok()
                .filter(|text| !text.is_empty()),
        };

        fields.push(SettingsField {
            name,
            field_type: SettingsFieldType::from_raw(slot.field_type),
            offset: slot.value_offset(),
            sub_layout: slot.sub_layout(),
            help_text,
        });
    }

    // Stable, so fields sharing an offset keep bucket order
    fields.sort_by_key(|f| f.offset);
    Ok(fields)
}

/// Walk over nested sub-layout runs
///
/// Every decoded header spends one unit of a budget shared by all levels, and
/// a run already being walked further up is not entered again.
struct SubLayoutWalk<'a> {
    store: &'a PageStore,
    remaining: usize,
    path: Vec<PagePtr>,
}

impl<'a> SubLayoutWalk<'a> {
    fn new(store: &'a PageStore) -> Self {
        Self {
            store,
            remaining: MAX_LAYOUT_NODES,
            path: Vec::new(),
        }
    }

    /// Read the run of sub-layout headers starting at `ptr`
    fn run(&mut self, ptr: PagePtr, depth: usize) -> Vec<SettingsLayout> {
        if self.path.contains(&ptr) {
            debug!("sub-layout run at {ptr} is already being read, skipping");
            return Vec::new();
        }
        let Some(run) = self.store.resolve(ptr) else {
            return Vec::new();
        };

        self.path.push(ptr);
        let mut layouts = Vec::new();
        for index in 0..MAX_SUB_LAYOUTS {
            let Ok(header) = reader::read_indexed::<LayoutHeader>(&run, index, LAYOUT_HEADER_SIZE)
            else {
                break;
            };
            if header.field_count == 0 || header.field_count > MAX_PLAUSIBLE_FIELD_COUNT {
                break;
            }
            if self.remaining == 0 {
                warn!("more than {MAX_LAYOUT_NODES} sub-layouts, ignoring the rest");
                break;
            }
            self.remaining -= 1;

            let fields = read_fields(self.store, &header).unwrap_or_else(|e| {
                warn!("sub-layout {index}: {e}");
                Vec::new()
            });
            let mut layout =
                SettingsLayout::with_fields(&header, read_name(self.store, header.name), fields);
            if depth > 0 {
                layout.sub_layouts = self.run(header.sub_layouts, depth - 1);
            }
            layouts.push(layout);
        }
        self.path.pop();
        layouts
    }
}

/// Decode a layout from its header bytes
///
/// Sub-layouts nest at most `max_depth` levels.
pub fn decode_header(
    store: &PageStore,
    header: &[u8],
    max_depth: usize,
) -> DecodeResult<SettingsLayout> {
    let header = reader::read_struct::<LayoutHeader>(header, 0)?;
    let fields = read_fields(store, &header)?;
    let mut layout = SettingsLayout::with_fields(&header, read_name(store, header.name), fields);
    layout.sub_layouts = SubLayoutWalk::new(store).run(header.sub_layouts, max_depth);
    Ok(layout)
}

/// Decode an `stlt` asset
pub fn decode(ctx: &DecodeContext<'_>, entry: &AssetEntry) -> DecodeResult<SettingsLayout> {
    if entry.version > 1 {
        return Err(unsupported(entry));
    }
    let header = ctx.header(entry)?;
    decode_header(ctx.store, &header, ctx.limits.max_nesting_depth)
}
