//! Settings values (`stgs`)
//!
//! A settings asset is a value buffer interpreted through a settings layout,
//! referenced by GUID. Arrays recurse into sub-layouts; the recursion is
//! bounded by [`DecodeLimits`](crate::DecodeLimits), both per array and in
//! total for the asset.

use binrw::{BinRead, BinWrite};
use bytes::Bytes;
use serde::Serialize;
use std::cell::Cell;
use tracing::warn;

use super::settings_layout::{self, SettingsField, SettingsFieldType, SettingsLayout};
use super::{DecodeContext, DecodeError, DecodeResult, unsupported};
use crate::config::DecodeLimits;
use crate::directory::{AssetEntry, AssetType};
use crate::page::PageStore;
use crate::pointer::PagePtr;
use crate::reader::{self, ReadResult};

/// Size of a settings header
pub const SETTINGS_HEADER_SIZE: usize = 40;

/// Settings header
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct SettingsHeader {
    /// GUID of the layout
    pub layout: u64,
    /// Value buffer
    pub values: PagePtr,
    /// Settings name
    pub name: PagePtr,
    /// Page holding string values
    pub string_data: PagePtr,
    /// Size of the value buffer
    pub value_buffer_size: u32,
    /// Unused
    pub reserved: u32,
}

/// A decoded value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SettingsValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// Two-component vector
    Float2([f32; 2]),
    /// Three-component vector
    Float3([f32; 3]),
    /// String, `None` when the pointer does not resolve
    String(Option<String>),
    /// Asset path
    Asset(Option<String>),
    /// Asset path, not precached
    AssetNoPrecache(Option<String>),
    /// Array of records
    Array {
        /// Element count stored in the asset
        declared: u32,
        /// Decoded elements, at most the configured cap
        elements: Vec<Vec<SettingsEntry>>,
    },
    /// Field type this crate does not know
    Unsupported(u16),
    /// Value lies outside the buffer or its sub-layout is missing
    Unreadable,
}

/// One named value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsEntry {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: SettingsFieldType,
    /// Offset inside the enclosing record
    pub offset: u32,
    /// Decoded value
    pub value: SettingsValue,
}

/// A decoded settings asset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    /// Settings name, when it resolves
    pub name: Option<String>,
    /// GUID of the layout
    pub layout_guid: u64,
    /// Name of the layout
    pub layout_name: Option<String>,
    /// Declared value buffer size
    pub value_buffer_size: u32,
    /// Values in layout field order
    pub values: Vec<SettingsEntry>,
}

impl Settings {
    /// Value of the field named `name`
    pub fn get(&self, name: &str) -> Option<&SettingsValue> {
        self.values.iter().find(|v| v.name == name).map(|v| &v.value)
    }
}

struct ValueReader<'a> {
    store: &'a PageStore,
    buffer: Bytes,
    string_page: PagePtr,
    limits: DecodeLimits,
    /// Entries and elements left for the whole asset
    remaining: Cell<usize>,
}

impl<'a> ValueReader<'a> {
    fn new(
        store: &'a PageStore,
        buffer: Bytes,
        string_page: PagePtr,
        limits: DecodeLimits,
    ) -> Self {
        Self {
            store,
            buffer,
            string_page,
            limits,
            remaining: Cell::new(limits.max_settings_entries),
        }
    }

    /// Spend one unit of the budget; `false` once it is gone
    fn take(&self) -> bool {
        match self.remaining.get() {
            0 => false,
            left => {
                self.remaining.set(left - 1);
                true
            }
        }
    }

    fn record(&self, layout: &SettingsLayout, base: usize, depth: usize) -> Vec<SettingsEntry> {
        let mut entries = Vec::with_capacity(layout.fields.len());
        for field in &layout.fields {
            if !self.take() {
                warn!(
                    "more than {} settings entries, truncating",
                    self.limits.max_settings_entries
                );
                break;
            }
            entries.push(SettingsEntry {
                name: field.name.clone(),
                field_type: field.field_type,
                offset: field.offset,
                value: self.value(layout, field, base, depth),
            });
        }
        entries
    }

    fn value(
        &self,
        layout: &SettingsLayout,
        field: &SettingsField,
        base: usize,
        depth: usize,
    ) -> SettingsValue {
        let Some(at) = base.checked_add(field.offset as usize) else {
            return SettingsValue::Unreadable;
        };
        let buf = &self.buffer[..];
        let result: ReadResult<SettingsValue> = match field.field_type {
            SettingsFieldType::Bool => reader::read_u8(buf, at).map(|b| SettingsValue::Bool(b != 0)),
            SettingsFieldType::Int => reader::read_i32(buf, at).map(SettingsValue::Int),
            SettingsFieldType::Float => reader::read_f32(buf, at).map(SettingsValue::Float),
            SettingsFieldType::Float2 => reader::read_f32_array(buf, at).map(SettingsValue::Float2),
            SettingsFieldType::Float3 => reader::read_f32_array(buf, at).map(SettingsValue::Float3),
            SettingsFieldType::String => self.string(at).map(SettingsValue::String),
            SettingsFieldType::Asset => self.string(at).map(SettingsValue::Asset),
            SettingsFieldType::AssetNoPrecache => {
                self.string(at).map(SettingsValue::AssetNoPrecache)
            }
            SettingsFieldType::StaticArray => {
                let Some(sub) = layout.sub_layout(field.sub_layout) else {
                    return SettingsValue::Unreadable;
                };
                Ok(self.array(sub, sub.array_value_count, at, depth))
            }
            SettingsFieldType::DynamicArray => {
                let Some(sub) = layout.sub_layout(field.sub_layout) else {
                    return SettingsValue::Unreadable;
                };
                reader::read_u32(buf, at).and_then(|count| {
                    let offset = reader::read_u32(buf, at + 4)?;
                    Ok(self.array(sub, count, offset as usize, depth))
                })
            }
            SettingsFieldType::Unknown(raw) => Ok(SettingsValue::Unsupported(raw)),
        };
        result.unwrap_or(SettingsValue::Unreadable)
    }

    /// String values keep only the offset half of their pointer; the page
    /// comes from the header's string data pointer.
    fn string(&self, at: usize) -> ReadResult<Option<String>> {
        let ptr = reader::read_struct::<PagePtr>(&self.buffer, at)?;
        if ptr.is_null() {
            return Ok(None);
        }
        let target = if self.string_page.is_null() {
            ptr
        } else {
            PagePtr::new(self.string_page.index, ptr.offset)
        };
        Ok(self
            .store
            .resolve(target)
            .and_then(|tail| reader::read_cstring(&tail, 0).ok()))
    }

    fn array(&self, sub: &SettingsLayout, declared: u32, start: usize, depth: usize) -> SettingsValue {
        if depth >= self.limits.max_nesting_depth {
            warn!("settings arrays nested deeper than {depth}, skipping elements");
            return SettingsValue::Array {
                declared,
                elements: Vec::new(),
            };
        }
        let count = (declared as usize).min(self.limits.max_array_elements);
        let stride = sub.value_buffer_size as usize;
        let elements = (0..count)
            .map_while(|i| start.checked_add(i.checked_mul(stride)?))
            .take_while(|_| self.take())
            .map(|element| self.record(sub, element, depth + 1))
            .collect();
        SettingsValue::Array { declared, elements }
    }
}

/// Decode an `stgs` asset
pub fn decode(ctx: &DecodeContext<'_>, entry: &AssetEntry) -> DecodeResult<Settings> {
    if !matches!(entry.version, 1 | 2) {
        return Err(unsupported(entry));
    }
    let header_bytes = ctx.header(entry)?;
    let header = reader::read_struct::<SettingsHeader>(&header_bytes, 0)?;

    let layout_entry = ctx.dependency(header.layout, AssetType::SettingsLayout)?;
    let layout = settings_layout::decode(ctx, layout_entry)?;
    let buffer = ctx
        .store
        .resolve(header.values)
        .ok_or(DecodeError::MissingSection("value buffer"))?;

    let values = ValueReader::new(ctx.store, buffer, header.string_data, ctx.limits)
        .record(&layout, 0, 0);

    let name = ctx
        .store
        .resolve(header.name)
        .and_then(|tail| reader::read_cstring(&tail, 0).ok());

    Ok(Settings {
        name,
        layout_guid: header.layout,
        layout_name: layout.name,
        value_buffer_size: header.value_buffer_size,
        values,
    })
}
