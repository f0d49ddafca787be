//! Subcommand handlers
//!
//! Handlers write to any `Write` so they can be exercised against buffers.

use anyhow::{Context, Result, bail};
use respak_formats::{EntryValidity, PakFile};
use serde_json::json;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::cli::OutputFormat;

const HEXDUMP_WIDTH: usize = 16;

/// `list`: one line per directory entry
pub fn list(pak: &PakFile, format: OutputFormat, out: &mut impl Write) -> Result<()> {
    if format == OutputFormat::Json {
        serde_json::to_writer_pretty(&mut *out, pak.entries())?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out, "{:<18} {:<6} {:>4}  {:<12} status", "guid", "type", "ver", "header")?;
    for entry in pak.entries() {
        let status = match &entry.validity {
            EntryValidity::Valid => "ok".to_string(),
            EntryValidity::Invalid(issue) => format!("invalid: {issue}"),
        };
        writeln!(
            out,
            "{:016X}   {:<6} {:>4}  {:<12} {status}",
            entry.guid,
            entry.type_name(),
            entry.version,
            entry.header.to_string(),
        )?;
    }
    writeln!(
        out,
        "{} assets, {} invalid",
        pak.catalog().len(),
        pak.catalog().invalid_count()
    )?;
    Ok(())
}

/// `pages`: page directory with materialization status
pub fn pages(pak: &PakFile, load: bool, format: OutputFormat, out: &mut impl Write) -> Result<()> {
    let store = pak.store();
    if load {
        for index in 0..store.page_count() {
            if let Err(e) = store.try_page(index) {
                info!("page {index}: {e}");
            }
        }
    }

    if format == OutputFormat::Json {
        let rows: Vec<_> = store
            .descriptors()
            .iter()
            .enumerate()
            .map(|(index, descriptor)| {
                json!({
                    "index": index,
                    "descriptor": descriptor,
                    "materialized": store.is_materialized(index),
                })
            })
            .collect();
        serde_json::to_writer_pretty(&mut *out, &rows)?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out, "{:>5} {:>10} {:>10} {:>5}  state", "page", "size", "stored", "comp")?;
    for (index, descriptor) in store.descriptors().iter().enumerate() {
        let state = if store.is_materialized(index) {
            "loaded"
        } else if load {
            "failed"
        } else {
            "-"
        };
        writeln!(
            out,
            "{index:>5} {:>10} {:>10} {:>5}  {state}",
            descriptor.uncompressed_size,
            descriptor.payload_size(),
            if descriptor.is_compressed() { "yes" } else { "no" },
        )?;
    }
    Ok(())
}

/// `show`: decoded record as pretty JSON
///
/// An asset that fails to decode is still printed, with the reason.
pub fn show(pak: &PakFile, guid: u64, out: &mut impl Write) -> Result<()> {
    let entry = pak
        .entry(guid)
        .with_context(|| format!("asset {guid:016X} not in container"))?;
    let document = match pak.decode(entry) {
        Ok(record) => json!({ "entry": entry, "record": record }),
        Err(e) => json!({ "entry": entry, "error": e.to_string() }),
    };
    serde_json::to_writer_pretty(&mut *out, &document)?;
    writeln!(out)?;
    Ok(())
}

/// `mip`: write one texture level to `output`
pub fn mip(pak: &PakFile, guid: u64, level: usize, output: &Path) -> Result<usize> {
    let bytes = pak
        .load_texture_mip(guid, level)
        .with_context(|| format!("texture {guid:016X}"))?;
    std::fs::write(output, &bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!("wrote mip {level} ({} bytes) to {}", bytes.len(), output.display());
    Ok(bytes.len())
}

/// `hexdump`: classic offset / hex / ASCII listing of a page range
pub fn hexdump(
    pak: &PakFile,
    page: usize,
    offset: usize,
    len: usize,
    out: &mut impl Write,
) -> Result<()> {
    let data = pak
        .store()
        .try_page(page)
        .with_context(|| format!("page {page}"))?;
    if offset > data.len() {
        bail!("offset {offset} is past the end of page {page} ({} bytes)", data.len());
    }
    let end = offset.saturating_add(len).min(data.len());
    write_hexdump(&data[offset..end], offset, out)
}

fn write_hexdump(data: &[u8], base: usize, out: &mut impl Write) -> Result<()> {
    for (row, chunk) in data.chunks(HEXDUMP_WIDTH).enumerate() {
        let encoded = hex::encode(chunk);
        let pairs: Vec<&str> = (0..encoded.len())
            .step_by(2)
            .map(|i| &encoded[i..i + 2])
            .collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { char::from(b) } else { '.' })
            .collect();
        writeln!(
            out,
            "{:08x}  {:<width$}  |{ascii}|",
            base + row * HEXDUMP_WIDTH,
            pairs.join(" "),
            width = HEXDUMP_WIDTH * 3 - 1,
        )?;
    }
    Ok(())
}
