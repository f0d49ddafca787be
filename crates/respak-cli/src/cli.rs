//! Command-line arguments

use clap::{Parser, Subcommand, ValueEnum};
use respak_formats::PakConfig;
use std::path::PathBuf;

/// Inspect paged game asset containers
#[derive(Debug, Parser)]
#[command(
    name = "respak",
    about = "Inspect paged game asset containers",
    version,
    long_about = "Lists, decodes and extracts assets from RPak containers and their sibling stream files."
)]
pub struct Cli {
    /// Container to open
    pub container: PathBuf,

    /// Log filter, in `RUST_LOG` syntax
    #[arg(short, long, global = true, env = "RESPAK_LOG")]
    pub log_level: Option<String>,

    /// Data table rows to materialize per table
    #[arg(long, global = true, env = "RESPAK_MAX_ROWS")]
    pub max_rows: Option<usize>,

    /// Directory holding the stream files
    #[arg(long, global = true, env = "RESPAK_STREAM_DIR")]
    pub stream_dir: Option<PathBuf>,

    /// Do not open stream files; streamed mips come back zero-filled
    #[arg(long, global = true)]
    pub no_streams: bool,

    /// Output format for listings
    #[arg(short, long, value_enum, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns
    Text,
    /// One JSON document
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List every asset with its type, version and validity
    List,

    /// Show the page directory and which pages are decompressed
    Pages {
        /// Decompress every page first
        #[arg(long)]
        load: bool,
    },

    /// Decode one asset and print it as JSON
    Show {
        /// Asset GUID, hex with or without `0x`
        #[arg(value_parser = parse_guid)]
        guid: u64,
    },

    /// Write one texture mip level to a file
    Mip {
        /// Texture GUID
        #[arg(value_parser = parse_guid)]
        guid: u64,

        /// Mip level, 0 is the largest
        level: usize,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Hex dump part of a page
    Hexdump {
        /// Page index
        page: usize,

        /// First byte to dump
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Bytes to dump
        #[arg(long, default_value_t = 256)]
        len: usize,
    },
}

impl Cli {
    /// Library configuration from the global flags
    pub fn pak_config(&self) -> PakConfig {
        let mut config = PakConfig::default().with_streams(!self.no_streams);
        if let Some(rows) = self.max_rows {
            config = config.with_max_table_rows(rows);
        }
        if let Some(dir) = &self.stream_dir {
            config = config.with_stream_dir(dir);
        }
        config
    }
}

/// Parse a GUID written in hex
pub fn parse_guid(text: &str) -> Result<u64, String> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid GUID {text:?}: {e}"))
}
