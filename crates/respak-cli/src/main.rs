//! respak command-line inspector
//!
//! Thin wrapper around respak-formats that:
//! 1. Parses command-line arguments
//! 2. Initializes logging
//! 3. Opens the container with the configured limits
//! 4. Runs one subcommand

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use respak_formats::PakFile;
use std::io::Write;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid log filter {directives:?}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let pak = PakFile::open(&cli.container, cli.pak_config())
        .with_context(|| format!("failed to open {}", cli.container.display()))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match &cli.command {
        Command::List => commands::list(&pak, cli.format, &mut out)?,
        Command::Pages { load } => commands::pages(&pak, *load, cli.format, &mut out)?,
        Command::Show { guid } => commands::show(&pak, *guid, &mut out)?,
        Command::Mip {
            guid,
            level,
            output,
        } => {
            let written = commands::mip(&pak, *guid, *level, output)?;
            writeln!(out, "{written} bytes written to {}", output.display())?;
        }
        Command::Hexdump { page, offset, len } => {
            commands::hexdump(&pak, *page, *offset, *len, &mut out)?;
        }
    }
    out.flush()?;
    Ok(())
}
