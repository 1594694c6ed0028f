//! # formpress CLI
//!
//! Usage:
//!   formpress instructions.json --data data.json -o output.pdf
//!   cat instructions.json | formpress --options options.json -o output.pdf

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use formpress::{instruction, render, PdfSurface, RenderData, RenderOptions};

/// Render a formpress instruction tree to PDF.
#[derive(Debug, Parser)]
#[command(name = "formpress", version)]
struct Args {
    /// Instruction tree (JSON array). Reads stdin when omitted.
    input: Option<PathBuf>,

    /// Tables, field registry, metadata and globals (JSON).
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Render options (JSON), e.g. currency symbol and date patterns.
    #[arg(long)]
    options: Option<PathBuf>,

    /// Output file.
    #[arg(short, long, default_value = "output.pdf")]
    output: PathBuf,

    /// Log layout decisions.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(io::stderr)
        .init();

    run(args)
}

fn run(args: Args) -> Result<()> {
    let source = match &args.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read instructions: {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read instructions from stdin")?;
            buf
        }
    };
    let program = instruction::parse_str(&source).context("Invalid instruction tree")?;
    debug!(operations = program.len(), "instructions parsed");

    let data: RenderData = read_json_or_default(args.data.as_deref(), "data")?;
    let options: RenderOptions = read_json_or_default(args.options.as_deref(), "options")?;

    let mut surface = PdfSurface::new();
    render(&mut surface, &program, &data, &options).context("Render failed")?;

    let written = surface
        .save(&args.output)
        .with_context(|| format!("Failed to write PDF: {}", args.output.display()))?;
    info!(bytes = written, output = %args.output.display(), "document written");
    eprintln!("Written {} bytes to {}", written, args.output.display());
    Ok(())
}

fn read_json_or_default<T: DeserializeOwned + Default>(path: Option<&Path>, what: &str) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what}: {}", path.display()))?;
    let value = serde_json::from_str(&text)
        .map_err(formpress::FormpressError::from)
        .with_context(|| format!("Invalid {what} file: {}", path.display()))?;
    Ok(value)
}
