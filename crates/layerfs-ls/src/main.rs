//! layerfs-ls: list a directory of a layered tree.
//!
//! Usage:
//!   layerfs-ls [path]                  # List through the prefix router
//!   layerfs-ls --chain [path]          # List through the overlay chain
//!   layerfs-ls --config <file> [path]  # Use an explicit config file

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use layerfs::{DirHandle, EntryDescriptor, Filesystem, LayerConfig, ReadLimit};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> ExitCode {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug, Default)]
struct Options {
    config: Option<PathBuf>,
    chain: bool,
    limit: Option<usize>,
    path: Option<String>,
}

fn parse_args(args: &[String]) -> Result<Option<Options>> {
    let mut opts = Options::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(None),
            "--chain" => opts.chain = true,
            "--config" => {
                let path = iter.next().context("--config requires a file path")?;
                opts.config = Some(PathBuf::from(path));
            }
            "--limit" | "-n" => {
                let n = iter.next().context("--limit requires a number")?;
                opts.limit = Some(n.parse().with_context(|| format!("invalid limit: {n}"))?);
            }
            s if s.starts_with("--config=") => {
                opts.config = Some(PathBuf::from(&s["--config=".len()..]));
            }
            s if s.starts_with('-') => bail!("Unknown option: {s}"),
            path => {
                if opts.path.replace(path.to_string()).is_some() {
                    bail!("only one path may be listed");
                }
            }
        }
    }
    Ok(Some(opts))
}

fn run() -> Result<ExitCode> {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(opts) = parse_args(&args)? else {
        print_help();
        return Ok(ExitCode::SUCCESS);
    };

    let config = match &opts.config {
        Some(path) => LayerConfig::load_from(path)?,
        None => LayerConfig::load()?,
    };
    tracing::debug!(
        mounts = config.mounts.len(),
        sources = config.sources.len(),
        "configuration loaded"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let fs: Box<dyn Filesystem> = if opts.chain {
        Box::new(config.build_chain())
    } else {
        Box::new(config.build_router())
    };

    let default_path = if opts.chain { "" } else { "/" };
    let path = opts.path.as_deref().unwrap_or(default_path);
    let limit = opts.limit.map_or(ReadLimit::All, ReadLimit::AtMost);

    let entries = runtime
        .block_on(fs.read_dir(&DirHandle::new(path), limit))
        .with_context(|| format!("Failed to list {path}"))?;

    for entry in &entries {
        println!("{}", format_entry(entry));
    }
    Ok(ExitCode::SUCCESS)
}

fn format_entry(entry: &EntryDescriptor) -> String {
    let kind = if entry.is_dir() { 'd' } else { '-' };
    let size = match entry.size() {
        Ok(n) => n.to_string(),
        Err(_) => "-".to_string(),
    };
    let origin = entry
        .real_path
        .as_ref()
        .map(|p| p.display().to_string())
        .or_else(|| entry.virtual_root.clone())
        .unwrap_or_default();
    format!(
        "{kind} {size:>8} {lang:<4} w{weight} {name:<32} {origin}",
        lang = entry.language.as_deref().unwrap_or("-"),
        weight = entry.weight,
        name = entry.canonical_name,
    )
}

fn print_help() {
    println!(
        r#"layerfs-ls v{}

Usage:
  layerfs-ls [OPTIONS] [path]

Options:
  --config <file>              Config file (default: ~/.config/layerfs/layerfs.toml)
  --chain                      List through the overlay chain instead of the router
  -n, --limit <count>          Show at most <count> entries
  -h, --help                   Show this help

Columns:
  type, size, language, weight, canonical name, origin

Set RUST_LOG=layerfs=debug to trace lookups and merges.
"#,
        env!("CARGO_PKG_VERSION")
    );
}
