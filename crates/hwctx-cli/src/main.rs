//! hwctx - Inspect a hardware context description
//!
//! Builds a context from an XML description and prints it as a tree
//! summary or as JSON.

mod config;
mod render;

use anyhow::{Context as _, Result};
use clap::Parser;
use hwctx_core::{Context, ParseOptions};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use config::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "hwctx")]
#[command(about = "Inspect hardware context descriptions")]
#[command(version)]
struct Args {
    /// Description file to load ("-" reads standard input)
    input: PathBuf,

    /// Path to configuration file
    #[arg(short, long, default_value = "hwctx.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Print the context as JSON
    #[arg(long)]
    json: bool,

    /// Hide attribute names in the summary
    #[arg(long)]
    no_attributes: bool,

    /// Tolerate mismatched end tag names
    #[arg(long)]
    lenient: bool,
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn read_input(input: &Path) -> Result<Vec<u8>> {
    if input.as_os_str() == "-" {
        let mut data = Vec::new();
        std::io::stdin()
            .read_to_end(&mut data)
            .context("reading standard input")?;
        Ok(data)
    } else {
        std::fs::read(input).with_context(|| format!("reading {}", input.display()))
    }
}

fn load(args: &Args) -> Result<Context> {
    let data = read_input(&args.input)?;
    let options = if args.lenient {
        ParseOptions::lenient()
    } else {
        ParseOptions::strict()
    };
    Ok(Context::from_buffer_with(&data, options)?)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = config::read_config(&args.config)?;
    let found = loaded.is_some();
    let mut config = loaded.unwrap_or_default();

    let level = args.log_level.as_deref().unwrap_or(&config.log.level);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    debug!("hwctx v{}", env!("CARGO_PKG_VERSION"));
    if found {
        info!(path = %args.config.display(), "Loaded configuration");
    } else {
        info!(
            path = %args.config.display(),
            "Configuration file not found, using defaults"
        );
    }

    if args.json {
        config.output.format = OutputFormat::Json;
    }
    if args.no_attributes {
        config.output.show_attributes = false;
    }

    let ctx = load(&args).with_context(|| format!("loading {}", args.input.display()))?;
    print!("{}", render::render(&ctx, &config.output)?);

    Ok(())
}
