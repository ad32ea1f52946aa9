//! permmap - Android API permission mapping tool
//!
//! Mines Android framework sources for the permissions each API method
//! requires, from two places:
//! - `@RequiresPermission` annotations
//! - `{@link Manifest.permission#...}` references in javadoc
//!
//! It can also split the permissions declared in the framework manifest into
//! their protection levels.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

mod driver;
mod error;
mod extractor;
mod formatter;
mod java;

use extractor::sources::{DEFAULT_PACKAGE_PREFIXES, DEFAULT_SKIPPED};
use extractor::{MappingExtractor, ProtectionLevelExtractor, ScanConfig, SdkExtractor};
use formatter::OutputFormat;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory of `sources-NN` trees, or a single SDK tree with --worker-mode
    #[arg(short = 'd', long = "sdk", value_name = "PATH")]
    sdk: PathBuf,

    /// SDK level of the tree (required with --worker-mode)
    #[arg(short = 'v', long = "sdk-version", value_name = "N")]
    sdk_version: Option<u32>,

    /// Output directory
    #[arg(short = 'o', long = "out", value_name = "PATH", default_value = "mappings")]
    out: PathBuf,

    /// Number of SDK levels processed at once
    #[arg(short = 'n', long, default_value_t = 16)]
    workers: usize,

    /// Process a single SDK tree
    #[arg(long)]
    worker_mode: bool,

    /// Extract manifest protection levels instead of API mappings
    #[arg(long = "extract-plevel")]
    extract_plevel: bool,

    /// Output format
    #[arg(long, short = 'f', default_value = "text")]
    format: String,

    /// Package prefix of the sources to mine (repeatable)
    #[arg(long = "package-prefix", value_name = "PREFIX")]
    package_prefixes: Vec<String>,

    /// Qualified name of a source file to skip (repeatable)
    #[arg(long = "skip", value_name = "CLASS")]
    skip: Vec<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn scan_config(&self) -> ScanConfig {
        let or_default = |given: &[String], default: &[&str]| {
            if given.is_empty() {
                default.iter().map(|s| s.to_string()).collect()
            } else {
                given.to_vec()
            }
        };
        ScanConfig {
            package_prefixes: or_default(&self.package_prefixes, DEFAULT_PACKAGE_PREFIXES),
            skip: or_default(&self.skip, DEFAULT_SKIPPED),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let output_format: OutputFormat = args.format.parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    if !args.sdk.exists() {
        anyhow::bail!("Path does not exist: {}", args.sdk.display());
    }

    let extractor: Box<dyn SdkExtractor> = if args.extract_plevel {
        Box::new(ProtectionLevelExtractor::new())
    } else {
        Box::new(MappingExtractor::new(args.scan_config())?)
    };

    if args.worker_mode {
        let Some(sdk_version) = args.sdk_version else {
            anyhow::bail!("--sdk-version is required with --worker-mode");
        };
        driver::run_worker(extractor.as_ref(), &args.sdk, sdk_version, &args.out, output_format)
    } else {
        driver::run_batch(extractor.as_ref(), &args.sdk, &args.out, args.workers, output_format)
    }
}
