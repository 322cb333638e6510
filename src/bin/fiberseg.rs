//! Fiber bundle segmentation CLI
//!
//! Segments a subject's tractography into atlas fascicles and writes the
//! per-label index lists, bundles, centroids and run manifest.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: Log level filter (default: fiberseg=info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for terminals (default: pretty)
//!
//! ## Usage
//!
//! ```bash
//! fiberseg --input subject.bundles --subject 01 \
//!     --atlas-dir atlas/bundles --atlas-info atlas/atlas_info.txt \
//!     --output results/
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use fiberseg::{FileBundleStore, MatchPolicy, SegmentConfig, SegmentRequest, Segmenter};

#[derive(Parser, Debug)]
#[command(name = "fiberseg")]
#[command(about = "Segment white matter fiber bundles using a multi-subject atlas", long_about = None)]
struct Cli {
    /// Subject tractography in .bundles format
    #[arg(short, long)]
    input: PathBuf,

    /// Subject identifier, used to name output bundles
    #[arg(short, long)]
    subject: String,

    /// Directory of atlas bundles, one file per label
    #[arg(long)]
    atlas_dir: PathBuf,

    /// Atlas info file: label, threshold and size per line
    #[arg(long)]
    atlas_info: PathBuf,

    /// Output directory
    #[arg(short, long)]
    output: PathBuf,

    /// JSON configuration file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Canonical number of points per fiber
    #[arg(long)]
    point_count: Option<usize>,

    /// Match against label centroids or full reference sets
    #[arg(long, value_parser = parse_policy)]
    match_policy: Option<MatchPolicy>,

    /// Run on a single thread
    #[arg(long)]
    sequential: bool,

    /// Skip writing the resampled copies of segmented bundles
    #[arg(long)]
    no_canonical_bundles: bool,
}

fn parse_policy(s: &str) -> Result<MatchPolicy, String> {
    MatchPolicy::from_str(s).ok_or_else(|| format!("unknown match policy `{s}` (centroid, full-reference)"))
}

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "fiberseg=info".into());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

fn build_config(cli: &Cli) -> Result<SegmentConfig> {
    let mut config = match &cli.config {
        Some(path) => SegmentConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SegmentConfig::default(),
    };

    if let Some(point_count) = cli.point_count {
        config.point_count = point_count;
    }
    if let Some(policy) = cli.match_policy {
        config.match_policy = policy;
    }
    if cli.sequential {
        config.parallel = false;
    }
    if cli.no_canonical_bundles {
        config.write_canonical_bundles = false;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;
    info!(
        point_count = config.point_count,
        match_policy = %config.match_policy,
        parallel = config.parallel,
        "Starting fiberseg"
    );

    let request = SegmentRequest {
        input: cli.input,
        subject_id: cli.subject,
        atlas_dir: cli.atlas_dir,
        atlas_info: cli.atlas_info,
        output_dir: cli.output,
    };

    let segmenter = Segmenter::new(Arc::new(FileBundleStore::new()), config);
    let report = segmenter
        .run(&request)
        .with_context(|| format!("Segmentation of subject {} failed", request.subject_id))?;

    println!(
        "Segmented {} of {} fibers into {} bundles ({} unassigned)",
        report.stats.assigned,
        report.stats.total_fibers,
        report.stats.segmented_labels,
        report.stats.unassigned,
    );
    for label in &report.labels {
        println!("  {:<24} {:>8}", label.label, label.fibers);
    }
    if let Some(path) = &report.manifest_path {
        println!("Manifest: {}", path.display());
    }
    Ok(())
}

fn main() {
    init_tracing();

    if let Err(err) = run(Cli::parse()) {
        error!(error = %format!("{err:#}"), "fiberseg failed");
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
