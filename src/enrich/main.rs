//! Batch enrichment pipeline.
//!
//! Imports a point table, optionally filters it to a bounding box, adds
//! country names and UTM coordinates, and writes the result in one of the
//! export formats.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use geopin::config::Config;
use geopin::export::{ExportFormat, ExportOptions};
use geopin::import::{self, RemoteImporter};
use geopin::pip::{BoundaryDataset, CountryIndex};
use geopin::store;
use geopin::{GeopinError, Record, SelectionRect, Session};

#[derive(Parser, Debug)]
#[command(name = "enrich")]
#[command(about = "Enrich point data with countries and UTM coordinates")]
#[command(group(ArgGroup::new("source").required(true).args(["file", "url", "sample"])))]
struct Args {
    /// Optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// CSV, TSV, JSON or XLSX file to import
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Remote CSV or JSON file to import
    #[arg(long)]
    url: Option<String>,

    /// Use the built-in eight city sample
    #[arg(long)]
    sample: bool,

    /// Latitude column (guessed from headers when omitted)
    #[arg(long)]
    lat_column: Option<String>,

    /// Longitude column (guessed from headers when omitted)
    #[arg(long)]
    lng_column: Option<String>,

    /// Keep only points inside "south,west,north,east"
    #[arg(long)]
    bbox: Option<String>,

    /// Add the containing country to every point
    #[arg(long)]
    country: bool,

    /// Add UTM zone, easting and northing to every point
    #[arg(long)]
    utm: bool,

    /// Country boundaries GeoJSON (overrides the config file)
    #[arg(long)]
    boundaries: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "csv")]
    format: ExportFormat,

    /// Output file (defaults to enriched_data.<ext>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write Shapefiles even if long field names must be truncated
    #[arg(long)]
    allow_field_truncation: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

async fn read_source(args: &Args, config: &Config) -> Result<Vec<Record>> {
    if let Some(path) = &args.file {
        return import::read_file(path)
            .with_context(|| format!("Failed to import {}", path.display()));
    }
    if let Some(url) = &args.url {
        let importer = RemoteImporter::new(&config.import)?;
        let pb = spinner(&format!("Fetching {}", url))?;
        let records = importer.fetch(url).await;
        pb.finish_and_clear();
        return records.with_context(|| format!("Failed to import {}", url));
    }
    info!("Using built-in sample data");
    Ok(store::sample_records())
}

fn load_boundaries(path: &Path) -> Result<Arc<CountryIndex>> {
    let pb = spinner(&format!("Loading boundaries from {}", path.display()))?;
    let dataset = BoundaryDataset::load(path)
        .with_context(|| format!("Failed to load boundaries from {}", path.display()))?;
    let index = CountryIndex::build(dataset);
    pb.finish_and_clear();
    info!("Indexed {} boundary features", index.len());
    Ok(Arc::new(index))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Geopin Enrichment Pipeline");

    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(path) = &args.boundaries {
        config.boundaries.path = path.clone();
    }

    let start = Instant::now();
    let mut session = Session::new();

    // Import
    let records = read_source(&args, &config).await?;
    let summary = session.ingest_records(records)?;
    info!(
        "Imported {} rows with columns: {}",
        summary.rows,
        summary.headers.join(", ")
    );

    // Column mapping
    let lat_column = args.lat_column.clone().or(summary.guess.lat.clone());
    let lng_column = args.lng_column.clone().or(summary.guess.lng.clone());
    let (lat_column, lng_column) = match (lat_column, lng_column) {
        (Some(lat), Some(lng)) => (lat, lng),
        _ => anyhow::bail!(
            "Could not determine coordinate columns from [{}]; pass --lat-column and --lng-column",
            summary.headers.join(", ")
        ),
    };
    let mapped = session.apply_column_mapping(&lat_column, &lng_column)?;
    info!(
        "Loaded {} points using '{}' / '{}'",
        mapped, lat_column, lng_column
    );
    if mapped < summary.rows {
        warn!(
            "{} rows skipped: coordinates missing or invalid",
            summary.rows - mapped
        );
    }

    // Filtering
    if let Some(bbox) = &args.bbox {
        let rect = SelectionRect::parse(bbox)
            .with_context(|| format!("Invalid --bbox '{}', expected south,west,north,east", bbox))?;
        if !rect.is_valid() {
            warn!("Bounding box {} selects nothing", bbox);
        }
        session.set_selection(rect);
        session.set_filtering(true);
        info!(
            "{} of {} points inside the bounding box",
            session.working_points().len(),
            session.all_points().len()
        );
    }

    // Enrichment
    if args.country {
        session.attach_boundaries(load_boundaries(&config.boundaries.path)?);
        let pb = spinner("Looking up countries")?;
        let report = session.enrich_countries();
        pb.finish_and_clear();
        let report = report?;
        info!(
            "Country names added to {} points ({} matched a boundary)",
            report.total, report.matched
        );
    }

    if args.utm {
        let pb = spinner("Projecting to UTM")?;
        let report = session.add_utm();
        pb.finish_and_clear();
        let report = report?;
        info!("UTM coordinates added to {} points!", report.succeeded);
        if report.failed > 0 {
            warn!("{} points could not be projected", report.failed);
        }
    }

    // Export
    let options = ExportOptions {
        allow_field_truncation: args.allow_field_truncation,
    };
    let bytes = match session.export(args.format, &options) {
        Ok(bytes) => bytes,
        Err(GeopinError::FieldTruncation(truncations)) => {
            warn!("Shapefile field names are limited to 10 characters:");
            for t in &truncations {
                warn!("  {} -> {}", t.original, t.truncated);
            }
            anyhow::bail!("Export cancelled; rerun with --allow-field-truncation to proceed");
        }
        Err(e) => return Err(e.into()),
    };

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(args.format.file_name()));
    std::fs::write(&output, &bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        "Wrote {} points to {} in {:.2?}",
        session.working_points().len(),
        output.display(),
        start.elapsed()
    );

    Ok(())
}
