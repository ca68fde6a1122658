/// Kelp canopy indicator runner: reads a quarterly pixel-area raster and a
/// segment polygon layer (both JSON) and writes segment-level indicators.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kelp_core::{
    AssignedPixel, Frequency, IndicatorConfig, PixelGrid, PixelMode, Pipeline, QuarterSlot,
    RasterSource, SegmentSelection, SegmentSet, SegmentSource, StatusReport,
};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "indicators", about = "Segment-level kelp canopy indicators")]
struct Cli {
    /// Raster JSON: { longitude, latitude, area, year }.
    #[arg(short, long, global = true, default_value = "data/raster.json")]
    raster: PathBuf,

    /// Segment polygon JSON: { segments: [{ segment_id, exterior, interiors }] }.
    #[arg(short, long, global = true, default_value = "data/segments.json")]
    segments: PathBuf,

    /// Indicator config JSON; flags below override its fields.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// quarterly | annual
    #[arg(long, global = true)]
    frequency: Option<String>,

    /// max_first | sum_first | Q1 | Q2 | Q3 | Q4
    #[arg(long, global = true)]
    method: Option<String>,

    /// Replace every positive area with the full pixel footprint.
    #[arg(long, global = true)]
    whole_pixels: bool,

    #[arg(long, global = true)]
    no_kelp_bound: Option<f64>,

    #[arg(long, global = true)]
    ephemeral_kelp_bound: Option<f64>,

    /// Restrict to this segment id (repeatable). Default: all.
    #[arg(long = "segment", global = true)]
    segment_ids: Vec<String>,

    /// Year or "latest".
    #[arg(long, global = true)]
    status_year: Option<String>,

    /// Output JSON file (stdout when omitted).
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pixel-to-segment assignment table.
    Assign,
    /// Historical presence classification per segment.
    Presence,
    /// Quarterly or annual time series with baseline ratios.
    Timeseries,
    /// Status ratio for the status year.
    Status,
    /// Every output in one document.
    Run,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Write failed: {}", path.display()))?;
            info!(path = %path.display(), "output written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<IndicatorConfig> {
    let mut cfg = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Cannot read {}", path.display()))?;
            IndicatorConfig::from_json(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => IndicatorConfig::default(),
    };
    if let Some(f) = &cli.frequency {
        cfg.frequency = f.parse()?;
    }
    if let Some(m) = &cli.method {
        cfg.annualization_method = m.parse()?;
    }
    if cli.whole_pixels {
        cfg.fractional_pixels = false;
    }
    if let Some(b) = cli.no_kelp_bound {
        cfg.bounds.no_kelp_bound = b;
    }
    if let Some(b) = cli.ephemeral_kelp_bound {
        cfg.bounds.ephemeral_kelp_bound = b;
    }
    if !cli.segment_ids.is_empty() {
        cfg.segments = SegmentSelection::only(cli.segment_ids.iter().cloned());
    }
    if let Some(y) = &cli.status_year {
        cfg.status_year = y.parse()?;
    }
    cfg.validate()?;
    Ok(cfg)
}

#[derive(Serialize)]
struct AssignOut<'a> {
    slots: &'a [QuarterSlot],
    pixels: &'a [AssignedPixel],
}

#[derive(Serialize)]
struct StatusOut {
    status_year: Option<i32>,
    #[serde(flatten)]
    report: StatusReport,
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg = load_config(&cli)?;
    let raster: RasterSource = read_json(&cli.raster)?;
    let grid = PixelGrid::from_source(raster)
        .with_context(|| format!("Bad raster {}", cli.raster.display()))?;
    let source: SegmentSource = read_json(&cli.segments)?;
    let segments = SegmentSet::from_source(source)
        .with_context(|| format!("Bad segment layer {}", cli.segments.display()))?;
    info!(
        pixels = grid.n_pixels(),
        years = grid.index().years().len(),
        segments = segments.len(),
        "inputs loaded"
    );

    let pipeline = Pipeline::new(&grid, &segments, cfg)?;
    let output = cli.output.as_deref();

    match cli.command {
        Command::Assign => {
            let mode = PixelMode::from_fractional(pipeline.config().fractional_pixels);
            let table = pipeline.assign(mode)?;
            write_json(&AssignOut { slots: table.index().slots(), pixels: table.rows() }, output)
        }
        Command::Presence => {
            let table = pipeline.assign(PixelMode::Fractional)?;
            write_json(&pipeline.presence(&table)?, output)
        }
        Command::Timeseries => {
            let table = pipeline.assign(PixelMode::Fractional)?;
            write_json(&pipeline.time_series(&table)?, output)
        }
        Command::Status => {
            if pipeline.config().frequency != Frequency::Annual {
                bail!("status requires --frequency annual");
            }
            let table = pipeline.assign(PixelMode::Fractional)?;
            let presence = pipeline.presence(&table)?;
            let series = pipeline.time_series(&table)?;
            let out = match pipeline.status(&series, &presence)? {
                Some((year, report)) => StatusOut { status_year: Some(year), report },
                None => StatusOut { status_year: None, report: StatusReport::default() },
            };
            write_json(&out, output)
        }
        Command::Run => write_json(&pipeline.run()?, output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kelp_core::{AnnualizationMethod, StatusYear};

    #[test]
    fn flags_override_config_defaults() {
        let cli = Cli::try_parse_from([
            "indicators", "status", "--method", "sum_first", "--whole-pixels",
            "--segment", "S-01", "--segment", "S-02", "--status-year", "2020",
        ])
        .unwrap();
        let cfg = load_config(&cli).unwrap();
        assert_eq!(cfg.annualization_method, AnnualizationMethod::SumFirst);
        assert!(!cfg.fractional_pixels);
        assert_eq!(cfg.segments, SegmentSelection::only(["S-01", "S-02"]));
        assert_eq!(cfg.status_year, StatusYear::Year(2020));
        assert!(matches!(cli.command, Command::Status));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let cli = Cli::try_parse_from([
            "indicators", "presence", "--no-kelp-bound", "0.5", "--ephemeral-kelp-bound", "0.1",
        ])
        .unwrap();
        assert!(load_config(&cli).is_err());
    }
}
