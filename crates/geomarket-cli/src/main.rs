//! Command-line front end for the suitability scoring pipeline.
//! Reads census and point CSV files, writes a JSON report.

mod input;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use geomarket_core::density::{goodness_of_fit, natural_breaks_table};
use geomarket_core::{
    BinMode, ClassBreakTable, Grid, GridGeometry, Layer, SuitabilityConfig, SuitabilityPipeline, SuitabilityResult,
};
use serde::Serialize;
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "geomarket", version, about = "Geomarketing suitability scoring on census grids")]
struct Args {
    /// Log per-stage detail (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline and write a JSON report.
    Score {
        /// Census CSV: x,y followed by one class-code column per attribute.
        #[arg(long)]
        census: PathBuf,

        /// Points-of-interest CSV: x,y and an optional weight column.
        #[arg(long)]
        points: PathBuf,

        /// JSON configuration; defaults to the case-study settings.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Report file; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail on points outside the census grid instead of dropping them.
        #[arg(long)]
        strict: bool,

        /// Include every intermediate layer in the report.
        #[arg(long)]
        all_layers: bool,
    },

    /// Natural breaks of one numeric CSV column.
    Breaks {
        #[arg(short, long)]
        input: PathBuf,

        /// Number of classes.
        #[arg(short = 'k', long, default_value_t = 4)]
        classes: usize,

        /// Column name; the first column when omitted.
        #[arg(long)]
        column: Option<String>,
    },

    /// Print the default configuration as JSON.
    DefaultConfig,
}

// ── Report ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct RegionReport {
    label: u32,
    cells: usize,
    population: f64,
    centroid_x: f64,
    centroid_y: f64,
    area: f64,
}

#[derive(Serialize)]
struct Report<'a> {
    geometry: GridGeometry,
    score: Vec<Vec<Option<f64>>>,
    max_score: Option<f64>,
    metro_regions: Vec<RegionReport>,
    density_breaks: &'a ClassBreakTable,
    elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    layers: Option<BTreeMap<String, Layer<'a>>>,
}

impl<'a> Report<'a> {
    fn new(result: &'a SuitabilityResult, all_layers: bool) -> Self {
        let metro_regions = result
            .metros
            .regions
            .iter()
            .map(|r| RegionReport {
                label: r.label(),
                cells: r.cells().len(),
                population: r.total(),
                centroid_x: r.centroid().0,
                centroid_y: r.centroid().1,
                area: r.area(),
            })
            .collect();
        let layers = all_layers.then(|| {
            result
                .layer_names()
                .into_iter()
                .filter_map(|name| result.layer(&name).map(|layer| (name, layer)))
                .collect()
        });
        Self {
            geometry: result.geometry,
            score: result.score.to_rows(),
            max_score: result.score.max_value(),
            metro_regions,
            density_breaks: &result.density.table,
            elapsed_ms: result.elapsed_ms,
            layers,
        }
    }
}

// ── Commands ─────────────────────────────────────────────────────────────────

fn load_config(path: Option<&Path>) -> Result<SuitabilityConfig> {
    match path {
        Some(p) => SuitabilityConfig::from_path(p).with_context(|| format!("invalid configuration {}", p.display())),
        None => Ok(SuitabilityConfig::default()),
    }
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
            let mut w = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut w, value)?;
            w.flush()?;
            info!("report written to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut w = stdout.lock();
            serde_json::to_writer_pretty(&mut w, value)?;
            writeln!(w)?;
        }
    }
    Ok(())
}

fn run_score(
    census: &Path,
    points: &Path,
    config: Option<&Path>,
    output: Option<&Path>,
    strict: bool,
    all_layers: bool,
) -> Result<()> {
    let mut config = load_config(config)?;
    if strict {
        config.density.mode = BinMode::Strict;
    }

    let table = input::read_census(census)?;
    let pts = input::read_points(points)?;
    info!(records = table.len(), points = pts.len(), "inputs read");

    let result = SuitabilityPipeline::new(config)?
        .run(&table, &pts)
        .context("suitability run failed")?;

    eprintln!("{} metro region(s)", result.metros.regions.len());
    for r in &result.metros.regions {
        let (x, y) = r.centroid();
        eprintln!(
            "  #{:<3} population {:>12.0}  cells {:>5}  centroid ({x:.1}, {y:.1})",
            r.label(),
            r.total(),
            r.cells().len()
        );
    }
    eprintln!("density breaks: {:?}", result.density.table.breaks());

    write_json(&Report::new(&result, all_layers), output)
}

fn run_breaks(path: &Path, classes: usize, column: Option<&str>) -> Result<()> {
    let values = input::read_column(path, column)?;
    let geometry = GridGeometry::square(0.0, 0.0, 1.0, 1, values.len())?;
    let grid = Grid::from_cells(geometry, values.iter().copied().map(Some).collect())?;
    let table = natural_breaks_table(&grid, classes)?;

    println!("{:>6}  {:<28} {:>8}", "code", "interval", "count");
    for iv in table.intervals() {
        let count = values.iter().filter(|&&v| table.classify(v) == Some(iv.code)).count();
        println!("{:>6}  {:<28} {:>8}", iv.code, iv.label, count);
    }
    println!("goodness of variance fit: {:.4}", goodness_of_fit(&values, &table.breaks()));
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Score {
            census,
            points,
            config,
            output,
            strict,
            all_layers,
        } => run_score(&census, &points, config.as_deref(), output.as_deref(), strict, all_layers),
        Command::Breaks { input, classes, column } => run_breaks(&input, classes, column.as_deref()),
        Command::DefaultConfig => {
            println!("{}", SuitabilityConfig::default().to_json_pretty()?);
            Ok(())
        }
    }
}
