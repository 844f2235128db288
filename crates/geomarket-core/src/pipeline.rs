//! Pipeline orchestrator: runs all scoring stages in order.

use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::compose::sum_grids;
use crate::config::SuitabilityConfig;
use crate::density::{rasterize_density, DensityLayer, PointSet};
use crate::error::{Error, Result};
use crate::geometry::GridGeometry;
use crate::grid::Grid;
use crate::layer::Layer;
use crate::loader::{load_grids, AttributeGrids, CensusTable};
use crate::metro::{extract_metro_areas, MetroAreas};
use crate::reclass::{reclassify_all, ReclassRule};

// ── Result ───────────────────────────────────────────────────────────────────

/// Full output of one suitability run.
#[derive(Debug, Clone, Serialize)]
pub struct SuitabilityResult {
    /// Census lattice shared by every fine-resolution grid.
    pub geometry: GridGeometry,
    /// Class codes as loaded, one grid per census column.
    #[serde(skip)]
    pub classes: AttributeGrids,
    /// Points of interest as given to the run.
    #[serde(skip)]
    pub points: PointSet,
    /// Population classes as representative headcounts.
    pub headcount: Grid<f64>,
    /// Demographic weight grids in configuration order.
    pub weights: Vec<(String, Grid<f64>)>,
    pub metros: MetroAreas,
    pub density: DensityLayer,
    /// Demographic weights plus the density weight.
    pub score: Grid<f64>,
    pub elapsed_ms: u64,
}

/// Fixed layer names; demographic columns are added as `weight:<column>`
/// and `classes:<column>`.
const LAYERS: [&str; 8] = [
    "headcount",
    "score",
    "metro_population",
    "metro_regions",
    "density_counts",
    "density",
    "density_weight",
    "points",
];

impl SuitabilityResult {
    /// Named view of an intermediate or final product.
    pub fn layer(&self, name: &str) -> Option<Layer<'_>> {
        match name {
            "headcount" => Some(Layer::Values(&self.headcount)),
            "score" => Some(Layer::Values(&self.score)),
            "metro_population" => Some(Layer::Values(&self.metros.aggregated)),
            "metro_regions" => Some(Layer::Regions(&self.metros.regions, self.metros.labels.geometry())),
            "density_counts" => Some(Layer::Counts(&self.density.counts)),
            "density" => Some(Layer::Values(&self.density.density)),
            "density_weight" => Some(Layer::Values(&self.density.weights)),
            "points" => Some(Layer::Points(&self.points)),
            _ => {
                if let Some(column) = name.strip_prefix("weight:") {
                    self.weight(column).map(Layer::Values)
                } else if let Some(column) = name.strip_prefix("classes:") {
                    self.classes.get(column).map(Layer::Classes)
                } else {
                    None
                }
            }
        }
    }

    pub fn layer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = LAYERS.iter().map(|s| s.to_string()).collect();
        names.extend(self.weights.iter().map(|(c, _)| format!("weight:{c}")));
        names.extend(self.classes.names().map(|c| format!("classes:{c}")));
        names
    }

    pub fn weight(&self, column: &str) -> Option<&Grid<f64>> {
        self.weights.iter().find(|(c, _)| c == column).map(|(_, g)| g)
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────────────

/// Time a stage and log its outcome.
fn stage<T>(name: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let started = Instant::now();
    let out = f();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &out {
        Ok(_) => info!(stage = name, elapsed_ms, "stage finished"),
        Err(e) => warn!(stage = name, elapsed_ms, error = %e, "stage failed"),
    }
    out
}

/// Runs the suitability scoring pipeline for one configuration.
pub struct SuitabilityPipeline {
    config: SuitabilityConfig,
}

impl SuitabilityPipeline {
    /// Validates `config` up front so a run fails before any work is done.
    pub fn new(config: SuitabilityConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SuitabilityConfig {
        &self.config
    }

    /// Run every stage on `census` and `points`.
    ///
    /// Pipeline order:
    ///   1. Load census grids
    ///   2. Reclassify population and demographic classes
    ///   3. Extract metro areas from the headcount grid
    ///   4. Rasterize point density onto the census lattice
    ///   5. Sum demographic and density weights
    pub fn run(&self, census: &CensusTable, points: &PointSet) -> Result<SuitabilityResult> {
        let started = Instant::now();
        let config = &self.config;

        // ── 1. Grid Loader ──────────────────────────────────────────────────
        let classes = stage("load", || load_grids(census, &config.loader))?;
        let geometry = *classes.geometry();
        info!(
            rows = geometry.rows,
            cols = geometry.cols,
            attributes = classes.len(),
            "census grids loaded"
        );

        // ── 2. Class Reclassifier ───────────────────────────────────────────
        let rules: Vec<(&str, &ReclassRule<f64>)> = std::iter::once(&config.population)
            .chain(&config.demographics)
            .map(|attr| (attr.column.as_str(), &attr.rule))
            .collect();
        let mut reclassified = stage("reclassify", || reclassify_all(&classes, &rules))?.into_iter();
        let (_, headcount) = reclassified
            .next()
            .ok_or_else(|| Error::invalid("population", "none", "population rule produced no grid"))?;
        let weights: Vec<(String, Grid<f64>)> = reclassified.collect();

        // ── 3. Metro-Area Extractor ─────────────────────────────────────────
        let metros = stage("metro", || extract_metro_areas(&headcount, &config.metro))?;

        // ── 4. Point-Density Rasterizer ─────────────────────────────────────
        let density = stage("density", || rasterize_density(points, &geometry, &config.density))?;

        // ── 5. Score Compositor ─────────────────────────────────────────────
        // Headcount only delineates metros; it is not a score input.
        let score = stage("compose", || {
            let inputs: Vec<&Grid<f64>> = weights
                .iter()
                .map(|(_, g)| g)
                .chain(std::iter::once(&density.weights))
                .collect();
            sum_grids(&inputs)
        })?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            elapsed_ms,
            metros = metros.regions.len(),
            max_score = score.max_value(),
            "suitability scoring finished"
        );

        Ok(SuitabilityResult {
            geometry,
            classes,
            points: points.clone(),
            headcount,
            weights,
            metros,
            density,
            score,
            elapsed_ms,
        })
    }
}
