//! Point-density rasterization.
//!
//! Pipeline:
//!   bin points → natural breaks (or a fixed table) → classify → class weights.
//!
//! Every in-extent cell holds a density, zero when empty, so empty cells take
//! part in the breaks.

pub mod binning;
pub mod breaks;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classes::ClassBreakTable;
use crate::config::DensityConfig;
use crate::error::{Error, Result};
use crate::geometry::GridGeometry;
use crate::grid::Grid;
use crate::reclass::{classify, reclassify};

pub use binning::{bin_points, bin_weights, BinMode, Point, PointSet};
pub use breaks::{goodness_of_fit, natural_breaks, within_class_ssd};

/// All outputs of the density rasterizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DensityLayer {
    /// Points per cell.
    pub counts: Grid<u32>,
    /// The classified quantity: counts, or summed weights with `use_weights`.
    pub density: Grid<f64>,
    pub table: ClassBreakTable,
    /// Class code per cell; missing where a fixed table does not cover the
    /// density.
    pub classes: Grid<i64>,
    /// Class index as a suitability weight.
    pub weights: Grid<f64>,
}

/// Data-driven class table over the present values of `density`.
pub fn natural_breaks_table(density: &Grid<f64>, classes: usize) -> Result<ClassBreakTable> {
    let values: Vec<f64> = density.values().collect();
    let (min, max) = match (density.min_value(), density.max_value()) {
        (Some(min), Some(max)) => (min, max),
        _ => return Err(Error::invalid("density", "empty grid", "no values to classify")),
    };
    let breaks = natural_breaks(&values, classes)?;
    debug!(?breaks, fit = goodness_of_fit(&values, &breaks), "natural breaks");
    ClassBreakTable::from_breaks(min, &breaks, max)
}

/// Bin `points` onto `geometry` and turn the density into class weights.
pub fn rasterize_density(points: &PointSet, geometry: &GridGeometry, config: &DensityConfig) -> Result<DensityLayer> {
    let counts = bin_points(points, geometry, config.mode)?;
    let density = if config.use_weights {
        bin_weights(points, geometry, config.mode)?
    } else {
        counts.map(f64::from)
    };

    let table = match &config.breaks {
        Some(table) => table.clone(),
        None => natural_breaks_table(&density, config.classes)?,
    };
    let classes = classify(&density, &table);
    let weights = reclassify(&classes, &table.index_rule())?;

    info!(
        points = points.len(),
        binned = counts.values().map(u64::from).sum::<u64>(),
        classes = table.len(),
        "density rasterized"
    );
    Ok(DensityLayer {
        counts,
        density,
        table,
        classes,
        weights,
    })
}
