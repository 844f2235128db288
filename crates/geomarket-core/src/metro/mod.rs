//! Metro-area extraction.
//!
//! Pipeline:
//!   block sum (k×k) → threshold (> τ) → connected components → regions.
//!
//! The headcount grid is aggregated to a coarser grid, cells above the
//! population threshold are kept, and each connected group of kept cells
//! becomes one [`Region`] whose total is the metro population.

pub mod aggregate;
pub mod components;
pub mod region;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::MetroConfig;
use crate::error::Result;
use crate::geometry::GridGeometry;
use crate::grid::Grid;

pub use aggregate::{aggregate_sum, threshold_above};
pub use components::{label_components, Connectivity};
pub use region::{regions_from_labels, Region};

/// All outputs of metro-area extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetroAreas {
    /// Block-summed headcount on the coarse grid, before thresholding.
    pub aggregated: Grid<f64>,
    /// Region label per coarse cell; missing outside every region.
    pub labels: Grid<u32>,
    pub regions: Vec<Region>,
    /// Aggregation factor used to build `aggregated`.
    pub factor: usize,
    /// Geometry of the headcount grid before aggregation.
    pub source: GridGeometry,
}

impl MetroAreas {
    /// The region covering planar point (x, y), if any.
    pub fn region_at(&self, x: f64, y: f64) -> Option<&Region> {
        let (row, col) = self.labels.geometry().cell_at(x, y)?;
        let label = self.labels.get(row, col)?;
        self.regions.get(label.checked_sub(1)? as usize)
    }

    /// Cells of the input grid covered by `region`, row-major.
    pub fn source_cells(&self, region: &Region) -> Vec<(usize, usize)> {
        let k = self.factor;
        let mut out = Vec::with_capacity(region.cells().len() * k * k);
        for &(row, col) in region.cells() {
            for r in row * k..((row + 1) * k).min(self.source.rows) {
                for c in col * k..((col + 1) * k).min(self.source.cols) {
                    out.push((r, c));
                }
            }
        }
        out.sort_unstable();
        out
    }

    /// Combined population of every region.
    pub fn total_population(&self) -> f64 {
        self.regions.iter().map(Region::total).sum()
    }
}

/// Run aggregation, thresholding, labelling and region building.
///
/// A grid with no cell above the threshold yields an empty region list.
pub fn extract_metro_areas(headcount: &Grid<f64>, config: &MetroConfig) -> Result<MetroAreas> {
    let aggregated = aggregate_sum(headcount, config.factor)?;
    let kept = threshold_above(&aggregated, config.threshold);
    let (labels, count) = label_components(&kept, config.connectivity);
    let regions = regions_from_labels(&labels, count, &kept)?;

    for r in &regions {
        debug!(
            label = r.label(),
            cells = r.cells().len(),
            population = r.total(),
            centroid_x = r.centroid().0,
            centroid_y = r.centroid().1,
            "metro region"
        );
    }
    info!(
        factor = config.factor,
        threshold = config.threshold,
        regions = regions.len(),
        "metro areas extracted"
    );

    Ok(MetroAreas {
        aggregated,
        labels,
        regions,
        factor: config.factor,
        source: *headcount.geometry(),
    })
}
