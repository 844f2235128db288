use serde::Serialize;

use crate::density::PointSet;
use crate::geometry::{Extent, GridGeometry};
use crate::grid::Grid;
use crate::metro::Region;

/// Kind tag of a [`Layer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Classes,
    Values,
    Counts,
    Points,
    Regions,
}

/// Any intermediate or final product of a suitability run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Layer<'a> {
    Classes(&'a Grid<i64>),
    Values(&'a Grid<f64>),
    Counts(&'a Grid<u32>),
    Points(&'a PointSet),
    /// Regions with the grid their cells index into.
    Regions(&'a [Region], &'a GridGeometry),
}

impl Layer<'_> {
    pub fn kind(&self) -> LayerKind {
        match self {
            Layer::Classes(_) => LayerKind::Classes,
            Layer::Values(_) => LayerKind::Values,
            Layer::Counts(_) => LayerKind::Counts,
            Layer::Points(_) => LayerKind::Points,
            Layer::Regions(..) => LayerKind::Regions,
        }
    }

    /// Geometry of grid-backed layers.
    pub fn geometry(&self) -> Option<&GridGeometry> {
        match self {
            Layer::Classes(g) => Some(g.geometry()),
            Layer::Values(g) => Some(g.geometry()),
            Layer::Counts(g) => Some(g.geometry()),
            Layer::Points(_) | Layer::Regions(..) => None,
        }
    }

    /// Bounding box of the layer's content. Regions cover their member
    /// cells; an empty point set or region list has no extent.
    pub fn extent(&self) -> Option<Extent> {
        match self {
            Layer::Points(p) => p.extent(),
            Layer::Regions(regions, geo) => regions
                .iter()
                .flat_map(|r| r.cells().iter())
                .map(|&(row, col)| cell_extent(geo, row, col))
                .reduce(|a, b| a.union(&b)),
            _ => self.geometry().map(GridGeometry::extent),
        }
    }
}

fn cell_extent(geo: &GridGeometry, row: usize, col: usize) -> Extent {
    let (x, y) = geo.cell_center(row, col);
    let (hw, hh) = (geo.cell_width / 2.0, geo.cell_height / 2.0);
    Extent {
        min_x: x - hw,
        min_y: y - hh,
        max_x: x + hw,
        max_y: y + hh,
    }
}
