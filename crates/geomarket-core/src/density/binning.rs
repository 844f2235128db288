//! Point binning onto a grid.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::geometry::{Extent, GridGeometry};
use crate::grid::Grid;

/// A point of interest, optionally weighted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub weight: Option<f64>,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, weight: None }
    }

    pub fn weighted(x: f64, y: f64, weight: f64) -> Self {
        Self {
            x,
            y,
            weight: Some(weight),
        }
    }

    /// Weight used when summing; an unweighted point counts once.
    pub fn weight_or_one(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }
}

/// Ordered collection of points of interest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointSet {
    points: Vec<Point>,
}

impl PointSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bounding box of all points; `None` when the set is empty.
    pub fn extent(&self) -> Option<Extent> {
        self.points
            .iter()
            .map(|p| Extent {
                min_x: p.x,
                min_y: p.y,
                max_x: p.x,
                max_y: p.y,
            })
            .reduce(|a, b| a.union(&b))
    }
}

impl FromIterator<Point> for PointSet {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

/// What to do with a point outside the grid extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinMode {
    /// Skip it.
    #[default]
    Drop,
    /// Fail with [`Error::OutOfBounds`].
    Strict,
}

/// Accumulate `amount(point)` into the cell under each point. Every cell
/// starts present at zero.
fn accumulate<T: Copy>(
    points: &PointSet,
    geometry: &GridGeometry,
    mode: BinMode,
    zero: T,
    mut add: impl FnMut(T, &Point) -> T,
) -> Result<Grid<T>> {
    let mut grid = Grid::filled(*geometry, zero);
    let mut dropped = 0usize;
    for p in points.points() {
        match geometry.cell_at(p.x, p.y) {
            Some((row, col)) => {
                let slot = grid.slot_mut(row, col);
                *slot = Some(add(slot.unwrap_or(zero), p));
            }
            None if mode == BinMode::Strict => return Err(Error::OutOfBounds { x: p.x, y: p.y }),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!(dropped, total = points.len(), "points outside grid extent dropped");
    }
    Ok(grid)
}

/// Number of points per cell.
pub fn bin_points(points: &PointSet, geometry: &GridGeometry, mode: BinMode) -> Result<Grid<u32>> {
    accumulate(points, geometry, mode, 0u32, |n, _| n.saturating_add(1))
}

/// Sum of point weights per cell (unweighted points count as 1).
pub fn bin_weights(points: &PointSet, geometry: &GridGeometry, mode: BinMode) -> Result<Grid<f64>> {
    accumulate(points, geometry, mode, 0.0, |sum, p| sum + p.weight_or_one())
}
