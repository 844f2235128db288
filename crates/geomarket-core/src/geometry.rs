//! Affine mapping between (row, col) cell indices and planar (x, y) coordinates.
//! All coordinate math uses f64.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Relative tolerance used when comparing the geometry of two grids.
const ALIGN_TOLERANCE: f64 = 1e-9;

/// Direction in which row indices advance along the y axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOrder {
    /// Row 0 is the southernmost row; `origin_y` is the south edge.
    #[default]
    SouthToNorth,
    /// Row 0 is the northernmost row; `origin_y` is the north edge.
    NorthToSouth,
}

/// Axis-aligned bounding box in planar coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Smallest extent covering both.
    pub fn union(&self, other: &Extent) -> Extent {
        Extent {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

/// Placement and shape of a regular, axis-aligned grid.
///
/// `origin_x` is the west edge of column 0. `origin_y` is the outer edge of
/// row 0, which is the south edge for [`RowOrder::SouthToNorth`] and the
/// north edge for [`RowOrder::NorthToSouth`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub origin_x: f64,
    pub origin_y: f64,
    pub cell_width: f64,
    pub cell_height: f64,
    pub rows: usize,
    pub cols: usize,
    #[serde(default)]
    pub row_order: RowOrder,
}

impl GridGeometry {
    /// Build a validated geometry. Cell sizes must be finite and positive.
    pub fn new(
        origin_x: f64,
        origin_y: f64,
        cell_width: f64,
        cell_height: f64,
        rows: usize,
        cols: usize,
        row_order: RowOrder,
    ) -> Result<Self> {
        if !origin_x.is_finite() || !origin_y.is_finite() {
            return Err(Error::invalid(
                "origin",
                format!("({origin_x}, {origin_y})"),
                "origin must be finite",
            ));
        }
        for (name, size) in [("cell_width", cell_width), ("cell_height", cell_height)] {
            if !size.is_finite() || size <= 0.0 {
                return Err(Error::invalid(name, size, "cell size must be finite and positive"));
            }
        }
        Ok(Self {
            origin_x,
            origin_y,
            cell_width,
            cell_height,
            rows,
            cols,
            row_order,
        })
    }

    /// Square cells, rows growing northwards.
    pub fn square(origin_x: f64, origin_y: f64, cell_size: f64, rows: usize, cols: usize) -> Result<Self> {
        Self::new(origin_x, origin_y, cell_size, cell_size, rows, cols, RowOrder::SouthToNorth)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Planar coordinate of the centre of cell (row, col).
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        let x = self.origin_x + (col as f64 + 0.5) * self.cell_width;
        let dy = (row as f64 + 0.5) * self.cell_height;
        let y = match self.row_order {
            RowOrder::SouthToNorth => self.origin_y + dy,
            RowOrder::NorthToSouth => self.origin_y - dy,
        };
        (x, y)
    }

    /// Cell containing (x, y), using floor((coordinate − origin) / cell size).
    ///
    /// Cells are closed on their lower edges and open on their upper edges,
    /// so a point on the far boundary of the extent maps to no cell.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let fc = ((x - self.origin_x) / self.cell_width).floor();
        let fr = match self.row_order {
            RowOrder::SouthToNorth => ((y - self.origin_y) / self.cell_height).floor(),
            RowOrder::NorthToSouth => ((self.origin_y - y) / self.cell_height).floor(),
        };
        if fc < 0.0 || fr < 0.0 || fc >= self.cols as f64 || fr >= self.rows as f64 {
            return None;
        }
        Some((fr as usize, fc as usize))
    }

    pub fn extent(&self) -> Extent {
        let width = self.cols as f64 * self.cell_width;
        let height = self.rows as f64 * self.cell_height;
        let (min_y, max_y) = match self.row_order {
            RowOrder::SouthToNorth => (self.origin_y, self.origin_y + height),
            RowOrder::NorthToSouth => (self.origin_y - height, self.origin_y),
        };
        Extent {
            min_x: self.origin_x,
            min_y,
            max_x: self.origin_x + width,
            max_y,
        }
    }

    /// Geometry of the grid produced by aggregating `factor × factor` blocks.
    /// Partial edge blocks still get a cell, so dimensions round up.
    pub fn coarsen(&self, factor: usize) -> Result<Self> {
        if factor == 0 {
            return Err(Error::invalid("factor", factor, "aggregation factor must be at least 1"));
        }
        Ok(Self {
            cell_width: self.cell_width * factor as f64,
            cell_height: self.cell_height * factor as f64,
            rows: self.rows.div_ceil(factor),
            cols: self.cols.div_ceil(factor),
            ..*self
        })
    }

    /// Whether two grids can be combined cell by cell.
    pub fn is_aligned_with(&self, other: &GridGeometry) -> bool {
        self.rows == other.rows
            && self.cols == other.cols
            && self.row_order == other.row_order
            && close(self.origin_x, other.origin_x, self.cell_width)
            && close(self.origin_y, other.origin_y, self.cell_height)
            && close(self.cell_width, other.cell_width, self.cell_width)
            && close(self.cell_height, other.cell_height, self.cell_height)
    }

    /// `Ok(())` when aligned, otherwise a [`Error::GridMismatch`] naming both.
    pub fn ensure_aligned(&self, other: &GridGeometry) -> Result<()> {
        if self.is_aligned_with(other) {
            Ok(())
        } else {
            Err(Error::GridMismatch {
                expected: self.to_string(),
                found: other.to_string(),
            })
        }
    }
}

impl fmt::Display for GridGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} cells of {}x{} at ({}, {})",
            self.rows, self.cols, self.cell_width, self.cell_height, self.origin_x, self.origin_y
        )
    }
}

/// Equality relative to `scale` (a cell size), so large projected
/// coordinates compare sensibly.
fn close(a: f64, b: f64, scale: f64) -> bool {
    (a - b).abs() <= ALIGN_TOLERANCE * scale.abs().max(a.abs()).max(b.abs()).max(1.0)
}
