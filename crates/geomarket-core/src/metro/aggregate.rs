//! Block aggregation and thresholding of a population grid.

use crate::error::Result;
use crate::grid::Grid;

/// Sum `factor × factor` blocks into a coarser grid.
///
/// Missing cells contribute nothing. Blocks hanging over the right or top
/// edge aggregate only their in-range cells. A block without any present
/// cell is missing. `factor == 1` returns the same values.
pub fn aggregate_sum(grid: &Grid<f64>, factor: usize) -> Result<Grid<f64>> {
    let geometry = grid.geometry().coarsen(factor)?;
    let mut out = Grid::missing(geometry);
    for (row, col, value) in grid.iter() {
        if let Some(v) = value {
            let slot = out.slot_mut(row / factor, col / factor);
            *slot = Some(slot.unwrap_or(0.0) + v);
        }
    }
    Ok(out)
}

/// Keep cells whose value is strictly greater than `min`; everything else
/// becomes missing.
pub fn threshold_above(grid: &Grid<f64>, min: f64) -> Grid<f64> {
    let cells = grid
        .cells()
        .iter()
        .map(|v| v.filter(|&x| x > min))
        .collect();
    Grid::from_parts(*grid.geometry(), cells)
}
