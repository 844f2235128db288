//! Score compositor: element-wise sum of aligned weight grids.

use tracing::debug;

use crate::error::{Error, Result};
use crate::grid::Grid;

/// Sum `grids` cell by cell.
///
/// A missing input counts as zero as long as another input is present at
/// that cell; the result is missing only where every input is missing. All
/// inputs must be aligned with the first ([`Error::GridMismatch`]
/// otherwise), and at least one grid is required.
pub fn sum_grids(grids: &[&Grid<f64>]) -> Result<Grid<f64>> {
    let Some((first, rest)) = grids.split_first() else {
        return Err(Error::invalid("grids", 0, "nothing to sum"));
    };
    let geometry = *first.geometry();
    for g in rest {
        geometry.ensure_aligned(g.geometry())?;
    }

    let mut cells: Vec<Option<f64>> = first.cells().to_vec();
    for g in rest {
        for (acc, v) in cells.iter_mut().zip(g.cells()) {
            if let Some(v) = v {
                *acc = Some(acc.unwrap_or(0.0) + v);
            }
        }
    }
    let out = Grid::from_parts(geometry, cells);
    debug!(inputs = grids.len(), present = out.present_count(), "grids summed");
    Ok(out)
}
