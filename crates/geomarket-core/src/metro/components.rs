//! Connected-component labelling of present cells (flood fill).

use serde::{Deserialize, Serialize};

use crate::grid::Grid;

/// Which neighbours count as connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// Von Neumann neighbourhood: cells sharing an edge.
    #[default]
    Four,
    /// Moore neighbourhood: cells sharing an edge or a corner.
    Eight,
}

const FOUR: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
const EIGHT: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

impl Connectivity {
    fn offsets(self) -> &'static [(isize, isize)] {
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

/// Label every maximal connected group of present cells.
///
/// Returns the label grid (missing where the input is missing) and the
/// number of components. Labels run from 1 in row-major order of each
/// component's first cell.
pub fn label_components<T: Copy>(grid: &Grid<T>, connectivity: Connectivity) -> (Grid<u32>, u32) {
    label_from_seeds(grid, connectivity, 0..grid.cells().len())
}

/// Flood fill starting from seeds in the given visiting order.
pub(crate) fn label_from_seeds<T: Copy>(
    grid: &Grid<T>,
    connectivity: Connectivity,
    seeds: impl Iterator<Item = usize>,
) -> (Grid<u32>, u32) {
    let geo = *grid.geometry();
    let (rows, cols) = (geo.rows, geo.cols);
    let active = grid.cells();
    let mut labels: Vec<Option<u32>> = vec![None; active.len()];
    let mut next = 0u32;
    let mut stack = Vec::new();

    for seed in seeds {
        if active[seed].is_none() || labels[seed].is_some() {
            continue;
        }
        next += 1;
        labels[seed] = Some(next);
        stack.push(seed);

        while let Some(idx) = stack.pop() {
            let (r, c) = ((idx / cols) as isize, (idx % cols) as isize);
            for &(dr, dc) in connectivity.offsets() {
                let (nr, nc) = (r + dr, c + dc);
                if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                    continue;
                }
                let n = geo.index(nr as usize, nc as usize);
                if active[n].is_some() && labels[n].is_none() {
                    labels[n] = Some(next);
                    stack.push(n);
                }
            }
        }
    }

    (Grid::from_parts(geo, labels), next)
}
