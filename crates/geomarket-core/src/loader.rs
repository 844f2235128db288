//! Grid loader: census tuples on an implied regular lattice → one class-code
//! grid per attribute column.
//!
//! Coordinates are treated as cell centres. Coordinates closer than
//! [`POSITION_MERGE`] of the widest coordinate gap are noisy copies of one
//! lattice position. Per axis, the cell size is the smallest spacing between
//! positions and every coordinate must sit an integral number of cells from
//! the first position, within a relative tolerance of [`LATTICE_TOLERANCE`]
//! of the cell size. Lattice positions with no record stay missing.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LoaderConfig;
use crate::error::{Error, Result};
use crate::geometry::{GridGeometry, RowOrder};
use crate::grid::Grid;

/// Allowed deviation from the lattice, as a fraction of the cell size.
pub const LATTICE_TOLERANCE: f64 = 1e-6;

/// Coordinates whose gap is at most this fraction of the widest gap between
/// sorted coordinates (over both axes) belong to the same lattice position.
pub const POSITION_MERGE: f64 = 1e-3;

/// One census row: a cell-centre coordinate and one class code per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CensusRecord {
    pub x: f64,
    pub y: f64,
    pub values: Vec<Option<i64>>,
}

/// In-memory census extract. Parsing it from disk is the caller's business.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CensusTable {
    pub columns: Vec<String>,
    pub records: Vec<CensusRecord>,
}

impl CensusTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, x: f64, y: f64, values: Vec<Option<i64>>) {
        self.records.push(CensusRecord { x, y, values });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Class-code grids keyed by column name, all sharing one geometry.
/// Keeps the column order of the source table.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeGrids {
    geometry: GridGeometry,
    grids: Vec<(String, Grid<i64>)>,
}

impl AttributeGrids {
    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn get(&self, name: &str) -> Option<&Grid<i64>> {
        self.grids.iter().find(|(n, _)| n == name).map(|(_, g)| g)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.grids.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Grid<i64>)> {
        self.grids.iter().map(|(n, g)| (n.as_str(), g))
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }
}

// ── Lattice inference ────────────────────────────────────────────────────────

/// Regular positions along one axis: `min + i * step` for `i < count`.
#[derive(Debug, Clone, Copy)]
struct AxisLattice {
    min: f64,
    step: f64,
    count: usize,
}

impl AxisLattice {
    fn index_of(&self, v: f64, axis: &str) -> Result<usize> {
        let t = (v - self.min) / self.step;
        let i = t.round();
        if (t - i).abs() > LATTICE_TOLERANCE {
            return Err(Error::malformed(format!(
                "{axis} coordinate {v} is not on the lattice starting at {} with spacing {}",
                self.min, self.step
            )));
        }
        Ok(i as usize)
    }
}

fn sorted_coords(coords: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut v: Vec<f64> = coords.collect();
    v.sort_by(f64::total_cmp);
    v
}

fn widest_gap(sorted: &[f64]) -> f64 {
    sorted.windows(2).map(|w| w[1] - w[0]).fold(0.0, f64::max)
}

/// Lattice positions of sorted coordinates: runs of neighbours at most
/// `merge` apart collapse into their mean.
fn lattice_positions(sorted: &[f64], merge: f64) -> Vec<f64> {
    let mut positions = Vec::new();
    let (mut sum, mut n, mut last) = (0.0, 0usize, f64::NEG_INFINITY);
    for &v in sorted {
        if n > 0 && v - last > merge {
            positions.push(sum / n as f64);
            sum = 0.0;
            n = 0;
        }
        sum += v;
        n += 1;
        last = v;
    }
    if n > 0 {
        positions.push(sum / n as f64);
    }
    positions
}

fn min_spacing(positions: &[f64]) -> Option<f64> {
    positions
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|d| *d > 0.0)
        .reduce(f64::min)
}

/// Axis anchored at the first position; every raw coordinate is checked.
fn build_axis(positions: &[f64], coords: &[f64], step: f64, axis: &str) -> Result<AxisLattice> {
    let mut lattice = AxisLattice {
        min: positions[0],
        step,
        count: 1,
    };
    let mut max_index = 0;
    for &v in coords {
        max_index = max_index.max(lattice.index_of(v, axis)?);
    }
    lattice.count = max_index + 1;
    Ok(lattice)
}

// ── Public entry point ───────────────────────────────────────────────────────

/// Place every record of `table` into one `Grid<i64>` per column.
///
/// Fails with [`Error::MalformedGrid`] when the table is empty, a coordinate
/// is not finite or off-lattice, a record has the wrong number of values, two
/// records share a cell, or the cell size cannot be inferred at all.
pub fn load_grids(table: &CensusTable, config: &LoaderConfig) -> Result<AttributeGrids> {
    if table.records.is_empty() {
        return Err(Error::malformed("census table has no records"));
    }
    let mut seen = HashSet::new();
    for name in &table.columns {
        if !seen.insert(name.as_str()) {
            return Err(Error::malformed(format!("duplicate column '{name}'")));
        }
    }
    for (i, rec) in table.records.iter().enumerate() {
        if !rec.x.is_finite() || !rec.y.is_finite() {
            return Err(Error::malformed(format!(
                "record {i} has non-finite coordinate ({}, {})",
                rec.x, rec.y
            )));
        }
        if rec.values.len() != table.columns.len() {
            return Err(Error::malformed(format!(
                "record {i} has {} values for {} columns",
                rec.values.len(),
                table.columns.len()
            )));
        }
    }

    let xs = sorted_coords(table.records.iter().map(|r| r.x));
    let ys = sorted_coords(table.records.iter().map(|r| r.y));
    let merge = POSITION_MERGE * widest_gap(&xs).max(widest_gap(&ys));
    let px = lattice_positions(&xs, merge);
    let py = lattice_positions(&ys, merge);
    let (step_x, step_y) = match (min_spacing(&px), min_spacing(&py)) {
        (Some(sx), Some(sy)) => (sx, sy),
        (Some(sx), None) => (sx, sx),
        (None, Some(sy)) => (sy, sy),
        (None, None) => {
            return Err(Error::malformed(
                "cannot infer cell size from a single lattice position",
            ))
        }
    };
    let x_axis = build_axis(&px, &xs, step_x, "x")?;
    let y_axis = build_axis(&py, &ys, step_y, "y")?;

    let geometry = GridGeometry::new(
        x_axis.min - step_x / 2.0,
        y_axis.min - step_y / 2.0,
        step_x,
        step_y,
        y_axis.count,
        x_axis.count,
        RowOrder::SouthToNorth,
    )?;
    debug!(
        rows = geometry.rows,
        cols = geometry.cols,
        cell_width = step_x,
        cell_height = step_y,
        records = table.records.len(),
        "inferred census lattice"
    );

    let mut grids: Vec<Grid<i64>> = table.columns.iter().map(|_| Grid::missing(geometry)).collect();
    let mut occupied = vec![false; geometry.len()];
    for rec in &table.records {
        let col = x_axis.index_of(rec.x, "x")?;
        let row = y_axis.index_of(rec.y, "y")?;
        let idx = geometry.index(row, col);
        if occupied[idx] {
            return Err(Error::malformed(format!(
                "two records map to cell ({row}, {col}) at ({}, {})",
                rec.x, rec.y
            )));
        }
        occupied[idx] = true;
        for (grid, value) in grids.iter_mut().zip(&rec.values) {
            let value = value.filter(|code| !config.missing_codes.contains(code));
            grid.set(row, col, value);
        }
    }

    Ok(AttributeGrids {
        geometry,
        grids: table.columns.iter().cloned().zip(grids).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn table(columns: &[&str], rows: &[(f64, f64, Vec<Option<i64>>)]) -> CensusTable {
        let mut t = CensusTable::new(columns.iter().copied());
        for (x, y, v) in rows {
            t.push(*x, *y, v.clone());
        }
        t
    }

    #[test]
    fn four_points_make_two_by_two_grid() {
        let t = table(
            &["v"],
            &[
                (0.0, 0.0, vec![Some(1)]),
                (1.0, 0.0, vec![Some(2)]),
                (0.0, 1.0, vec![Some(3)]),
                (1.0, 1.0, vec![Some(4)]),
            ],
        );
        let grids = load_grids(&t, &LoaderConfig::default()).unwrap();
        let g = grids.get("v").unwrap();
        assert_eq!(
            g.to_rows(),
            vec![vec![Some(1), Some(2)], vec![Some(3), Some(4)]]
        );
        let geo = grids.geometry();
        assert_relative_eq!(geo.cell_width, 1.0);
        assert_relative_eq!(geo.origin_x, -0.5);
        assert_eq!(geo.cell_center(0, 1), (1.0, 0.0));
    }

    #[test]
    fn gaps_in_lattice_are_missing() {
        let t = table(
            &["v"],
            &[
                (100.0, 500.0, vec![Some(1)]),
                (300.0, 500.0, vec![Some(2)]),
                (100.0, 600.0, vec![Some(3)]),
                (200.0, 600.0, vec![Some(4)]),
            ],
        );
        let grids = load_grids(&t, &LoaderConfig::default()).unwrap();
        let g = grids.get("v").unwrap();
        assert_eq!((g.rows(), g.cols()), (2, 3));
        assert_eq!(g.get(0, 1), None);
        assert_eq!(g.get(0, 2), Some(2));
        assert_eq!(g.get(1, 2), None);
    }

    #[test]
    fn irregular_spacing_is_malformed() {
        let t = table(
            &["v"],
            &[
                (0.0, 0.0, vec![Some(1)]),
                (1.0, 0.0, vec![Some(1)]),
                (2.5, 0.0, vec![Some(1)]),
            ],
        );
        let err = load_grids(&t, &LoaderConfig::default()).unwrap_err();
        match err {
            Error::MalformedGrid { reason } => assert!(reason.contains("2.5"), "{reason}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn tiny_float_noise_is_tolerated() {
        let t = table(
            &["v"],
            &[
                (4_321_050.0, 0.0, vec![Some(1)]),
                (4_321_150.0, 0.0, vec![Some(2)]),
                (4_321_250.000_01, 0.0, vec![Some(3)]),
            ],
        );
        let g = load_grids(&t, &LoaderConfig::default()).unwrap();
        assert_eq!(g.get("v").unwrap().get(0, 2), Some(3));
    }

    #[test]
    fn noisy_copy_of_a_position_joins_it() {
        let t = table(
            &["v"],
            &[
                (0.0, 0.0, vec![Some(1)]),
                (1.0, 0.0, vec![Some(2)]),
                (2.0, 0.0, vec![Some(3)]),
                (2.000_000_1, 1.0, vec![Some(4)]),
                (0.0, 1.0, vec![Some(5)]),
            ],
        );
        let grids = load_grids(&t, &LoaderConfig::default()).unwrap();
        let geo = grids.geometry();
        assert_eq!((geo.rows, geo.cols), (2, 3));
        assert_relative_eq!(geo.cell_width, 1.0, epsilon = 1e-6);
        assert_eq!(
            grids.get("v").unwrap().to_rows(),
            vec![vec![Some(1), Some(2), Some(3)], vec![Some(5), None, Some(4)]]
        );
    }

    #[test]
    fn noisy_single_column_borrows_spacing_from_y() {
        let t = table(&["v"], &[(5.0, 0.0, vec![Some(1)]), (5.000_000_1, 10.0, vec![Some(2)])]);
        let geo = *load_grids(&t, &LoaderConfig::default()).unwrap().geometry();
        assert_eq!((geo.rows, geo.cols), (2, 1));
        assert_relative_eq!(geo.cell_width, 10.0);
    }

    #[test]
    fn missing_codes_become_missing() {
        let t = table(
            &["pop", "women"],
            &[
                (0.0, 0.0, vec![Some(-1), Some(2)]),
                (1.0, 0.0, vec![Some(3), Some(-9)]),
                (2.0, 0.0, vec![None, Some(1)]),
            ],
        );
        let grids = load_grids(&t, &LoaderConfig::default()).unwrap();
        let pop = grids.get("pop").unwrap();
        let women = grids.get("women").unwrap();
        assert_eq!(pop.to_rows(), vec![vec![None, Some(3), None]]);
        assert_eq!(women.to_rows(), vec![vec![Some(2), None, Some(1)]]);
        assert_eq!(grids.names().collect::<Vec<_>>(), vec!["pop", "women"]);
    }

    #[test]
    fn single_row_borrows_spacing_from_x() {
        let t = table(&["v"], &[(0.0, 7.0, vec![Some(1)]), (10.0, 7.0, vec![Some(2)])]);
        let grids = load_grids(&t, &LoaderConfig::default()).unwrap();
        let geo = grids.geometry();
        assert_eq!((geo.rows, geo.cols), (1, 2));
        assert_relative_eq!(geo.cell_height, 10.0);
    }

    #[test]
    fn single_point_is_malformed() {
        let t = table(&["v"], &[(0.0, 0.0, vec![Some(1)])]);
        assert!(matches!(
            load_grids(&t, &LoaderConfig::default()),
            Err(Error::MalformedGrid { .. })
        ));
    }

    #[test]
    fn duplicate_cells_and_bad_records_are_malformed() {
        let dup = table(&["v"], &[(0.0, 0.0, vec![Some(1)]), (0.0, 0.0, vec![Some(2)]), (1.0, 0.0, vec![Some(3)])]);
        assert!(matches!(load_grids(&dup, &LoaderConfig::default()), Err(Error::MalformedGrid { .. })));

        let short = table(&["a", "b"], &[(0.0, 0.0, vec![Some(1)]), (1.0, 0.0, vec![Some(1), Some(2)])]);
        assert!(matches!(load_grids(&short, &LoaderConfig::default()), Err(Error::MalformedGrid { .. })));

        let empty = CensusTable::new(["v"]);
        assert!(matches!(load_grids(&empty, &LoaderConfig::default()), Err(Error::MalformedGrid { .. })));

        let nan = table(&["v"], &[(f64::NAN, 0.0, vec![Some(1)]), (1.0, 0.0, vec![Some(2)])]);
        assert!(matches!(load_grids(&nan, &LoaderConfig::default()), Err(Error::MalformedGrid { .. })));
    }
}
