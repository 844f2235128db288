use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::geometry::GridGeometry;

/// A dense 2D grid of optional cell values, row-major.
/// `None` marks a missing cell; there are no sentinel values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid<T> {
    geometry: GridGeometry,
    cells: Vec<Option<T>>,
}

#[derive(Deserialize)]
struct RawGrid<T> {
    geometry: GridGeometry,
    cells: Vec<Option<T>>,
}

/// Deserialised grids go through the same checks as [`Grid::from_cells`],
/// with the geometry revalidated.
impl<'de, T: Deserialize<'de> + Copy> Deserialize<'de> for Grid<T> {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = RawGrid::<T>::deserialize(d)?;
        let g = raw.geometry;
        let geometry = GridGeometry::new(
            g.origin_x,
            g.origin_y,
            g.cell_width,
            g.cell_height,
            g.rows,
            g.cols,
            g.row_order,
        )
        .map_err(serde::de::Error::custom)?;
        if geometry.rows.checked_mul(geometry.cols).is_none() {
            return Err(serde::de::Error::custom(format!(
                "grid dimensions {}x{} overflow",
                geometry.rows, geometry.cols
            )));
        }
        Self::from_cells(geometry, raw.cells).map_err(serde::de::Error::custom)
    }
}

impl<T: Copy> Grid<T> {
    /// Create a grid with every cell missing.
    pub fn missing(geometry: GridGeometry) -> Self {
        Self {
            cells: vec![None; geometry.len()],
            geometry,
        }
    }

    /// Create a grid with every cell set to `value`.
    pub fn filled(geometry: GridGeometry, value: T) -> Self {
        Self {
            cells: vec![Some(value); geometry.len()],
            geometry,
        }
    }

    /// Wrap an existing row-major buffer.
    pub fn from_cells(geometry: GridGeometry, cells: Vec<Option<T>>) -> Result<Self> {
        if cells.len() != geometry.len() {
            return Err(Error::InvalidDimensions {
                rows: geometry.rows,
                cols: geometry.cols,
                found: cells.len(),
            });
        }
        Ok(Self { geometry, cells })
    }

    /// Internal constructor for buffers built from an existing geometry.
    pub(crate) fn from_parts(geometry: GridGeometry, cells: Vec<Option<T>>) -> Self {
        debug_assert_eq!(cells.len(), geometry.len());
        Self { geometry, cells }
    }

    /// Build from nested rows (row 0 first), mostly for fixtures.
    pub fn from_rows(geometry: GridGeometry, rows: Vec<Vec<Option<T>>>) -> Result<Self> {
        if rows.len() != geometry.rows || rows.iter().any(|r| r.len() != geometry.cols) {
            return Err(Error::InvalidDimensions {
                rows: geometry.rows,
                cols: geometry.cols,
                found: rows.iter().map(Vec::len).sum(),
            });
        }
        Self::from_cells(geometry, rows.into_iter().flatten().collect())
    }

    #[inline]
    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.geometry.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.geometry.cols
    }

    #[inline]
    pub fn cells(&self) -> &[Option<T>] {
        &self.cells
    }

    /// Value at (row, col); `None` when missing or out of range.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        if row >= self.rows() || col >= self.cols() {
            return None;
        }
        self.cells[self.geometry.index(row, col)]
    }

    /// Overwrite a cell. Panics when (row, col) is out of range.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: Option<T>) {
        assert!(
            row < self.rows() && col < self.cols(),
            "cell ({row}, {col}) outside {}x{} grid",
            self.rows(),
            self.cols()
        );
        let idx = self.geometry.index(row, col);
        self.cells[idx] = value;
    }

    /// Mutable access to a present-or-missing cell slot.
    #[inline]
    pub(crate) fn slot_mut(&mut self, row: usize, col: usize) -> &mut Option<T> {
        let idx = self.geometry.index(row, col);
        &mut self.cells[idx]
    }

    /// Iterate `(row, col, value)` over every cell in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, Option<T>)> + '_ {
        let cols = self.cols().max(1);
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, v)| (i / cols, i % cols, *v))
    }

    /// Present values in row-major order.
    pub fn values(&self) -> impl Iterator<Item = T> + '_ {
        self.cells.iter().filter_map(|v| *v)
    }

    pub fn present_count(&self) -> usize {
        self.cells.iter().filter(|v| v.is_some()).count()
    }

    /// Apply `f` to every present value; missing stays missing.
    pub fn map<U: Copy>(&self, mut f: impl FnMut(T) -> U) -> Grid<U> {
        Grid {
            geometry: self.geometry,
            cells: self.cells.iter().map(|v| v.map(&mut f)).collect(),
        }
    }

    /// Rows as nested vectors (row 0 first).
    pub fn to_rows(&self) -> Vec<Vec<Option<T>>> {
        let cols = self.cols();
        if cols == 0 {
            return vec![Vec::new(); self.rows()];
        }
        self.cells.chunks(cols).map(<[Option<T>]>::to_vec).collect()
    }
}

impl Grid<f64> {
    /// Sum of present values.
    pub fn total(&self) -> f64 {
        self.values().sum()
    }

    pub fn min_value(&self) -> Option<f64> {
        self.values().reduce(f64::min)
    }

    pub fn max_value(&self) -> Option<f64> {
        self.values().reduce(f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom(rows: usize, cols: usize) -> GridGeometry {
        GridGeometry::square(0.0, 0.0, 1.0, rows, cols).unwrap()
    }

    #[test]
    fn from_cells_rejects_wrong_length() {
        let err = Grid::<u32>::from_cells(geom(2, 2), vec![Some(1); 3]).unwrap_err();
        assert!(matches!(err, Error::InvalidDimensions { found: 3, .. }));
    }

    #[test]
    fn deserialize_checks_buffer_length() {
        let g = Grid::from_rows(geom(2, 2), vec![vec![Some(1u32), None], vec![Some(3), Some(4)]]).unwrap();
        let json = serde_json::to_string(&g).unwrap();
        assert_eq!(serde_json::from_str::<Grid<u32>>(&json).unwrap(), g);

        let short = json.replace("[1,null,3,4]", "[1,null,3]");
        assert_ne!(short, json);
        assert!(serde_json::from_str::<Grid<u32>>(&short).is_err());

        let flat = json.replace("\"cell_width\":1.0", "\"cell_width\":0.0");
        assert_ne!(flat, json);
        assert!(serde_json::from_str::<Grid<u32>>(&flat).is_err());
    }

    #[test]
    fn get_out_of_range_is_none() {
        let g = Grid::filled(geom(2, 3), 7u32);
        assert_eq!(g.get(1, 2), Some(7));
        assert_eq!(g.get(2, 0), None);
        assert_eq!(g.get(0, 3), None);
    }

    #[test]
    fn iter_is_row_major() {
        let g = Grid::from_rows(geom(2, 2), vec![vec![Some(1), None], vec![Some(3), Some(4)]]).unwrap();
        let seen: Vec<_> = g.iter().collect();
        assert_eq!(
            seen,
            vec![(0, 0, Some(1)), (0, 1, None), (1, 0, Some(3)), (1, 1, Some(4))]
        );
        assert_eq!(g.present_count(), 3);
    }

    #[test]
    fn map_keeps_missing() {
        let g = Grid::from_rows(geom(1, 3), vec![vec![Some(2i64), None, Some(5)]]).unwrap();
        let doubled = g.map(|v| v as f64 * 2.0);
        assert_eq!(doubled.to_rows(), vec![vec![Some(4.0), None, Some(10.0)]]);
        assert_eq!(doubled.total(), 14.0);
        assert_eq!(doubled.max_value(), Some(10.0));
    }
}
