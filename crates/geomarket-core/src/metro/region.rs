use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::grid::Grid;

/// A connected group of cells with its centroid and summed value.
///
/// Everything but the name is fixed at construction; names come from an
/// external gazetteer or reverse geocoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    label: u32,
    cells: Vec<(usize, usize)>,
    centroid: (f64, f64),
    total: f64,
    area: f64,
    name: Option<String>,
}

impl Region {
    pub fn label(&self) -> u32 {
        self.label
    }

    /// Member cells as (row, col), row-major.
    pub fn cells(&self) -> &[(usize, usize)] {
        &self.cells
    }

    /// Arithmetic mean of the member cell centers.
    pub fn centroid(&self) -> (f64, f64) {
        self.centroid
    }

    /// Sum of the member cell values (the metro population).
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Covered area in squared map units.
    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn contains_cell(&self, row: usize, col: usize) -> bool {
        self.cells.binary_search(&(row, col)).is_ok()
    }
}

/// Build one [`Region`] per label `1..=count`, summing `values` over members.
///
/// `values` must share the label grid's geometry.
pub fn regions_from_labels(labels: &Grid<u32>, count: u32, values: &Grid<f64>) -> Result<Vec<Region>> {
    let geo = labels.geometry();
    geo.ensure_aligned(values.geometry())?;

    let mut members: Vec<Vec<(usize, usize)>> = vec![Vec::new(); count as usize];
    for (row, col, label) in labels.iter() {
        if let Some(l) = label.filter(|&l| l >= 1 && l <= count) {
            members[(l - 1) as usize].push((row, col));
        }
    }

    let cell_area = geo.cell_width * geo.cell_height;
    Ok(members
        .into_iter()
        .enumerate()
        .map(|(i, cells)| {
            let n = cells.len().max(1) as f64;
            let (sx, sy, total) = cells.iter().fold((0.0, 0.0, 0.0), |(sx, sy, t), &(r, c)| {
                let (x, y) = geo.cell_center(r, c);
                (sx + x, sy + y, t + values.get(r, c).unwrap_or(0.0))
            });
            Region {
                label: i as u32 + 1,
                area: cells.len() as f64 * cell_area,
                centroid: (sx / n, sy / n),
                total,
                cells,
                name: None,
            }
        })
        .collect())
}
