//! CSV readers for census extracts, point sets and plain value columns.

use std::path::Path;

use anyhow::{bail, Context, Result};
use geomarket_core::{CensusTable, Point, PointSet};
use serde::Deserialize;

fn reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("cannot open {}", path.display()))
}

fn parse_f64(field: &str, what: &str, line: u64) -> Result<f64> {
    field
        .parse()
        .with_context(|| format!("line {line}: {what} '{field}' is not a number"))
}

/// Census CSV: `x,y,<attribute…>`. Empty attribute fields are missing.
pub fn read_census(path: &Path) -> Result<CensusTable> {
    let mut rdr = reader(path)?;
    let headers = rdr.headers()?.clone();
    if headers.len() < 3 || &headers[0] != "x" || &headers[1] != "y" {
        bail!(
            "{}: expected header 'x,y,<attributes...>', found '{}'",
            path.display(),
            headers.iter().collect::<Vec<_>>().join(",")
        );
    }

    let mut table = CensusTable::new(headers.iter().skip(2));
    for record in rdr.records() {
        let record = record.with_context(|| format!("malformed row in {}", path.display()))?;
        let line = record.position().map_or(0, |p| p.line());
        let x = parse_f64(&record[0], "x", line)?;
        let y = parse_f64(&record[1], "y", line)?;
        let values = record
            .iter()
            .skip(2)
            .map(|field| {
                if field.is_empty() {
                    Ok(None)
                } else {
                    field
                        .parse::<i64>()
                        .map(Some)
                        .with_context(|| format!("line {line}: class code '{field}' is not an integer"))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        table.push(x, y, values);
    }
    Ok(table)
}

#[derive(Debug, Deserialize)]
struct PointRow {
    x: f64,
    y: f64,
    #[serde(default)]
    weight: Option<f64>,
}

/// Points CSV: `x,y` with an optional `weight` column.
pub fn read_points(path: &Path) -> Result<PointSet> {
    let mut rdr = reader(path)?;
    rdr.deserialize::<PointRow>()
        .map(|row| {
            let row = row.with_context(|| format!("malformed point in {}", path.display()))?;
            Ok(Point {
                x: row.x,
                y: row.y,
                weight: row.weight,
            })
        })
        .collect()
}

/// Numeric values of one column; the first column when `column` is `None`.
/// Empty fields are skipped.
pub fn read_column(path: &Path, column: Option<&str>) -> Result<Vec<f64>> {
    let mut rdr = reader(path)?;
    let headers = rdr.headers()?.clone();
    let index = match column {
        None => 0,
        Some(name) => headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("{}: no column named '{name}'", path.display()))?,
    };

    let mut values = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());
        match record.get(index) {
            Some("") | None => {}
            Some(field) => values.push(parse_f64(field, "value", line)?),
        }
    }
    Ok(values)
}
