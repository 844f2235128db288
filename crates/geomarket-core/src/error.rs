//! Error type shared by every pipeline stage.

use thiserror::Error;

/// Everything that can abort a pipeline stage.
///
/// Errors are deterministic: the same input always fails the same way, so
/// nothing here is retried.
#[derive(Error, Debug)]
pub enum Error {
    /// The census lattice is irregular or otherwise cannot be mapped to cells.
    #[error("malformed grid: {reason}")]
    MalformedGrid { reason: String },

    /// A present class code has no entry in the reclassification rule.
    #[error("class code {code} at cell ({row}, {col}) has no reclassification rule")]
    UnmappedClass { code: i64, row: usize, col: usize },

    /// Two grids that must be combined do not share geometry.
    #[error("grid geometry mismatch: expected {expected}, found {found}")]
    GridMismatch { expected: String, found: String },

    /// Strict binning saw a point outside the grid extent.
    #[error("point ({x}, {y}) lies outside the grid extent")]
    OutOfBounds { x: f64, y: f64 },

    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("buffer of {found} cells does not match {rows}x{cols} grid")]
    InvalidDimensions {
        rows: usize,
        cols: usize,
        found: usize,
    },

    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedGrid {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
