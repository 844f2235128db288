//! Geomarketing suitability scoring on regular census grids.
//!
//! Stages, data flowing strictly downward:
//!   loader → reclass → {metro, density} → compose
//!
//! [`SuitabilityPipeline`] runs them in order from a [`SuitabilityConfig`].
//! Each stage is also usable on its own.

pub mod classes;
pub mod compose;
pub mod config;
pub mod density;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod layer;
pub mod loader;
pub mod metro;
pub mod pipeline;
pub mod reclass;

mod par;

pub use classes::{ClassBreakTable, ClassInterval};
pub use compose::sum_grids;
pub use config::{AttributeRule, DensityConfig, LoaderConfig, MetroConfig, SuitabilityConfig};
pub use density::{natural_breaks, rasterize_density, BinMode, DensityLayer, Point, PointSet};
pub use error::{Error, Result};
pub use geometry::{Extent, GridGeometry, RowOrder};
pub use grid::Grid;
pub use layer::{Layer, LayerKind};
pub use loader::{load_grids, AttributeGrids, CensusRecord, CensusTable};
pub use metro::{extract_metro_areas, Connectivity, MetroAreas, Region};
pub use pipeline::{SuitabilityPipeline, SuitabilityResult};
pub use reclass::{classify, reclassify, ReclassRule, RuleRange};

/// Final output of the compositor.
pub type ScoreGrid = Grid<f64>;
