//! # earthwork-volume
//!
//! Cut/fill (excavation/fill) volume estimation for a polygon against a
//! design surface, using Terrain-RGB tiles for existing ground elevation.
//!
//! ## Pipeline
//!
//! 1. The polygon's geodesic area picks a grid cell size; grid centroids
//!    inside the polygon become sample points ([`SamplingGridGenerator`]).
//! 2. Terrain tiles covering the polygon are fetched once and decoded lazily
//!    ([`earthwork_terrain::ElevationSampler`]).
//! 3. A bounded worker pool evaluates every point against the design surface
//!    and the ground ([`VolumeAccumulator`]); `(ground - design) * cell_area`
//!    goes to excavation when negative and to fill when positive.
//!
//! The spatial queries and the design surface sit behind traits
//! ([`SpatialService`], [`DesignSurfaceBuilder`]) with in-process adapters
//! ([`LocalSpatialService`], [`DelaunaySurfaceBuilder`]).
//!
//! ## Example
//!
//! ```no_run
//! use earthwork_terrain::DirectoryTileStore;
//! use earthwork_volume::{
//!     parse_polygon_geojson, DelaunaySurfaceBuilder, LocalSpatialService, SurveyPoint, VolumeConfig,
//!     VolumeEngine,
//! };
//! use std::sync::Arc;
//!
//! let engine = VolumeEngine::new(
//!     VolumeConfig::default(),
//!     Arc::new(DirectoryTileStore::new("./terrain")?),
//!     Arc::new(LocalSpatialService::new()),
//!     Arc::new(DelaunaySurfaceBuilder),
//! )?;
//!
//! let polygon = parse_polygon_geojson(&std::fs::read_to_string("site.geojson")?)?;
//! let design = vec![
//!     SurveyPoint::new(104.0650, 30.6590, 502.0),
//!     SurveyPoint::new(104.0670, 30.6590, 502.5),
//!     SurveyPoint::new(104.0660, 30.6605, 503.0),
//! ];
//!
//! let report = engine.estimate_volume(&polygon, &design)?;
//! println!("cut {:.1} m³, fill {:.1} m³", report.result.excavation, report.result.fill);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod accumulate;
mod config;
mod engine;
mod error;
mod geometry;
mod grid;
mod spatial;
mod surface;

pub use accumulate::{
    evaluate_point, reduce_outcomes, Accumulation, AccumulationStats, AccumulatorOptions, ElevationPair,
    PointOutcome, SkipReason, VolumeAccumulator, VolumeResult,
};
pub use config::{CellAreaMode, VolumeConfig};
pub use engine::{TileSummary, VolumeEngine, VolumeReport};
pub use error::VolumeError;
pub use geometry::{
    parse_polygon_geojson, polygon_from_rings, validate_polygon, validate_survey_points, SamplePoint,
    SurveyPoint,
};
pub use grid::{cell_size_for_area, round6, GridSummary, SamplingGrid, SamplingGridGenerator};
pub use spatial::{LocalSpatialService, SpatialError, SpatialService};
pub use surface::{DelaunaySurface, DelaunaySurfaceBuilder, DesignSurface, DesignSurfaceBuilder, SurfaceError};

/// Result type for volume operations.
pub type Result<T> = std::result::Result<T, VolumeError>;
