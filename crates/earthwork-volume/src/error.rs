//! Error types for volume estimation.

use crate::spatial::SpatialError;
use crate::surface::SurfaceError;
use earthwork_terrain::TerrainError;
use thiserror::Error;

/// System-level failures of a volume estimate.
///
/// Per-point problems never show up here; they are counted in
/// [`AccumulationStats`](crate::AccumulationStats) instead.
#[derive(Debug, Error)]
pub enum VolumeError {
    /// The polygon is malformed.
    #[error("Invalid polygon: {0}")]
    InvalidPolygon(String),

    /// GeoJSON input could not be parsed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The design survey points are unusable.
    #[error("Invalid survey points: {0}")]
    InvalidSurveyPoints(String),

    /// The design surface could not be built.
    #[error("Design surface error: {0}")]
    Surface(#[from] SurfaceError),

    /// The spatial service failed.
    #[error("Spatial service error: {0}")]
    Spatial(#[from] SpatialError),

    /// No sampling grid could be built for the polygon.
    #[error("No sampling grid: {0}")]
    GridUnavailable(String),

    /// The sampling grid exceeds the configured point limit.
    #[error("Sampling grid has {points} points, limit is {limit}")]
    GridTooLarge {
        /// Grid points generated.
        points: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// No terrain data could be obtained for the polygon.
    #[error("Terrain tile store unavailable: {0}")]
    TerrainStoreUnavailable(String),

    /// Tile addressing failed.
    #[error("Terrain error: {0}")]
    Terrain(#[from] TerrainError),

    /// The computation ran past its deadline.
    #[error("Deadline exceeded after {processed} of {total} points")]
    DeadlineExceeded {
        /// Points whose outcome was collected before the deadline.
        processed: usize,
        /// Points in the grid.
        total: usize,
    },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VolumeError {
    /// Short stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            VolumeError::InvalidPolygon(_) | VolumeError::GeoJson(_) => "invalid_polygon",
            VolumeError::InvalidSurveyPoints(_) => "invalid_survey_points",
            VolumeError::Surface(_) => "design_surface",
            VolumeError::Spatial(_) => "spatial_service",
            VolumeError::GridUnavailable(_) => "grid_unavailable",
            VolumeError::GridTooLarge { .. } => "grid_too_large",
            VolumeError::TerrainStoreUnavailable(_) => "terrain_store_unavailable",
            VolumeError::Terrain(_) => "terrain",
            VolumeError::DeadlineExceeded { .. } => "deadline_exceeded",
            VolumeError::Config(_) | VolumeError::Yaml(_) | VolumeError::Io(_) => "config",
        }
    }
}
