//! Spatial query seam: polygon area and grid centroids.
//!
//! In production these queries go to a spatial database; [`LocalSpatialService`]
//! answers them in process with the `geo` crate.

use crate::geometry::SamplePoint;
use geo::{BoundingRect, Contains, GeodesicArea, Point, Polygon};
use thiserror::Error;
use tracing::debug;

/// Errors from a spatial service.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// Cell size is zero, negative or not finite.
    #[error("Invalid cell size: {0} degrees")]
    InvalidCellSize(f64),

    /// The polygon has no extent.
    #[error("Polygon has no bounding box")]
    EmptyGeometry,

    /// The candidate grid over the polygon's bounding box is too large to enumerate.
    #[error("Grid of {cells} cells exceeds the limit of {limit}")]
    TooManyCells { cells: u64, limit: u64 },

    /// Backend failure (connection, query).
    #[error("Spatial backend error: {0}")]
    Backend(String),
}

/// Spatial queries needed to build a sampling grid.
pub trait SpatialService: Send + Sync {
    /// Area of `polygon` in square meters.
    fn area_m2(&self, polygon: &Polygon<f64>) -> Result<f64, SpatialError>;

    /// Centroids of the square grid of side `cell_size_deg` that fall inside `polygon`.
    fn grid_centroids(
        &self,
        polygon: &Polygon<f64>,
        cell_size_deg: f64,
    ) -> Result<Vec<SamplePoint>, SpatialError>;
}

impl<T: SpatialService + ?Sized> SpatialService for std::sync::Arc<T> {
    fn area_m2(&self, polygon: &Polygon<f64>) -> Result<f64, SpatialError> {
        (**self).area_m2(polygon)
    }

    fn grid_centroids(
        &self,
        polygon: &Polygon<f64>,
        cell_size_deg: f64,
    ) -> Result<Vec<SamplePoint>, SpatialError> {
        (**self).grid_centroids(polygon, cell_size_deg)
    }
}

/// In-process spatial service.
///
/// Area is geodesic on the WGS84 ellipsoid. Grid cells are aligned to
/// integer multiples of the cell size, so the same polygon always yields the
/// same grid. Centroids come back ordered south to north, then west to east.
#[derive(Debug, Clone)]
pub struct LocalSpatialService {
    max_grid_cells: u64,
}

impl LocalSpatialService {
    /// Default cap on cells enumerated over a polygon's bounding box.
    pub const DEFAULT_MAX_GRID_CELLS: u64 = 16_000_000;

    pub fn new() -> Self {
        Self {
            max_grid_cells: Self::DEFAULT_MAX_GRID_CELLS,
        }
    }

    /// Cap the number of bounding-box cells enumerated per query.
    pub fn with_max_grid_cells(max_grid_cells: u64) -> Self {
        Self { max_grid_cells }
    }
}

impl Default for LocalSpatialService {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialService for LocalSpatialService {
    fn area_m2(&self, polygon: &Polygon<f64>) -> Result<f64, SpatialError> {
        Ok(polygon.geodesic_area_unsigned())
    }

    fn grid_centroids(
        &self,
        polygon: &Polygon<f64>,
        cell_size_deg: f64,
    ) -> Result<Vec<SamplePoint>, SpatialError> {
        if !cell_size_deg.is_finite() || cell_size_deg <= 0.0 {
            return Err(SpatialError::InvalidCellSize(cell_size_deg));
        }
        let rect = polygon.bounding_rect().ok_or(SpatialError::EmptyGeometry)?;

        let min_ix = (rect.min().x / cell_size_deg).floor() as i64;
        let max_ix = (rect.max().x / cell_size_deg).ceil() as i64;
        let min_iy = (rect.min().y / cell_size_deg).floor() as i64;
        let max_iy = (rect.max().y / cell_size_deg).ceil() as i64;

        let cols = (max_ix - min_ix + 1).max(0) as u64;
        let rows = (max_iy - min_iy + 1).max(0) as u64;
        let cells = cols.saturating_mul(rows);
        if cells > self.max_grid_cells {
            return Err(SpatialError::TooManyCells {
                cells,
                limit: self.max_grid_cells,
            });
        }

        let mut points = Vec::new();
        for iy in min_iy..=max_iy {
            let lat = (iy as f64 + 0.5) * cell_size_deg;
            for ix in min_ix..=max_ix {
                let lon = (ix as f64 + 0.5) * cell_size_deg;
                if polygon.contains(&Point::new(lon, lat)) {
                    points.push(SamplePoint::new(lon, lat));
                }
            }
        }

        debug!(
            cell_size_deg,
            candidates = cells,
            inside = points.len(),
            "enumerated grid centroids"
        );
        Ok(points)
    }
}
