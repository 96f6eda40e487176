//! Adaptive sampling grid over a polygon.

use crate::config::{CellAreaMode, VolumeConfig};
use crate::geometry::SamplePoint;
use crate::spatial::SpatialService;
use crate::{Result, VolumeError};
use geo::{polygon, Centroid, Polygon};
use serde::Serialize;
use tracing::debug;

/// Round to 6 decimal places.
pub fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// Grid cell size in degrees for a polygon of `area_m2`.
///
/// Polygons of at least `min_area_m2` get `round6(sqrt(area / (min_area * divisor)))`,
/// which grows with area so large sites get coarser grids. Anything smaller
/// uses `min_cell_deg`.
pub fn cell_size_for_area(area_m2: f64, min_area_m2: f64, area_divisor: f64, min_cell_deg: f64) -> f64 {
    if area_m2 >= min_area_m2 {
        round6((area_m2 / (min_area_m2 * area_divisor)).sqrt())
    } else {
        min_cell_deg
    }
}

/// Sample points for one polygon and the ground area each one stands for.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingGrid {
    pub points: Vec<SamplePoint>,
    pub cell_size_deg: f64,
    pub cell_ground_area_m2: f64,
    pub polygon_area_m2: f64,
}

impl SamplingGrid {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn summary(&self) -> GridSummary {
        GridSummary {
            cell_size_deg: self.cell_size_deg,
            cell_ground_area_m2: self.cell_ground_area_m2,
            polygon_area_m2: self.polygon_area_m2,
            points: self.points.len(),
        }
    }
}

/// Grid figures reported alongside a volume estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridSummary {
    pub cell_size_deg: f64,
    pub cell_ground_area_m2: f64,
    pub polygon_area_m2: f64,
    pub points: usize,
}

/// Builds sampling grids through a [`SpatialService`].
pub struct SamplingGridGenerator<'a> {
    spatial: &'a dyn SpatialService,
    config: &'a VolumeConfig,
}

impl<'a> SamplingGridGenerator<'a> {
    pub fn new(spatial: &'a dyn SpatialService, config: &'a VolumeConfig) -> Self {
        Self { spatial, config }
    }

    /// Cell size for a polygon of `area_m2` under this generator's config.
    pub fn cell_size(&self, area_m2: f64) -> f64 {
        cell_size_for_area(
            area_m2,
            self.config.min_grid_area_m2,
            self.config.area_divisor,
            self.config.min_cell_size_deg,
        )
    }

    /// Build the sampling grid for `polygon`.
    pub fn build(&self, polygon: &Polygon<f64>) -> Result<SamplingGrid> {
        let polygon_area_m2 = self.spatial.area_m2(polygon)?;
        if !polygon_area_m2.is_finite() || polygon_area_m2 <= 0.0 {
            return Err(VolumeError::GridUnavailable(format!(
                "polygon area is {} m²",
                polygon_area_m2
            )));
        }

        let cell_size_deg = self.cell_size(polygon_area_m2);
        if cell_size_deg <= 0.0 {
            return Err(VolumeError::GridUnavailable(format!(
                "cell size rounds to {} degrees",
                cell_size_deg
            )));
        }

        let (anchor_lon, anchor_lat) = self.anchor(polygon);
        let reference = reference_square(anchor_lon, anchor_lat, cell_size_deg);
        let cell_ground_area_m2 = self.spatial.area_m2(&reference)?;
        if !cell_ground_area_m2.is_finite() || cell_ground_area_m2 <= 0.0 {
            return Err(VolumeError::GridUnavailable(format!(
                "cell ground area is {} m²",
                cell_ground_area_m2
            )));
        }

        let points = self.spatial.grid_centroids(polygon, cell_size_deg)?;
        if points.is_empty() {
            return Err(VolumeError::GridUnavailable(format!(
                "no {}° cell centroid falls inside the polygon",
                cell_size_deg
            )));
        }
        if points.len() > self.config.max_sample_points {
            return Err(VolumeError::GridTooLarge {
                points: points.len(),
                limit: self.config.max_sample_points,
            });
        }

        debug!(
            polygon_area_m2,
            cell_size_deg,
            cell_ground_area_m2,
            anchor_lon,
            anchor_lat,
            points = points.len(),
            "built sampling grid"
        );

        Ok(SamplingGrid {
            points,
            cell_size_deg,
            cell_ground_area_m2,
            polygon_area_m2,
        })
    }

    fn anchor(&self, polygon: &Polygon<f64>) -> (f64, f64) {
        let fixed = (self.config.anchor_lon, self.config.anchor_lat);
        match self.config.cell_area_mode {
            CellAreaMode::FixedAnchor => fixed,
            CellAreaMode::PolygonCentroid => polygon
                .centroid()
                .map(|c| (c.x(), c.y()))
                .unwrap_or(fixed),
        }
    }
}

/// Square of side `size_deg` with its south-west corner at (lon, lat).
fn reference_square(lon: f64, lat: f64, size_deg: f64) -> Polygon<f64> {
    polygon![
        (x: lon, y: lat),
        (x: lon + size_deg, y: lat),
        (x: lon + size_deg, y: lat + size_deg),
        (x: lon, y: lat + size_deg),
    ]
}
