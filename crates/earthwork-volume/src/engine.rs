//! Caller-facing volume estimation.

use crate::accumulate::{AccumulationStats, AccumulatorOptions, SkipReason, VolumeAccumulator, VolumeResult};
use crate::config::VolumeConfig;
use crate::geometry::{validate_polygon, validate_survey_points, SamplePoint, SurveyPoint};
use crate::grid::{GridSummary, SamplingGridGenerator};
use crate::spatial::SpatialService;
use crate::surface::DesignSurfaceBuilder;
use crate::{Result, VolumeError};
use earthwork_metrics::metric_defs;
use earthwork_terrain::{ElevationSampler, TerrainTileStore, TileCoord};
use geo::Polygon;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Terrain tiles used by one estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TileSummary {
    pub zoom: u8,
    /// Distinct tiles holding at least one sample point.
    pub requested: usize,
    /// Tiles the store returned.
    pub fetched: usize,
    /// Fetched tiles that failed to decode.
    pub undecodable: usize,
}

/// Everything known about one completed estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeReport {
    pub result: VolumeResult,
    pub grid: GridSummary,
    pub tiles: TileSummary,
    pub stats: AccumulationStats,
    pub elapsed_secs: f64,
}

/// Estimates cut and fill volumes for a polygon against a design surface.
///
/// Collaborators are injected at construction and shared read-only, so one
/// engine can serve concurrent estimates.
pub struct VolumeEngine {
    config: VolumeConfig,
    tiles: Arc<dyn TerrainTileStore>,
    spatial: Arc<dyn SpatialService>,
    surfaces: Arc<dyn DesignSurfaceBuilder>,
}

impl std::fmt::Debug for VolumeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeEngine")
            .field("config", &self.config)
            .field("tiles", &self.tiles.describe())
            .finish_non_exhaustive()
    }
}

impl VolumeEngine {
    pub fn new(
        config: VolumeConfig,
        tiles: Arc<dyn TerrainTileStore>,
        spatial: Arc<dyn SpatialService>,
        surfaces: Arc<dyn DesignSurfaceBuilder>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tiles,
            spatial,
            surfaces,
        })
    }

    pub fn config(&self) -> &VolumeConfig {
        &self.config
    }

    /// Estimate excavation and fill inside `polygon` relative to the surface
    /// defined by `survey_points`.
    ///
    /// Points that cannot be evaluated are skipped and counted in the
    /// report's stats. Errors are reserved for invalid input, a missing grid
    /// or terrain source, an unbuildable design surface, and an expired deadline.
    pub fn estimate_volume(&self, polygon: &Polygon<f64>, survey_points: &[SurveyPoint]) -> Result<VolumeReport> {
        let started = Instant::now();
        let outcome = self.run(polygon, survey_points, started);
        let elapsed = started.elapsed().as_secs_f64();

        metrics::histogram!(metric_defs::ESTIMATE_DURATION.name).record(elapsed);
        match &outcome {
            Ok(_) => metrics::counter!(metric_defs::ESTIMATES_COMPLETED.name).increment(1),
            Err(e) => {
                metrics::counter!(metric_defs::ESTIMATES_FAILED.name, "error" => e.kind()).increment(1);
                warn!(error = %e, elapsed_secs = elapsed, "volume estimate failed");
            }
        }
        outcome
    }

    fn run(&self, polygon: &Polygon<f64>, survey_points: &[SurveyPoint], started: Instant) -> Result<VolumeReport> {
        let deadline = self.config.deadline().and_then(|d| started.checked_add(d));

        validate_polygon(polygon)?;
        validate_survey_points(survey_points)?;

        let surface = self.surfaces.build(survey_points)?;
        debug!(survey_points = survey_points.len(), "design surface ready");

        let grid = SamplingGridGenerator::new(self.spatial.as_ref(), &self.config).build(polygon)?;
        metrics::histogram!(metric_defs::GRID_POINTS.name).record(grid.len() as f64);

        let coords = self.candidate_tiles(&grid.points);
        let fetched = self.tiles.fetch_tiles(&coords).map_err(|e| {
            VolumeError::TerrainStoreUnavailable(format!("{}: {}", self.tiles.describe(), e))
        })?;
        if fetched.is_empty() {
            return Err(VolumeError::TerrainStoreUnavailable(format!(
                "{} has none of the {} tiles under the sampling grid at zoom {}",
                self.tiles.describe(),
                coords.len(),
                self.config.zoom
            )));
        }
        let fetched_count = fetched.len();
        metrics::counter!(metric_defs::TILES_FETCHED.name).increment(fetched_count as u64);
        metrics::counter!(metric_defs::TILES_MISSING.name).increment(coords.len().saturating_sub(fetched_count) as u64);
        debug!(requested = coords.len(), fetched = fetched_count, "fetched terrain tiles");

        let sampler = ElevationSampler::new(self.config.zoom, fetched);
        let accumulator = VolumeAccumulator::new(AccumulatorOptions {
            max_workers: self.config.max_workers,
            deadline,
            zero_design_is_uncovered: self.config.zero_design_is_uncovered,
        });
        let accumulation =
            accumulator.accumulate(&grid.points, grid.cell_ground_area_m2, surface.as_ref(), &sampler);

        let undecodable = sampler.failed_tile_count();
        metrics::counter!(metric_defs::TILES_UNDECODABLE.name).increment(undecodable as u64);
        record_point_metrics(&accumulation.stats);

        if !accumulation.completed {
            return Err(VolumeError::DeadlineExceeded {
                processed: accumulation.stats.processed(),
                total: grid.len(),
            });
        }

        let stats = accumulation.stats;
        if stats.sampled == 0 {
            warn!(
                points = grid.len(),
                skipped = stats.total_skipped(),
                "no sample point contributed to the estimate"
            );
        }

        let report = VolumeReport {
            result: accumulation.result,
            grid: grid.summary(),
            tiles: TileSummary {
                zoom: self.config.zoom,
                requested: coords.len(),
                fetched: fetched_count,
                undecodable,
            },
            stats,
            elapsed_secs: started.elapsed().as_secs_f64(),
        };

        info!(
            excavation_m3 = report.result.excavation,
            fill_m3 = report.result.fill,
            points = report.grid.points,
            sampled = stats.sampled,
            skipped = stats.total_skipped(),
            cell_size_deg = report.grid.cell_size_deg,
            elapsed_secs = report.elapsed_secs,
            "volume estimate complete"
        );
        Ok(report)
    }

    /// Distinct tiles at the configured zoom holding at least one sample point.
    fn candidate_tiles(&self, points: &[SamplePoint]) -> Vec<TileCoord> {
        // Points that cannot be addressed are counted by the sampler
        let coords: BTreeSet<TileCoord> = points
            .iter()
            .filter_map(|p| TileCoord::from_lon_lat(p.lon, p.lat, self.config.zoom).ok())
            .collect();
        coords.into_iter().collect()
    }
}

fn record_point_metrics(stats: &AccumulationStats) {
    metrics::counter!(metric_defs::POINTS_SAMPLED.name).increment(stats.sampled as u64);
    for reason in SkipReason::ALL {
        let count = stats.skipped(reason);
        if count > 0 {
            metrics::counter!(metric_defs::POINTS_SKIPPED.name, "reason" => reason.as_str()).increment(count as u64);
        }
    }
}
