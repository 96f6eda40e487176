//! Concurrent cut/fill accumulation over a sampling grid.
//!
//! ## Architecture
//!
//! A fixed number of scoped worker threads claim point indices from a shared
//! atomic cursor. For each point a worker queries the design surface and the
//! ground sampler, then sends the point's [`PointOutcome`] to the calling
//! thread over a channel. The calling thread is the only collector; it stores
//! outcomes by index and watches the deadline.
//!
//! # Determinism
//!
//! Points are evaluated in whatever order the workers get to them, but the
//! totals are summed in point-index order after every worker has finished, so
//! the result is bit-identical for any worker count or interleaving.

use crate::geometry::SamplePoint;
use crate::surface::DesignSurface;
use crossbeam_channel::RecvTimeoutError;
use earthwork_terrain::{GroundElevation, SampleError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// Cut and fill totals in cubic meters. Both are magnitudes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VolumeResult {
    /// Material to remove (ground above design).
    pub excavation: f64,
    /// Material to add (ground below design).
    pub fill: f64,
}

impl VolumeResult {
    /// Add one signed per-point volume. Negative volumes count as excavation.
    pub fn add(&mut self, volume: f64) {
        if volume < 0.0 {
            self.excavation += -volume;
        } else if volume > 0.0 {
            self.fill += volume;
        }
    }

    /// Fill minus excavation.
    pub fn net(&self) -> f64 {
        self.fill - self.excavation
    }
}

/// Ground and design elevation at one sample point, in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationPair {
    pub ground_z: f64,
    pub design_z: f64,
}

impl ElevationPair {
    /// Signed volume of one cell: `(ground - design) * cell_area`.
    pub fn volume(&self, cell_area_m2: f64) -> f64 {
        (self.ground_z - self.design_z) * cell_area_m2
    }
}

/// Why a sample point did not contribute to the totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Outside the design surface.
    NoDesignCoverage,
    /// The design surface query returned an error.
    DesignQueryFailed,
    /// No fetched terrain tile contains the point.
    NoTileForPoint,
    /// The point maps outside its tile's raster.
    PixelOutOfRange,
    /// The point's terrain tile could not be decoded.
    UnsupportedImageFormat,
    /// Not evaluated before the deadline.
    Cancelled,
}

impl SkipReason {
    pub const ALL: [SkipReason; 6] = [
        SkipReason::NoDesignCoverage,
        SkipReason::DesignQueryFailed,
        SkipReason::NoTileForPoint,
        SkipReason::PixelOutOfRange,
        SkipReason::UnsupportedImageFormat,
        SkipReason::Cancelled,
    ];

    /// Label used in metrics and logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoDesignCoverage => "no_design_coverage",
            SkipReason::DesignQueryFailed => "design_query_failed",
            SkipReason::NoTileForPoint => "no_tile_for_point",
            SkipReason::PixelOutOfRange => "pixel_out_of_range",
            SkipReason::UnsupportedImageFormat => "unsupported_image_format",
            SkipReason::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<SampleError> for SkipReason {
    fn from(e: SampleError) -> Self {
        match e {
            SampleError::NoTileForPoint => SkipReason::NoTileForPoint,
            SampleError::PixelOutOfRange => SkipReason::PixelOutOfRange,
            SampleError::UnsupportedImageFormat => SkipReason::UnsupportedImageFormat,
        }
    }
}

/// What happened at one sample point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointOutcome {
    Sampled(ElevationPair),
    Skipped(SkipReason),
}

/// Counts of sampled and skipped points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccumulationStats {
    pub sampled: usize,
    pub no_design_coverage: usize,
    pub design_query_failed: usize,
    pub no_tile_for_point: usize,
    pub pixel_out_of_range: usize,
    pub unsupported_image_format: usize,
    pub cancelled: usize,
}

impl AccumulationStats {
    fn slot(&mut self, reason: SkipReason) -> &mut usize {
        match reason {
            SkipReason::NoDesignCoverage => &mut self.no_design_coverage,
            SkipReason::DesignQueryFailed => &mut self.design_query_failed,
            SkipReason::NoTileForPoint => &mut self.no_tile_for_point,
            SkipReason::PixelOutOfRange => &mut self.pixel_out_of_range,
            SkipReason::UnsupportedImageFormat => &mut self.unsupported_image_format,
            SkipReason::Cancelled => &mut self.cancelled,
        }
    }

    pub fn record_skip(&mut self, reason: SkipReason) {
        *self.slot(reason) += 1;
    }

    /// Points skipped for `reason`.
    pub fn skipped(&self, reason: SkipReason) -> usize {
        match reason {
            SkipReason::NoDesignCoverage => self.no_design_coverage,
            SkipReason::DesignQueryFailed => self.design_query_failed,
            SkipReason::NoTileForPoint => self.no_tile_for_point,
            SkipReason::PixelOutOfRange => self.pixel_out_of_range,
            SkipReason::UnsupportedImageFormat => self.unsupported_image_format,
            SkipReason::Cancelled => self.cancelled,
        }
    }

    pub fn total_skipped(&self) -> usize {
        SkipReason::ALL.iter().map(|r| self.skipped(*r)).sum()
    }

    /// Points whose outcome is known, i.e. everything except cancelled points.
    pub fn processed(&self) -> usize {
        self.sampled + self.total_skipped() - self.cancelled
    }
}

/// Totals and counts from one accumulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accumulation {
    pub result: VolumeResult,
    pub stats: AccumulationStats,
    /// False when the deadline passed before every point was evaluated.
    pub completed: bool,
}

/// Settings for [`VolumeAccumulator`].
#[derive(Debug, Clone, Copy)]
pub struct AccumulatorOptions {
    /// Worker threads. Clamped to at least 1 and at most the number of points.
    pub max_workers: usize,
    /// Stop collecting outcomes at this instant.
    pub deadline: Option<Instant>,
    /// A design elevation of exactly 0 means "no coverage".
    pub zero_design_is_uncovered: bool,
}

impl Default for AccumulatorOptions {
    fn default() -> Self {
        Self {
            max_workers: 1,
            deadline: None,
            zero_design_is_uncovered: true,
        }
    }
}

/// Evaluate one point against the design surface and the ground.
pub fn evaluate_point(
    point: SamplePoint,
    surface: &dyn DesignSurface,
    ground: &dyn GroundElevation,
    zero_design_is_uncovered: bool,
) -> PointOutcome {
    let design_z = match surface.elevation_at(point.lon, point.lat) {
        Ok(Some(z)) if zero_design_is_uncovered && z == 0.0 => {
            return PointOutcome::Skipped(SkipReason::NoDesignCoverage)
        }
        Ok(Some(z)) => z,
        Ok(None) => return PointOutcome::Skipped(SkipReason::NoDesignCoverage),
        Err(e) => {
            debug!(lon = point.lon, lat = point.lat, error = %e, "design surface query failed");
            return PointOutcome::Skipped(SkipReason::DesignQueryFailed);
        }
    };

    match ground.ground_elevation(point.lon, point.lat) {
        Ok(ground_z) => PointOutcome::Sampled(ElevationPair { ground_z, design_z }),
        Err(e) => PointOutcome::Skipped(e.into()),
    }
}

/// Sum outcomes in index order. `None` marks a point that was never evaluated.
pub fn reduce_outcomes(outcomes: &[Option<PointOutcome>], cell_area_m2: f64) -> (VolumeResult, AccumulationStats) {
    let mut result = VolumeResult::default();
    let mut stats = AccumulationStats::default();
    for outcome in outcomes {
        match outcome {
            Some(PointOutcome::Sampled(pair)) => {
                result.add(pair.volume(cell_area_m2));
                stats.sampled += 1;
            }
            Some(PointOutcome::Skipped(reason)) => stats.record_skip(*reason),
            None => stats.record_skip(SkipReason::Cancelled),
        }
    }
    (result, stats)
}

/// Bounded worker pool that turns sample points into cut/fill totals.
#[derive(Debug, Clone)]
pub struct VolumeAccumulator {
    options: AccumulatorOptions,
}

impl VolumeAccumulator {
    pub fn new(options: AccumulatorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &AccumulatorOptions {
        &self.options
    }

    /// Evaluate every point and sum signed per-cell volumes into cut and fill.
    ///
    /// Individual point failures are counted, never fatal. If the deadline
    /// passes, workers stop claiming points, the unevaluated ones are counted
    /// as [`SkipReason::Cancelled`] and `completed` is false.
    pub fn accumulate(
        &self,
        points: &[SamplePoint],
        cell_area_m2: f64,
        surface: &dyn DesignSurface,
        ground: &dyn GroundElevation,
    ) -> Accumulation {
        let total = points.len();
        let workers = self.options.max_workers.clamp(1, total.max(1));
        let zero_uncovered = self.options.zero_design_is_uncovered;

        let cursor = AtomicUsize::new(0);
        let cancelled = AtomicBool::new(false);
        let mut outcomes: Vec<Option<PointOutcome>> = vec![None; total];
        let mut collected = 0usize;

        let timed_out = std::thread::scope(|scope| {
            let (tx, rx) = crossbeam_channel::unbounded::<(usize, PointOutcome)>();

            for _ in 0..workers {
                let tx = tx.clone();
                let cursor = &cursor;
                let cancelled = &cancelled;
                scope.spawn(move || loop {
                    if cancelled.load(Ordering::Relaxed) {
                        break;
                    }
                    let index = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(point) = points.get(index) else {
                        break;
                    };
                    let outcome = evaluate_point(*point, surface, ground, zero_uncovered);
                    if tx.send((index, outcome)).is_err() {
                        break;
                    }
                });
            }
            // Only worker clones remain; the channel disconnects when the last worker exits
            drop(tx);

            loop {
                let received = match self.options.deadline {
                    Some(deadline) => rx.recv_deadline(deadline),
                    None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                };
                match received {
                    Ok((index, outcome)) => {
                        outcomes[index] = Some(outcome);
                        collected += 1;
                    }
                    Err(RecvTimeoutError::Disconnected) => return false,
                    Err(RecvTimeoutError::Timeout) => {
                        cancelled.store(true, Ordering::Relaxed);
                        drop(rx);
                        return true;
                    }
                }
            }
        });

        if timed_out {
            warn!(
                collected,
                total, workers, "deadline passed, abandoning remaining sample points"
            );
        }

        let (result, stats) = reduce_outcomes(&outcomes, cell_area_m2);
        Accumulation {
            result,
            stats,
            completed: !timed_out,
        }
    }
}
