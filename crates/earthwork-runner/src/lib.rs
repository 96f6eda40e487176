//! # earthwork-runner
//!
//! Library side of the `earthwork` CLI: argument definitions, the runner
//! config file, input loaders and the command implementations. `main.rs`
//! only sets up logging and prints results.

pub mod cli;
pub mod config;
mod error;
pub mod input;

pub use cli::{CellAreaArg, Cli, Command, EstimateArgs, TileInfoArgs};
pub use config::{RunnerConfig, TileSourceConfig};
pub use error::RunnerError;
pub use input::{load_polygon, load_survey_points, parse_survey_csv, parse_survey_json};

use earthwork_terrain::{TileBounds, TileCoord};
use earthwork_volume::{DelaunaySurfaceBuilder, LocalSpatialService, VolumeEngine, VolumeReport};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Run the `estimate` command.
pub fn run_estimate(args: &EstimateArgs) -> Result<VolumeReport> {
    let mut config = match &args.config {
        Some(path) => RunnerConfig::from_file(path)?,
        None => RunnerConfig::default(),
    };
    config.apply_args(args);
    config.volume.validate()?;

    let polygon = load_polygon(&args.polygon)?;
    let design = load_survey_points(&args.design)?;
    info!(
        polygon = %args.polygon.display(),
        design = %args.design.display(),
        survey_points = design.len(),
        zoom = config.volume.zoom,
        workers = config.volume.max_workers,
        "starting volume estimate"
    );

    let tiles = config.tiles.open()?;
    let engine = VolumeEngine::new(
        config.volume,
        tiles,
        Arc::new(LocalSpatialService::new()),
        Arc::new(DelaunaySurfaceBuilder),
    )?;
    Ok(engine.estimate_volume(&polygon, &design)?)
}

/// Output of the `tile-info` command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TileInfo {
    pub tile: TileCoord,
    pub bounds: TileBounds,
}

/// Run the `tile-info` command.
pub fn tile_info(args: &TileInfoArgs) -> Result<TileInfo> {
    let tile = TileCoord::from_lon_lat(args.lon, args.lat, args.zoom)?;
    Ok(TileInfo {
        tile,
        bounds: tile.bounds(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_info() {
        let info = tile_info(&TileInfoArgs {
            lon: 104.0657,
            lat: 30.6595,
            zoom: 14,
        })
        .unwrap();
        assert_eq!(info.tile.z, 14);
        assert!(info.bounds.contains(104.0657, 30.6595));
    }

    #[test]
    fn test_tile_info_rejects_bad_input() {
        let bad = TileInfoArgs {
            lon: 200.0,
            lat: 0.0,
            zoom: 14,
        };
        assert!(matches!(tile_info(&bad), Err(RunnerError::Terrain(_))));
    }
}
