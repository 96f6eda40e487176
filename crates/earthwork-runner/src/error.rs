//! Error types for the runner.

use earthwork_terrain::TerrainError;
use earthwork_volume::VolumeError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the `earthwork` CLI.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Reading an input or config file failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Runner config file could not be parsed.
    #[error("Config error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON input or output failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Design survey point file is malformed.
    #[error("Invalid design points in {path}: {reason}")]
    DesignInput { path: String, reason: String },

    /// Neither a tile directory nor a tile URL was given.
    #[error("No terrain tile source: pass --tiles <dir> or --tile-url <template>, or set tiles.dir / tiles.url_template")]
    NoTileSource,

    /// Conflicting or invalid runner settings.
    #[error("Config error: {0}")]
    Config(String),

    /// Tile store construction or addressing failed.
    #[error(transparent)]
    Terrain(#[from] TerrainError),

    /// The estimate itself failed.
    #[error(transparent)]
    Volume(#[from] VolumeError),
}

impl RunnerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RunnerError::Io {
            path: path.into(),
            source,
        }
    }
}
