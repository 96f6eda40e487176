//! Runner configuration file.
//!
//! ```yaml
//! volume:
//!   zoom: 14
//!   max_workers: 8
//!   deadline_secs: 60
//! tiles:
//!   url_template: https://tiles.example.com/terrain-rgb/{z}/{x}/{y}.webp
//!   cache_dir: /var/cache/earthwork
//!   timeout_secs: 20
//! ```
//!
//! Command-line flags override file values.

use crate::cli::EstimateArgs;
use crate::{Result, RunnerError};
use earthwork_terrain::{DirectoryTileStore, HttpTileStore, TerrainTileStore};
use earthwork_volume::VolumeConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Where terrain tiles come from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TileSourceConfig {
    /// Local `{z}/{x}/{y}` tile directory.
    pub dir: Option<PathBuf>,
    /// Remote tile URL template.
    pub url_template: Option<String>,
    /// Download cache for `url_template`; defaults to a directory under the system temp dir.
    pub cache_dir: Option<PathBuf>,
    /// HTTP request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl TileSourceConfig {
    /// Open the configured tile store.
    pub fn open(&self) -> Result<Arc<dyn TerrainTileStore>> {
        match (&self.dir, &self.url_template) {
            (Some(_), Some(_)) => Err(RunnerError::Config(
                "set either a tile directory or a tile URL, not both".into(),
            )),
            (Some(dir), None) => {
                info!(dir = %dir.display(), "using local terrain tiles");
                Ok(Arc::new(DirectoryTileStore::new(dir)?))
            }
            (None, Some(template)) => {
                let cache_dir = self
                    .cache_dir
                    .clone()
                    .unwrap_or_else(|| std::env::temp_dir().join("earthwork-tiles"));
                let timeout = self
                    .timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(HttpTileStore::DEFAULT_TIMEOUT);
                info!(url = %template, cache = %cache_dir.display(), "using remote terrain tiles");
                Ok(Arc::new(HttpTileStore::with_timeout(template, cache_dir, timeout)?))
            }
            (None, None) => Err(RunnerError::NoTileSource),
        }
    }
}

/// Everything the `estimate` command needs besides its input files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    pub volume: VolumeConfig,
    pub tiles: TileSourceConfig,
}

impl RunnerConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| RunnerError::io(path, e))?;
        Self::from_yaml_str(&text)
    }

    /// Apply command-line overrides.
    pub fn apply_args(&mut self, args: &EstimateArgs) {
        if let Some(dir) = &args.tiles {
            self.tiles.dir = Some(dir.clone());
            self.tiles.url_template = None;
        }
        if let Some(url) = &args.tile_url {
            self.tiles.url_template = Some(url.clone());
            self.tiles.dir = None;
        }
        if let Some(cache) = &args.cache_dir {
            self.tiles.cache_dir = Some(cache.clone());
        }
        if let Some(zoom) = args.zoom {
            self.volume.zoom = zoom;
        }
        if let Some(workers) = args.workers {
            self.volume.max_workers = workers;
        }
        if let Some(secs) = args.deadline_secs {
            self.volume.deadline_secs = Some(secs);
        }
        if let Some(mode) = args.cell_area_mode {
            self.volume.cell_area_mode = mode.into();
        }
    }
}
