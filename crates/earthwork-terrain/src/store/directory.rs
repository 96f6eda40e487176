//! Tiles laid out on disk as `{root}/{z}/{x}/{y}.{ext}`.

use super::{TerrainTile, TerrainTileStore, TILE_EXTENSIONS};
use crate::{Result, TerrainError, TileCoord};
use rayon::prelude::*;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A read-only tile pyramid in a local directory.
#[derive(Debug, Clone)]
pub struct DirectoryTileStore {
    root: PathBuf,
}

impl DirectoryTileStore {
    /// Open a tile directory. The directory must exist.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(TerrainError::StoreUnavailable(format!(
                "tile directory {} does not exist",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    /// Root directory of the pyramid.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a tile would have with the given extension.
    pub fn tile_path(&self, coord: &TileCoord, ext: &str) -> PathBuf {
        tile_path(&self.root, coord, ext)
    }

    fn read_tile(&self, coord: &TileCoord) -> Result<Option<TerrainTile>> {
        for ext in TILE_EXTENSIONS {
            let path = self.tile_path(coord, ext);
            match fs::read(&path) {
                Ok(bytes) => return Ok(Some(TerrainTile::new(*coord, bytes))),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        debug!(tile = %coord, "tile not present in directory store");
        Ok(None)
    }
}

impl TerrainTileStore for DirectoryTileStore {
    fn fetch_tiles(&self, coords: &[TileCoord]) -> Result<Vec<TerrainTile>> {
        if !self.root.is_dir() {
            return Err(TerrainError::StoreUnavailable(format!(
                "tile directory {} is gone",
                self.root.display()
            )));
        }
        let tiles = coords
            .par_iter()
            .map(|coord| self.read_tile(coord))
            .collect::<Result<Vec<_>>>()?;
        Ok(tiles.into_iter().flatten().collect())
    }

    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }
}

/// `{root}/{z}/{x}/{y}.{ext}`
pub(crate) fn tile_path(root: &Path, coord: &TileCoord, ext: &str) -> PathBuf {
    root.join(coord.z.to_string())
        .join(coord.x.to_string())
        .join(format!("{}.{}", coord.y, ext))
}
