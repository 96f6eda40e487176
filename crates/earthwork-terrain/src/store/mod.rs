//! Terrain tile stores.
//!
//! A store hands out the raw, still-encoded bytes of Terrain-RGB tiles keyed
//! by [`TileCoord`]. Tiles the store does not hold are simply absent from the
//! result; an `Err` means the store itself could not be consulted.

mod directory;
mod http;

pub use directory::DirectoryTileStore;
pub use http::{CacheStats, HttpTileStore};

use crate::{Result, TileCoord};
use std::collections::HashMap;
use std::sync::Arc;

/// File extensions probed for tiles on disk, in order.
pub const TILE_EXTENSIONS: &[&str] = &["webp", "png", "pngraw"];

/// One fetched tile: its address and encoded image payload.
#[derive(Debug, Clone)]
pub struct TerrainTile {
    /// Tile address.
    pub coord: TileCoord,
    /// WebP or PNG encoded Terrain-RGB bytes.
    pub bytes: Arc<[u8]>,
}

impl TerrainTile {
    /// Create a tile from its address and payload.
    pub fn new(coord: TileCoord, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            coord,
            bytes: bytes.into(),
        }
    }
}

/// Read-only source of terrain tiles.
pub trait TerrainTileStore: Send + Sync {
    /// Fetch every requested tile the store holds.
    fn fetch_tiles(&self, coords: &[TileCoord]) -> Result<Vec<TerrainTile>>;

    /// Short human-readable description used in logs.
    fn describe(&self) -> String;
}

/// Tiles held in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryTileStore {
    tiles: HashMap<TileCoord, Arc<[u8]>>,
}

impl MemoryTileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a tile.
    pub fn insert(&mut self, coord: TileCoord, bytes: impl Into<Arc<[u8]>>) {
        self.tiles.insert(coord, bytes.into());
    }

    /// Number of tiles held.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Whether the store holds no tiles.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

impl TerrainTileStore for MemoryTileStore {
    fn fetch_tiles(&self, coords: &[TileCoord]) -> Result<Vec<TerrainTile>> {
        Ok(coords
            .iter()
            .filter_map(|coord| {
                self.tiles
                    .get(coord)
                    .map(|bytes| TerrainTile::new(*coord, Arc::clone(bytes)))
            })
            .collect())
    }

    fn describe(&self) -> String {
        format!("memory ({} tiles)", self.tiles.len())
    }
}

impl<T: TerrainTileStore + ?Sized> TerrainTileStore for Arc<T> {
    fn fetch_tiles(&self, coords: &[TileCoord]) -> Result<Vec<TerrainTile>> {
        (**self).fetch_tiles(coords)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
