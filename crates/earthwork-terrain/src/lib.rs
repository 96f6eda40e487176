//! # earthwork-terrain
//!
//! Ground elevation from Terrain-RGB raster tile pyramids.
//!
//! This crate provides:
//! - Slippy-map tile addressing ([`TileCoord`], [`TileBounds`], [`TileRange`])
//! - Terrain-RGB decoding of WebP and PNG tiles ([`decode_tile_image`],
//!   [`elevation_from_rgb`])
//! - Point sampling over a candidate tile set ([`ElevationSampler`])
//! - Tile stores: in memory, a local `{z}/{x}/{y}` directory, or a remote
//!   tile server with an on-disk cache
//!
//! ## Terrain-RGB
//!
//! Elevation is packed into the colour channels of ordinary tile images:
//! `height = (R * 65536 + G * 256 + B) * 0.1 - 10000` meters.
//!
//! ## Example
//!
//! ```no_run
//! use earthwork_terrain::{DirectoryTileStore, ElevationSampler, TerrainTileStore, TileRange};
//!
//! let store = DirectoryTileStore::new("./terrain")?;
//!
//! // Fetch every tile touching a small area around Chengdu at zoom 14
//! let range = TileRange::covering(104.05, 30.64, 104.07, 30.66, 14)?;
//! let coords: Vec<_> = range.iter().collect();
//! let sampler = ElevationSampler::new(14, store.fetch_tiles(&coords)?);
//!
//! match sampler.sample(104.0657, 30.6595) {
//!     Ok(elevation) => println!("Ground elevation: {} meters", elevation),
//!     Err(reason) => println!("No ground elevation: {}", reason),
//! }
//! # Ok::<(), earthwork_terrain::TerrainError>(())
//! ```

mod decode;
mod error;
mod sampler;
mod store;
mod tile;

pub use decode::{decode_tile_image, elevation_from_rgb, TerrainRaster, TERRAIN_RGB_OFFSET, TERRAIN_RGB_SCALE};
pub use error::TerrainError;
pub use sampler::{pixel_for, ElevationSampler, GroundElevation, SampleError};
pub use store::{
    CacheStats, DirectoryTileStore, HttpTileStore, MemoryTileStore, TerrainTile, TerrainTileStore,
    TILE_EXTENSIONS,
};
pub use tile::{TileBounds, TileCoord, TileRange, DEFAULT_ZOOM, MAX_MERCATOR_LAT, MAX_ZOOM, MIN_ZOOM};

/// Result type for terrain operations.
pub type Result<T> = std::result::Result<T, TerrainError>;
