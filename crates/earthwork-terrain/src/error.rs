//! Error types for the terrain crate.

use thiserror::Error;

/// Errors that can occur when addressing, fetching or decoding terrain tiles.
#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tile bytes decode as neither WebP nor any other supported raster format.
    #[error("Unsupported tile image format: {0}")]
    UnsupportedImageFormat(String),

    /// Invalid zoom level.
    #[error("Invalid zoom level {0} (must be {min}-{max})", min = crate::MIN_ZOOM, max = crate::MAX_ZOOM)]
    InvalidZoomLevel(u8),

    /// Coordinate is NaN, infinite or outside the valid longitude range.
    #[error("Invalid coordinate (lon {lon}, lat {lat})")]
    InvalidCoordinate { lon: f64, lat: f64 },

    /// Column or row out of range for the zoom level.
    #[error("Tile x={x} y={y} out of range for zoom {z}")]
    TileOutOfRange { z: u8, x: u32, y: u32 },

    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// The tile server answered with something other than the tile or a 404.
    #[error("Failed to download tile z={z} x={x} y={y}: {reason}")]
    TileDownloadFailed { z: u8, x: u32, y: u32, reason: String },

    /// The tile store cannot be reached at all.
    #[error("Terrain tile store unavailable: {0}")]
    StoreUnavailable(String),

    /// Invalid URL template for a remote tile store.
    #[error("Invalid tile URL template '{0}' (needs {{z}}, {{x}} and {{y}})")]
    InvalidUrlTemplate(String),
}
