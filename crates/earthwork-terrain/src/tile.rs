//! Slippy-map tile addressing.
//!
//! Uses the OpenStreetMap / Web-Mercator tile naming convention:
//! - `z` is the zoom level
//! - `x` is the column (0 to 2^z - 1, from west to east)
//! - `y` is the row (0 to 2^z - 1, from north to south)
//!
//! At zoom level 14 each tile covers ~0.022° of longitude (about 2.4 km at
//! the equator) and a 256 px Terrain-RGB tile resolves roughly 9.5 m per pixel.

use crate::{Result, TerrainError};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Minimum valid zoom level.
pub const MIN_ZOOM: u8 = 0;

/// Maximum zoom level accepted for addressing.
pub const MAX_ZOOM: u8 = 22;

/// Default zoom level for ground sampling.
pub const DEFAULT_ZOOM: u8 = 14;

/// Latitude limit of the Web-Mercator projection (arctan(sinh(π))).
pub const MAX_MERCATOR_LAT: f64 = 85.0511287798;

/// Slippy-map tile coordinates (z, x, y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level.
    pub z: u8,
    /// X coordinate (column, 0 at 180°W, increases eastward).
    pub x: u32,
    /// Y coordinate (row, 0 at ~85.05°N, increases southward).
    pub y: u32,
}

impl TileCoord {
    /// Create a tile coordinate, checking that it exists at its zoom level.
    pub fn new(z: u8, x: u32, y: u32) -> Result<Self> {
        check_zoom(z)?;
        let n = tiles_per_axis(z);
        if x >= n || y >= n {
            return Err(TerrainError::TileOutOfRange { z, x, y });
        }
        Ok(Self { z, x, y })
    }

    /// Convert longitude/latitude to the tile containing it.
    ///
    /// - x = floor((lon + 180) / 360 * 2^z)
    /// - y = floor((1 - ln(tan(lat) + sec(lat)) / π) / 2 * 2^z)
    ///
    /// Latitude is clamped to the Mercator limit and indices are clamped to
    /// the last tile, so the eastern antimeridian and the poles still map to
    /// a valid tile. NaN input and longitudes outside ±180° are rejected.
    pub fn from_lon_lat(lon: f64, lat: f64, z: u8) -> Result<Self> {
        check_zoom(z)?;
        if !lon.is_finite() || !lat.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(TerrainError::InvalidCoordinate { lon, lat });
        }

        let lat_clamped = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
        let n = tiles_per_axis(z) as f64;

        let x = ((lon + 180.0) / 360.0 * n).floor();

        let lat_rad = lat_clamped.to_radians();
        let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();

        let max_coord = tiles_per_axis(z) - 1;
        let x = (x.max(0.0) as u32).min(max_coord);
        let y = (y.max(0.0) as u32).min(max_coord);

        Ok(Self { z, x, y })
    }

    /// Geographic bounds of this tile.
    pub fn bounds(&self) -> TileBounds {
        let n = tiles_per_axis(self.z) as f64;

        let west = self.x as f64 / n * 360.0 - 180.0;
        let east = (self.x + 1) as f64 / n * 360.0 - 180.0;

        let north = (PI * (1.0 - 2.0 * self.y as f64 / n)).sinh().atan().to_degrees();
        let south = (PI * (1.0 - 2.0 * (self.y + 1) as f64 / n)).sinh().atan().to_degrees();

        TileBounds {
            west,
            north,
            east,
            south,
        }
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Geographic bounds of a tile, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileBounds {
    /// Western edge (minimum longitude).
    pub west: f64,
    /// Northern edge (maximum latitude).
    pub north: f64,
    /// Eastern edge (maximum longitude).
    pub east: f64,
    /// Southern edge (minimum latitude).
    pub south: f64,
}

impl TileBounds {
    /// Check if a coordinate is within the bounds (edges inclusive).
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lat >= self.south && lat <= self.north && lon >= self.west && lon <= self.east
    }
}

/// An inclusive rectangle of tiles at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    /// Zoom level shared by every tile in the range.
    pub z: u8,
    /// Westernmost column.
    pub min_x: u32,
    /// Easternmost column.
    pub max_x: u32,
    /// Northernmost row.
    pub min_y: u32,
    /// Southernmost row.
    pub max_y: u32,
}

impl TileRange {
    /// Tiles covering a geographic bounding box.
    pub fn covering(west: f64, south: f64, east: f64, north: f64, z: u8) -> Result<Self> {
        let north_west = TileCoord::from_lon_lat(west.min(east), north.max(south), z)?;
        let south_east = TileCoord::from_lon_lat(west.max(east), north.min(south), z)?;
        Ok(Self {
            z,
            min_x: north_west.x,
            max_x: south_east.x,
            min_y: north_west.y,
            max_y: south_east.y,
        })
    }

    /// Number of tiles in the range.
    pub fn len(&self) -> usize {
        (self.max_x - self.min_x + 1) as usize * (self.max_y - self.min_y + 1) as usize
    }

    /// Always false; a range holds at least one tile.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterate the tiles row by row, west to east.
    pub fn iter(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (self.min_y..=self.max_y).flat_map(move |y| {
            (self.min_x..=self.max_x).map(move |x| TileCoord { z: self.z, x, y })
        })
    }
}

fn check_zoom(z: u8) -> Result<()> {
    if !(MIN_ZOOM..=MAX_ZOOM).contains(&z) {
        return Err(TerrainError::InvalidZoomLevel(z));
    }
    Ok(())
}

fn tiles_per_axis(z: u8) -> u32 {
    1u32 << z
}
