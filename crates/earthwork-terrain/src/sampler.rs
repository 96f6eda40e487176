//! Ground elevation sampling over a pre-fetched set of candidate tiles.

use crate::decode::{decode_tile_image, TerrainRaster};
use crate::store::TerrainTile;
use crate::TileCoord;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::warn;

/// Why a point has no ground elevation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum SampleError {
    /// None of the candidate tiles contains the point.
    #[error("no candidate tile contains the point")]
    NoTileForPoint,
    /// The point maps to a pixel outside the decoded raster.
    #[error("point maps outside the tile raster")]
    PixelOutOfRange,
    /// The containing tile could not be decoded.
    #[error("containing tile has an unsupported image format")]
    UnsupportedImageFormat,
}

/// Anything that can report ground elevation at a coordinate.
pub trait GroundElevation: Sync {
    /// Ground elevation in meters at (lon, lat).
    fn ground_elevation(&self, lon: f64, lat: f64) -> Result<f64, SampleError>;
}

/// A candidate tile and its lazily decoded raster.
struct CandidateTile {
    tile: TerrainTile,
    raster: OnceLock<Option<Arc<TerrainRaster>>>,
}

impl CandidateTile {
    fn raster(&self) -> Option<&Arc<TerrainRaster>> {
        self.raster
            .get_or_init(|| match decode_tile_image(&self.tile.bytes) {
                Ok(raster) => Some(Arc::new(raster)),
                Err(e) => {
                    warn!(tile = %self.tile.coord, error = %e, "excluding undecodable terrain tile");
                    None
                }
            })
            .as_ref()
    }
}

/// Samples ground elevation from the tiles fetched for one computation.
///
/// Each tile is decoded at most once, by whichever caller first needs it; a
/// decode failure is remembered and every point in that tile reports
/// [`SampleError::UnsupportedImageFormat`].
pub struct ElevationSampler {
    zoom: u8,
    tiles: HashMap<(u32, u32), CandidateTile>,
}

impl std::fmt::Debug for ElevationSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevationSampler")
            .field("zoom", &self.zoom)
            .field("tiles", &self.tiles.len())
            .finish()
    }
}

impl ElevationSampler {
    /// Build a sampler from candidate tiles. Tiles at other zoom levels are ignored.
    pub fn new(zoom: u8, tiles: impl IntoIterator<Item = TerrainTile>) -> Self {
        let tiles = tiles
            .into_iter()
            .filter(|tile| tile.coord.z == zoom)
            .map(|tile| {
                (
                    (tile.coord.x, tile.coord.y),
                    CandidateTile {
                        tile,
                        raster: OnceLock::new(),
                    },
                )
            })
            .collect();
        Self { zoom, tiles }
    }

    /// Zoom level of the candidate tiles.
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Number of candidate tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Number of candidate tiles decoded so far that failed to decode.
    pub fn failed_tile_count(&self) -> usize {
        self.tiles
            .values()
            .filter(|t| matches!(t.raster.get(), Some(None)))
            .count()
    }

    /// Ground elevation in meters at (lon, lat).
    ///
    /// The point is mapped into its tile by linear interpolation across the
    /// tile's geographic bounds, then floored to a pixel index.
    pub fn sample(&self, lon: f64, lat: f64) -> Result<f64, SampleError> {
        let coord =
            TileCoord::from_lon_lat(lon, lat, self.zoom).map_err(|_| SampleError::NoTileForPoint)?;
        let candidate = self
            .tiles
            .get(&(coord.x, coord.y))
            .ok_or(SampleError::NoTileForPoint)?;
        let raster = candidate
            .raster()
            .ok_or(SampleError::UnsupportedImageFormat)?;

        let (x, y) = pixel_for(&coord, raster.width(), raster.height(), lon, lat)
            .ok_or(SampleError::PixelOutOfRange)?;
        raster
            .elevation_at_pixel(x, y)
            .ok_or(SampleError::PixelOutOfRange)
    }
}

impl GroundElevation for ElevationSampler {
    fn ground_elevation(&self, lon: f64, lat: f64) -> Result<f64, SampleError> {
        self.sample(lon, lat)
    }
}

/// Pixel holding (lon, lat) in a `width` x `height` raster of `coord`.
pub fn pixel_for(coord: &TileCoord, width: u32, height: u32, lon: f64, lat: f64) -> Option<(u32, u32)> {
    let bounds = coord.bounds();
    let lon_ratio = (lon - bounds.west) / (bounds.east - bounds.west);
    let lat_ratio = (bounds.north - lat) / (bounds.north - bounds.south);

    let x = (width as f64 * lon_ratio).floor();
    let y = (height as f64 * lat_ratio).floor();

    if !(0.0..width as f64).contains(&x) || !(0.0..height as f64).contains(&y) {
        return None;
    }
    Some((x as u32, y as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    /// Encode a Terrain-RGB PNG whose left half is `left` and right half `right` meters.
    fn split_tile(size: u32, left: f64, right: f64) -> Vec<u8> {
        let encode = |meters: f64| {
            let packed = ((meters + 10_000.0) * 10.0).round() as u32;
            Rgb([(packed >> 16) as u8, (packed >> 8) as u8, packed as u8])
        };
        let img = ImageBuffer::from_fn(size, size, |x, _| {
            if x < size / 2 {
                encode(left)
            } else {
                encode(right)
            }
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_sample_maps_point_to_pixel() {
        let coord = TileCoord::from_lon_lat(104.05, 30.65, 14).unwrap();
        let bounds = coord.bounds();
        let sampler = ElevationSampler::new(14, vec![TerrainTile::new(coord, split_tile(256, 500.0, 512.5))]);

        let lat = (bounds.north + bounds.south) / 2.0;
        let west_quarter = bounds.west + (bounds.east - bounds.west) * 0.25;
        let east_quarter = bounds.west + (bounds.east - bounds.west) * 0.75;

        approx::assert_abs_diff_eq!(sampler.sample(west_quarter, lat).unwrap(), 500.0, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(sampler.sample(east_quarter, lat).unwrap(), 512.5, epsilon = 1e-6);
    }

    #[test]
    fn test_point_outside_candidates() {
        let coord = TileCoord::from_lon_lat(104.05, 30.65, 14).unwrap();
        let sampler = ElevationSampler::new(14, vec![TerrainTile::new(coord, split_tile(4, 1.0, 1.0))]);
        assert_eq!(sampler.sample(10.0, 10.0), Err(SampleError::NoTileForPoint));
        assert_eq!(sampler.sample(f64::NAN, 10.0), Err(SampleError::NoTileForPoint));
    }

    #[test]
    fn test_undecodable_tile_is_remembered() {
        let coord = TileCoord::from_lon_lat(104.05, 30.65, 14).unwrap();
        let sampler = ElevationSampler::new(14, vec![TerrainTile::new(coord, b"junk".to_vec())]);
        assert_eq!(sampler.failed_tile_count(), 0);
        assert_eq!(
            sampler.sample(104.05, 30.65),
            Err(SampleError::UnsupportedImageFormat)
        );
        assert_eq!(
            sampler.sample(104.05, 30.65),
            Err(SampleError::UnsupportedImageFormat)
        );
        assert_eq!(sampler.failed_tile_count(), 1);
    }

    #[test]
    fn test_other_zoom_tiles_ignored() {
        let coord = TileCoord::from_lon_lat(104.05, 30.65, 13).unwrap();
        let sampler = ElevationSampler::new(14, vec![TerrainTile::new(coord, split_tile(4, 1.0, 1.0))]);
        assert_eq!(sampler.tile_count(), 0);
    }

    #[test]
    fn test_pixel_for_edges() {
        let coord = TileCoord::new(1, 0, 0).unwrap();
        let bounds = coord.bounds();
        assert_eq!(pixel_for(&coord, 256, 256, bounds.west, bounds.north), Some((0, 0)));
        // The east and south edges belong to the neighbouring tiles
        assert_eq!(pixel_for(&coord, 256, 256, bounds.east, bounds.north), None);
        assert_eq!(pixel_for(&coord, 256, 256, bounds.west, bounds.south), None);
    }
}
