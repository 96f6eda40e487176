//! Terrain-RGB tile decoding.
//!
//! Terrain-RGB packs an elevation into the three 8-bit colour channels of a
//! pixel:
//!
//! ```text
//! height = (R * 65536 + G * 256 + B) * 0.1 - 10000
//! ```
//!
//! The formula needs the exact stored byte values, so decoded images are
//! reduced to raw RGB bytes without any premultiplication or colour-space
//! conversion.

use crate::{Result, TerrainError};
use image::{DynamicImage, ImageFormat};

/// Scale of one Terrain-RGB step in meters.
pub const TERRAIN_RGB_SCALE: f64 = 0.1;

/// Offset subtracted after scaling, in meters.
pub const TERRAIN_RGB_OFFSET: f64 = 10_000.0;

/// Elevation in meters encoded by one Terrain-RGB pixel.
///
/// Total over every 24-bit colour: `(1, 134, 160)` is sea level,
/// `(0, 0, 0)` is -10000 m.
pub fn elevation_from_rgb(r: u8, g: u8, b: u8) -> f64 {
    let packed = (r as u32) * 65_536 + (g as u32) * 256 + b as u32;
    packed as f64 * TERRAIN_RGB_SCALE - TERRAIN_RGB_OFFSET
}

/// A decoded tile: raw RGB bytes in row-major order (north to south, west to east).
#[derive(Debug, Clone)]
pub struct TerrainRaster {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

impl TerrainRaster {
    /// Build a raster from raw RGB bytes.
    ///
    /// Returns `None` when the buffer length does not match the dimensions.
    pub fn from_rgb(width: u32, height: u32, rgb: Vec<u8>) -> Option<Self> {
        if rgb.len() != width as usize * height as usize * 3 {
            return None;
        }
        Some(Self { width, height, rgb })
    }

    /// Reduce a decoded image to raw 8-bit RGB channels.
    ///
    /// 8-bit images keep their stored bytes (alpha is dropped, not applied).
    /// 16-bit images keep the high byte of each channel.
    pub fn from_image(image: DynamicImage) -> Self {
        let (width, height) = (image.width(), image.height());
        let rgb = match image {
            DynamicImage::ImageRgb8(buf) => buf.into_raw(),
            DynamicImage::ImageRgba8(buf) => strip_alpha(buf.as_raw()),
            DynamicImage::ImageRgb16(buf) => buf.as_raw().iter().map(|v| (v >> 8) as u8).collect(),
            DynamicImage::ImageRgba16(buf) => buf
                .as_raw()
                .chunks_exact(4)
                .flat_map(|px| [(px[0] >> 8) as u8, (px[1] >> 8) as u8, (px[2] >> 8) as u8])
                .collect(),
            other => other.to_rgb8().into_raw(),
        };
        Self { width, height, rgb }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGB triple at a pixel, or `None` outside the raster.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        Some([self.rgb[idx], self.rgb[idx + 1], self.rgb[idx + 2]])
    }

    /// Elevation at a pixel, or `None` outside the raster.
    pub fn elevation_at_pixel(&self, x: u32, y: u32) -> Option<f64> {
        self.pixel(x, y).map(|[r, g, b]| elevation_from_rgb(r, g, b))
    }
}

fn strip_alpha(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect()
}

/// Decode a tile's image bytes.
///
/// WebP is tried first, then any other format the `image` crate can sniff
/// (PNG in practice).
pub fn decode_tile_image(bytes: &[u8]) -> Result<TerrainRaster> {
    let image = match image::load_from_memory_with_format(bytes, ImageFormat::WebP) {
        Ok(image) => image,
        Err(webp_err) => image::load_from_memory(bytes).map_err(|err| {
            TerrainError::UnsupportedImageFormat(format!("not WebP ({}); {}", webp_err, err))
        })?,
    };
    Ok(TerrainRaster::from_image(image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, Rgba};
    use std::io::Cursor;

    #[test]
    fn test_formula_sea_level() {
        assert_eq!(elevation_from_rgb(1, 134, 160), 0.0);
    }

    #[test]
    fn test_formula_extremes() {
        assert_eq!(elevation_from_rgb(0, 0, 0), -10000.0);
        assert_eq!(elevation_from_rgb(255, 255, 255), 1667721.5);
    }

    #[test]
    fn test_formula_one_step() {
        // One blue step above sea level is 10 cm
        approx::assert_abs_diff_eq!(elevation_from_rgb(1, 134, 161), 0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_decode_png_rgba_keeps_raw_channels() {
        // A translucent pixel must not be premultiplied before the formula
        let img = ImageBuffer::from_fn(2, 2, |x, _| {
            if x == 0 {
                Rgba([1u8, 134, 160, 10])
            } else {
                Rgba([0u8, 0, 0, 0])
            }
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let raster = decode_tile_image(&bytes).unwrap();
        assert_eq!((raster.width(), raster.height()), (2, 2));
        assert_eq!(raster.pixel(0, 1), Some([1, 134, 160]));
        assert_eq!(raster.elevation_at_pixel(0, 0), Some(0.0));
        assert_eq!(raster.elevation_at_pixel(1, 1), Some(-10000.0));
    }

    #[test]
    fn test_decode_webp_lossless() {
        let img = ImageBuffer::from_pixel(4, 4, Rgb([1u8, 135, 0]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::WebP)
            .unwrap();

        let raster = decode_tile_image(&bytes).unwrap();
        assert_eq!(raster.pixel(3, 3), Some([1, 135, 0]));
        // (65536 + 135*256) * 0.1 - 10000 = 9.6
        approx::assert_abs_diff_eq!(raster.elevation_at_pixel(3, 3).unwrap(), 9.6, epsilon = 1e-9);
    }

    #[test]
    fn test_decode_garbage_is_unsupported() {
        let err = decode_tile_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, TerrainError::UnsupportedImageFormat(_)));
    }

    #[test]
    fn test_pixel_out_of_range() {
        let raster = TerrainRaster::from_rgb(1, 1, vec![1, 134, 160]).unwrap();
        assert_eq!(raster.pixel(1, 0), None);
        assert_eq!(raster.pixel(0, 1), None);
        assert!(TerrainRaster::from_rgb(2, 2, vec![0; 3]).is_none());
    }

    #[test]
    fn test_sixteen_bit_keeps_high_byte() {
        let img = ImageBuffer::from_pixel(1, 1, Rgb([0x01ffu16, 0x86ff, 0xa0ff]));
        let raster = TerrainRaster::from_image(DynamicImage::ImageRgb16(img));
        assert_eq!(raster.pixel(0, 0), Some([1, 134, 160]));
    }
}
