//! Integration tests for earthwork-terrain with tile pyramids written to disk.

use earthwork_terrain::{
    DirectoryTileStore, ElevationSampler, SampleError, TerrainTileStore, TileCoord, TileRange,
};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// Terrain-RGB encoding of an elevation in meters.
fn encode(meters: f64) -> Rgb<u8> {
    let packed = ((meters + 10_000.0) * 10.0).round() as u32;
    Rgb([(packed >> 16) as u8, (packed >> 8) as u8, packed as u8])
}

fn write_tile(root: &Path, coord: TileCoord, format: ImageFormat, meters: f64) {
    let img = ImageBuffer::from_pixel(256, 256, encode(meters));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    let ext = if format == ImageFormat::WebP { "webp" } else { "png" };
    let path = root
        .join(coord.z.to_string())
        .join(coord.x.to_string())
        .join(format!("{}.{}", coord.y, ext));
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

#[test]
fn test_sample_across_mixed_format_pyramid() {
    let dir = tempfile::tempdir().unwrap();
    let range = TileRange::covering(104.00, 30.60, 104.05, 30.65, 14).unwrap();
    assert!(range.len() > 1, "test needs several tiles");

    // Alternate formats and give every tile its own elevation
    for (i, coord) in range.iter().enumerate() {
        let format = if i % 2 == 0 { ImageFormat::WebP } else { ImageFormat::Png };
        write_tile(dir.path(), coord, format, 400.0 + i as f64);
    }

    let store = DirectoryTileStore::new(dir.path()).unwrap();
    let coords: Vec<_> = range.iter().collect();
    let tiles = store.fetch_tiles(&coords).unwrap();
    assert_eq!(tiles.len(), range.len());

    let sampler = ElevationSampler::new(14, tiles);
    for (i, coord) in range.iter().enumerate() {
        let b = coord.bounds();
        let lon = (b.west + b.east) / 2.0;
        let lat = (b.north + b.south) / 2.0;
        let elevation = sampler.sample(lon, lat).unwrap();
        approx::assert_abs_diff_eq!(elevation, 400.0 + i as f64, epsilon = 1e-6);
    }
}

#[test]
fn test_corrupt_tile_only_affects_its_points() {
    let dir = tempfile::tempdir().unwrap();
    let good = TileCoord::from_lon_lat(104.01, 30.61, 14).unwrap();
    let bad = TileCoord::new(14, good.x + 1, good.y).unwrap();

    write_tile(dir.path(), good, ImageFormat::Png, 12.0);
    let bad_path = dir
        .path()
        .join("14")
        .join(bad.x.to_string())
        .join(format!("{}.png", bad.y));
    fs::create_dir_all(bad_path.parent().unwrap()).unwrap();
    fs::write(&bad_path, b"\x89PNG but not really").unwrap();

    let store = DirectoryTileStore::new(dir.path()).unwrap();
    let sampler = ElevationSampler::new(14, store.fetch_tiles(&[good, bad]).unwrap());

    let gb = good.bounds();
    let bb = bad.bounds();
    approx::assert_abs_diff_eq!(
        sampler.sample((gb.west + gb.east) / 2.0, (gb.north + gb.south) / 2.0).unwrap(),
        12.0,
        epsilon = 1e-6
    );
    assert_eq!(
        sampler.sample((bb.west + bb.east) / 2.0, (bb.north + bb.south) / 2.0),
        Err(SampleError::UnsupportedImageFormat)
    );
}

#[test]
fn test_concurrent_sampling_decodes_once() {
    let dir = tempfile::tempdir().unwrap();
    let coord = TileCoord::from_lon_lat(104.01, 30.61, 14).unwrap();
    write_tile(dir.path(), coord, ImageFormat::WebP, 321.0);

    let store = DirectoryTileStore::new(dir.path()).unwrap();
    let sampler = ElevationSampler::new(14, store.fetch_tiles(&[coord]).unwrap());
    let b = coord.bounds();

    std::thread::scope(|scope| {
        for i in 0..8 {
            let sampler = &sampler;
            scope.spawn(move || {
                let lon = b.west + (b.east - b.west) * (i as f64 + 0.5) / 8.0;
                let elevation = sampler.sample(lon, (b.north + b.south) / 2.0).unwrap();
                approx::assert_abs_diff_eq!(elevation, 321.0, epsilon = 1e-6);
            });
        }
    });
    assert_eq!(sampler.failed_tile_count(), 0);
}
