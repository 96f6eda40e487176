//! Example: Query ground elevation from a local Terrain-RGB tile directory.
//!
//! Usage: cargo run --example query_elevation -- <lon> <lat> [tile_dir] [zoom]

use earthwork_terrain::{DirectoryTileStore, ElevationSampler, TerrainTileStore, TileCoord, DEFAULT_ZOOM};
use std::env;
use std::time::Instant;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <lon> <lat> [tile_dir] [zoom]", args[0]);
        eprintln!("Example: {} 104.0657 30.6595 ./terrain 14", args[0]);
        std::process::exit(1);
    }

    let lon: f64 = args[1].parse().expect("Invalid longitude");
    let lat: f64 = args[2].parse().expect("Invalid latitude");
    let tile_dir = args.get(3).map(|s| s.as_str()).unwrap_or("terrain");
    let zoom: u8 = args
        .get(4)
        .map(|z| z.parse().expect("Invalid zoom"))
        .unwrap_or(DEFAULT_ZOOM);

    let coord = TileCoord::from_lon_lat(lon, lat, zoom).expect("Invalid coordinate");
    let bounds = coord.bounds();
    println!("Tile {}", coord);
    println!(
        "Bounds: lon {:.6}° to {:.6}°, lat {:.6}° to {:.6}°",
        bounds.west, bounds.east, bounds.south, bounds.north
    );

    let store = DirectoryTileStore::new(tile_dir).expect("Failed to open tile directory");
    let start = Instant::now();
    let tiles = store.fetch_tiles(&[coord]).expect("Failed to read tiles");
    let sampler = ElevationSampler::new(zoom, tiles);

    match sampler.sample(lon, lat) {
        Ok(elevation) => println!(
            "Elevation: {:.2} meters (in {:.3}s)",
            elevation,
            start.elapsed().as_secs_f64()
        ),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
