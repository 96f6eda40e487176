//! Command-line arguments.

use clap::{Args, Parser, Subcommand, ValueEnum};
use earthwork_terrain::DEFAULT_ZOOM;
use earthwork_volume::CellAreaMode;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "earthwork")]
#[command(version, about = "Cut/fill volume estimates against Terrain-RGB ground elevation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[cfg(feature = "prometheus")]
    #[arg(long, global = true)]
    pub metrics_addr: Option<std::net::SocketAddr>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Estimate excavation and fill volumes inside a polygon
    Estimate(EstimateArgs),
    /// Show the tile containing a coordinate and its bounds
    TileInfo(TileInfoArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct EstimateArgs {
    /// GeoJSON file holding the site polygon (Geometry, Feature or FeatureCollection)
    #[arg(long)]
    pub polygon: PathBuf,

    /// Design survey points: CSV `x,y,z` (optional header) or a JSON array of {x,y,z}
    #[arg(long)]
    pub design: PathBuf,

    /// Directory of Terrain-RGB tiles laid out as {z}/{x}/{y}.webp|png
    #[arg(long, conflicts_with = "tile_url")]
    pub tiles: Option<PathBuf>,

    /// Tile server URL template with {z}, {x} and {y} placeholders
    #[arg(long)]
    pub tile_url: Option<String>,

    /// Cache directory for tiles downloaded from --tile-url
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// YAML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Terrain tile zoom level
    #[arg(long)]
    pub zoom: Option<u8>,

    /// Maximum worker threads
    #[arg(long)]
    pub workers: Option<usize>,

    /// Give up after this many seconds
    #[arg(long)]
    pub deadline_secs: Option<f64>,

    /// Where the cell-area reference square is placed
    #[arg(long, value_enum)]
    pub cell_area_mode: Option<CellAreaArg>,
}

#[derive(Args, Debug, Clone)]
pub struct TileInfoArgs {
    /// Longitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,

    /// Latitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    /// Zoom level
    #[arg(long, default_value_t = DEFAULT_ZOOM)]
    pub zoom: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellAreaArg {
    /// Reference square at the configured anchor (104°E, 30°N by default)
    FixedAnchor,
    /// Reference square at the polygon centroid
    PolygonCentroid,
}

impl From<CellAreaArg> for CellAreaMode {
    fn from(arg: CellAreaArg) -> Self {
        match arg {
            CellAreaArg::FixedAnchor => CellAreaMode::FixedAnchor,
            CellAreaArg::PolygonCentroid => CellAreaMode::PolygonCentroid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_estimate() {
        let cli = Cli::try_parse_from([
            "earthwork",
            "estimate",
            "--polygon",
            "site.geojson",
            "--design",
            "design.csv",
            "--tiles",
            "./terrain",
            "--zoom",
            "15",
            "--workers",
            "8",
            "--cell-area-mode",
            "polygon-centroid",
        ])
        .unwrap();

        let Command::Estimate(args) = cli.command else {
            panic!("expected estimate");
        };
        assert_eq!(args.polygon, PathBuf::from("site.geojson"));
        assert_eq!(args.tiles, Some(PathBuf::from("./terrain")));
        assert_eq!(args.zoom, Some(15));
        assert_eq!(args.workers, Some(8));
        assert_eq!(args.cell_area_mode, Some(CellAreaArg::PolygonCentroid));
        assert!(args.deadline_secs.is_none());
    }

    #[test]
    fn test_tiles_conflict_with_url() {
        let result = Cli::try_parse_from([
            "earthwork",
            "estimate",
            "--polygon",
            "a",
            "--design",
            "b",
            "--tiles",
            "dir",
            "--tile-url",
            "https://example.com/{z}/{x}/{y}.png",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_tile_info_negative() {
        let cli = Cli::try_parse_from(["earthwork", "tile-info", "--lon", "-122.3321", "--lat", "47.6062"]).unwrap();
        let Command::TileInfo(args) = cli.command else {
            panic!("expected tile-info");
        };
        assert_eq!(args.lon, -122.3321);
        assert_eq!(args.zoom, DEFAULT_ZOOM);
    }
}
