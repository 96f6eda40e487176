//! Remote tile server with a local on-disk cache.
//!
//! Tiles are fetched from a URL template such as
//! `https://tiles.example.com/terrain-rgb/{z}/{x}/{y}.webp` and written to
//! `{cache_dir}/{z}/{x}/{y}.{ext}`. Cached tiles are served without touching
//! the network.
//!
//! The store is shared across threads. Distinct tiles download in parallel;
//! callers racing for the same tile wait on the first one's request. A 404 is
//! remembered for the lifetime of the store.

use super::directory::tile_path;
use super::{TerrainTile, TerrainTileStore, TILE_EXTENSIONS};
use crate::{Result, TerrainError, TileCoord};
use parking_lot::{Condvar, Mutex};
use rayon::prelude::*;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
enum PendingTile {
    Requested,
    /// Written to the cache.
    Cached,
    /// HTTP 404.
    Absent,
    Failed(String),
}

/// Network traffic since the store was opened. Cache hits are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub downloaded: usize,
    pub bytes_received: u64,
}

/// Terrain tiles fetched over HTTP and cached on disk.
pub struct HttpTileStore {
    url_template: String,
    cache_dir: PathBuf,
    extension: &'static str,
    client: reqwest::blocking::Client,
    /// Tiles currently being downloaded, plus remembered 404s.
    pending: Mutex<HashMap<TileCoord, PendingTile>>,
    settled: Condvar,
    downloaded: AtomicUsize,
    bytes_received: AtomicU64,
}

impl std::fmt::Debug for HttpTileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTileStore")
            .field("url_template", &self.url_template)
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

impl HttpTileStore {
    /// Default HTTP timeout per tile request.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a store with the default request timeout.
    pub fn new<P: AsRef<Path>>(url_template: &str, cache_dir: P) -> Result<Self> {
        Self::with_timeout(url_template, cache_dir, Self::DEFAULT_TIMEOUT)
    }

    /// Create a store with an explicit request timeout.
    pub fn with_timeout<P: AsRef<Path>>(
        url_template: &str,
        cache_dir: P,
        timeout: Duration,
    ) -> Result<Self> {
        if !["{z}", "{x}", "{y}"].iter().all(|p| url_template.contains(p)) {
            return Err(TerrainError::InvalidUrlTemplate(url_template.to_string()));
        }

        let cache_dir = cache_dir.as_ref().to_path_buf();
        fs::create_dir_all(&cache_dir)?;

        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            extension: extension_for(url_template),
            url_template: url_template.to_string(),
            cache_dir,
            client,
            pending: Mutex::new(HashMap::new()),
            settled: Condvar::new(),
            downloaded: AtomicUsize::new(0),
            bytes_received: AtomicU64::new(0),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// URL of a tile.
    pub fn tile_url(&self, coord: &TileCoord) -> String {
        self.url_template
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
    }

    /// Cache path of a tile.
    pub fn cache_path(&self, coord: &TileCoord) -> PathBuf {
        tile_path(&self.cache_dir, coord, self.extension)
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            downloaded: self.downloaded.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }

    /// Cache path of `coord`, downloading it first if needed. `None` if the
    /// server does not have the tile.
    pub fn fetch_tile(&self, coord: &TileCoord) -> Result<Option<PathBuf>> {
        let cache_path = self.cache_path(coord);
        if cache_path.exists() {
            return Ok(Some(cache_path));
        }

        if let Some(settled) = self.claim(coord, &cache_path) {
            return settled;
        }

        let result = self.download(coord, &cache_path);
        let outcome = match &result {
            Ok(Some(_)) => PendingTile::Cached,
            Ok(None) => PendingTile::Absent,
            Err(e) => PendingTile::Failed(e.to_string()),
        };
        self.pending.lock().insert(*coord, outcome);
        self.settled.notify_all();
        result
    }

    /// Marks `coord` as requested by this caller and returns `None`, or
    /// waits out another caller's request and returns what it produced.
    fn claim(&self, coord: &TileCoord, cache_path: &Path) -> Option<Result<Option<PathBuf>>> {
        let mut pending = self.pending.lock();
        loop {
            let settled = match pending.get(coord) {
                Some(PendingTile::Requested) => {
                    self.settled.wait(&mut pending);
                    continue;
                }
                Some(PendingTile::Absent) => Ok(None),
                Some(PendingTile::Cached) => Ok(Some(cache_path.to_path_buf())),
                Some(PendingTile::Failed(reason)) => Err(TerrainError::TileDownloadFailed {
                    z: coord.z,
                    x: coord.x,
                    y: coord.y,
                    reason: reason.clone(),
                }),
                None if cache_path.exists() => Ok(Some(cache_path.to_path_buf())),
                None => {
                    pending.insert(*coord, PendingTile::Requested);
                    return None;
                }
            };
            // Absent stays remembered; anything else may be retried
            if !matches!(settled, Ok(None)) {
                pending.remove(coord);
            }
            return Some(settled);
        }
    }

    fn download(&self, coord: &TileCoord, cache_path: &Path) -> Result<Option<PathBuf>> {
        if let Some(parent) = cache_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let url = self.tile_url(coord);
        debug!(tile = %coord, %url, "downloading terrain tile");
        let response = self.client.get(&url).send()?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(tile = %coord, "tile server has no such tile");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(TerrainError::TileDownloadFailed {
                z: coord.z,
                x: coord.x,
                y: coord.y,
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response.bytes()?;

        self.downloaded.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes.len() as u64, Ordering::Relaxed);

        // Write under a temporary name so readers never see a partial tile
        let partial = cache_path.with_extension("part");
        let mut file = fs::File::create(&partial)?;
        file.write_all(&bytes)?;
        drop(file);
        fs::rename(&partial, cache_path)?;

        Ok(Some(cache_path.to_path_buf()))
    }
}

impl TerrainTileStore for HttpTileStore {
    fn fetch_tiles(&self, coords: &[TileCoord]) -> Result<Vec<TerrainTile>> {
        let fetched: Vec<Result<Option<TerrainTile>>> = coords
            .par_iter()
            .map(|coord| {
                let Some(path) = self.fetch_tile(coord)? else {
                    return Ok(None);
                };
                let bytes = fs::read(path)?;
                Ok(Some(TerrainTile::new(*coord, bytes)))
            })
            .collect();

        let mut tiles = Vec::with_capacity(coords.len());
        let mut failures = Vec::new();
        for result in fetched {
            match result {
                Ok(Some(tile)) => tiles.push(tile),
                Ok(None) => {}
                Err(e) => failures.push(e),
            }
        }

        // Partial coverage degrades the estimate; total failure means the
        // server is unreachable
        if !failures.is_empty() && tiles.is_empty() {
            let first = failures.swap_remove(0);
            return Err(TerrainError::StoreUnavailable(format!(
                "{} of {} tile requests failed: {}",
                failures.len() + 1,
                coords.len(),
                first
            )));
        }
        for failure in &failures {
            warn!(error = %failure, "terrain tile download failed");
        }
        Ok(tiles)
    }

    fn describe(&self) -> String {
        format!("http {} (cache {})", self.url_template, self.cache_dir.display())
    }
}

/// Cache extension derived from the URL template's file suffix.
fn extension_for(url_template: &str) -> &'static str {
    let suffix = url_template
        .rsplit('/')
        .next()
        .and_then(|segment| segment.split('?').next())
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    suffix
        .and_then(|ext| TILE_EXTENSIONS.iter().find(|known| **known == ext).copied())
        .unwrap_or("png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_url() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            HttpTileStore::new("https://tiles.example.com/rgb/{z}/{x}/{y}.webp", dir.path()).unwrap();
        let coord = TileCoord::new(14, 13_117, 6_739).unwrap();
        assert_eq!(
            store.tile_url(&coord),
            "https://tiles.example.com/rgb/14/13117/6739.webp"
        );
        assert_eq!(
            store.cache_path(&coord),
            dir.path().join("14").join("13117").join("6739.webp")
        );
    }

    #[test]
    fn test_template_requires_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let err = HttpTileStore::new("https://tiles.example.com/{z}/{x}.png", dir.path()).unwrap_err();
        assert!(matches!(err, TerrainError::InvalidUrlTemplate(_)));
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("https://a/{z}/{x}/{y}.webp"), "webp");
        assert_eq!(extension_for("https://a/{z}/{x}/{y}.pngraw?access_token=abc"), "pngraw");
        assert_eq!(extension_for("https://a/{z}/{x}/{y}"), "png");
        assert_eq!(extension_for("https://a/{z}/{x}/{y}.jpg"), "png");
    }

    #[test]
    fn test_cached_tile_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        // Unroutable host: any network access would fail
        let store = HttpTileStore::new("http://127.0.0.1:9/{z}/{x}/{y}.png", dir.path()).unwrap();
        let coord = TileCoord::new(10, 800, 420).unwrap();
        let path = store.cache_path(&coord);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"cached").unwrap();

        let tiles = store.fetch_tiles(&[coord]).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(&*tiles[0].bytes, b"cached");
        assert_eq!(store.cache_stats(), CacheStats::default());
    }

    #[test]
    fn test_unreachable_server_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = HttpTileStore::with_timeout(
            "http://127.0.0.1:9/{z}/{x}/{y}.png",
            dir.path(),
            Duration::from_millis(500),
        )
        .unwrap();
        let coord = TileCoord::new(10, 800, 420).unwrap();
        let err = store.fetch_tiles(&[coord]).unwrap_err();
        assert!(matches!(err, TerrainError::StoreUnavailable(_)));
    }
}
