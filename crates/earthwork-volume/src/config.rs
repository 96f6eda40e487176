//! Engine configuration.
//!
//! Every field has a default, so a YAML file only needs the keys it changes:
//!
//! ```yaml
//! zoom: 15
//! max_workers: 8
//! deadline_secs: 30
//! cell_area_mode: polygon_centroid
//! ```

use crate::{Result, VolumeError};
use earthwork_terrain::{DEFAULT_ZOOM, MAX_ZOOM};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Where the reference square used to convert a cell size in degrees into
/// ground area is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellAreaMode {
    /// At the configured anchor (104°E, 30°N unless overridden), whatever the polygon.
    #[default]
    FixedAnchor,
    /// At the centroid of the polygon being estimated.
    PolygonCentroid,
}

/// Configuration for [`VolumeEngine`](crate::VolumeEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VolumeConfig {
    /// Zoom level of the terrain tiles sampled for ground elevation.
    pub zoom: u8,
    /// Upper bound on concurrently evaluated points.
    pub max_workers: usize,
    /// Deadline for the whole estimate, in seconds.
    pub deadline_secs: Option<f64>,
    /// Polygons at least this large (m²) get an area-derived cell size.
    pub min_grid_area_m2: f64,
    /// Divisor applied together with `min_grid_area_m2` when deriving the cell size.
    pub area_divisor: f64,
    /// Cell size in degrees for polygons below `min_grid_area_m2`.
    pub min_cell_size_deg: f64,
    /// Largest sampling grid accepted.
    pub max_sample_points: usize,
    /// Placement of the cell-area reference square.
    pub cell_area_mode: CellAreaMode,
    /// Reference square longitude for [`CellAreaMode::FixedAnchor`].
    pub anchor_lon: f64,
    /// Reference square latitude for [`CellAreaMode::FixedAnchor`].
    pub anchor_lat: f64,
    /// Treat a design elevation of exactly 0 as "outside the design surface".
    pub zero_design_is_uncovered: bool,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            max_workers: default_workers(),
            deadline_secs: None,
            min_grid_area_m2: 7_000.0,
            area_divisor: 12_321_000_000.0,
            min_cell_size_deg: 0.00001,
            max_sample_points: 250_000,
            cell_area_mode: CellAreaMode::FixedAnchor,
            anchor_lon: 104.0,
            anchor_lat: 30.0,
            zero_design_is_uncovered: true,
        }
    }
}

impl VolumeConfig {
    /// Most worker threads one estimate may spawn.
    pub const MAX_WORKERS: usize = 1024;

    /// Longest deadline accepted: one year.
    pub const MAX_DEADLINE_SECS: f64 = 365.0 * 24.0 * 3600.0;

    /// Parse a YAML document; missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Deadline as a duration, if one is configured.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.zoom > MAX_ZOOM {
            return Err(VolumeError::Config(format!(
                "zoom {} is above the maximum of {}",
                self.zoom, MAX_ZOOM
            )));
        }
        if !(1..=Self::MAX_WORKERS).contains(&self.max_workers) {
            return Err(VolumeError::Config(format!(
                "max_workers must be between 1 and {}, got {}",
                Self::MAX_WORKERS,
                self.max_workers
            )));
        }
        if let Some(secs) = self.deadline_secs {
            if !secs.is_finite() || secs <= 0.0 || secs > Self::MAX_DEADLINE_SECS {
                return Err(VolumeError::Config(format!(
                    "deadline_secs must be positive and at most {}, got {}",
                    Self::MAX_DEADLINE_SECS,
                    secs
                )));
            }
        }
        for (name, value) in [
            ("min_grid_area_m2", self.min_grid_area_m2),
            ("area_divisor", self.area_divisor),
            ("min_cell_size_deg", self.min_cell_size_deg),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(VolumeError::Config(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.max_sample_points == 0 {
            return Err(VolumeError::Config("max_sample_points must be at least 1".into()));
        }
        if !(-180.0..=180.0).contains(&self.anchor_lon) || !(-90.0..=90.0).contains(&self.anchor_lat) {
            return Err(VolumeError::Config(format!(
                "anchor ({}, {}) is not a valid coordinate",
                self.anchor_lon, self.anchor_lat
            )));
        }
        Ok(())
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(VolumeConfig::MAX_WORKERS))
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VolumeConfig::default();
        assert_eq!(config.zoom, 14);
        assert_eq!(config.min_grid_area_m2, 7_000.0);
        assert_eq!(config.area_divisor, 12_321_000_000.0);
        assert_eq!(config.min_cell_size_deg, 0.00001);
        assert_eq!(config.cell_area_mode, CellAreaMode::FixedAnchor);
        assert!(config.max_workers >= 1);
        assert!(config.deadline().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_yaml() {
        let config = VolumeConfig::from_yaml_str(
            "zoom: 15\nmax_workers: 3\ndeadline_secs: 2.5\ncell_area_mode: polygon_centroid\n",
        )
        .unwrap();
        assert_eq!(config.zoom, 15);
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.deadline(), Some(Duration::from_millis(2500)));
        assert_eq!(config.cell_area_mode, CellAreaMode::PolygonCentroid);
        assert_eq!(config.anchor_lon, 104.0);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            VolumeConfig::from_yaml_str("zoom_level: 12\n"),
            Err(VolumeError::Yaml(_))
        ));
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            VolumeConfig::from_yaml_str("max_workers: 0\n"),
            Err(VolumeError::Config(_))
        ));
        assert!(VolumeConfig::from_yaml_str("zoom: 30\n").is_err());
        assert!(VolumeConfig::from_yaml_str("deadline_secs: -1\n").is_err());
        assert!(VolumeConfig::from_yaml_str("area_divisor: 0\n").is_err());
        assert!(VolumeConfig::from_yaml_str("anchor_lat: 95\n").is_err());
    }

    #[test]
    fn test_worker_count_is_capped() {
        assert!(VolumeConfig::from_yaml_str("max_workers: 1024\n").is_ok());
        assert!(matches!(
            VolumeConfig::from_yaml_str("max_workers: 1000000\n"),
            Err(VolumeError::Config(_))
        ));
    }

    #[test]
    fn test_huge_deadline_rejected() {
        assert!(matches!(
            VolumeConfig::from_yaml_str("deadline_secs: 1.0e30\n"),
            Err(VolumeError::Config(_))
        ));
        assert!(VolumeConfig::from_yaml_str("deadline_secs: 1.0e19\n").is_err());

        // Unvalidated values never panic
        let config = VolumeConfig {
            deadline_secs: Some(1.0e30),
            ..VolumeConfig::default()
        };
        assert_eq!(config.deadline(), None);

        let config = VolumeConfig::from_yaml_str("deadline_secs: 86400\n").unwrap();
        assert_eq!(config.deadline(), Some(Duration::from_secs(86_400)));
    }
}
