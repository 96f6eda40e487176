//! Metric declarations for the earthwork volume engine.
//!
//! Each metric is declared once in [`metric_defs`] as a [`MetricDef`] with
//! its name, kind, help text, unit and label keys. Recording goes through the
//! `metrics` facade (re-exported), so nothing is collected unless the host
//! installs a recorder.
//!
//! # Example
//!
//! ```rust
//! use earthwork_metrics::{describe_metrics, metric_defs};
//!
//! describe_metrics();
//! metrics::counter!(metric_defs::POINTS_SKIPPED.name, "reason" => "no_design_coverage").increment(3);
//! ```

pub use metrics;

use metrics::{KeyName, SharedString, Unit};

/// How a metric is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared metric.
///
/// ```rust
/// use earthwork_metrics::{MetricDef, MetricKind};
/// use metrics::Unit;
///
/// const TILES: MetricDef = MetricDef::counter("earthwork.tiles.fetched", "Terrain tiles fetched")
///     .unit(Unit::Count);
///
/// assert_eq!(TILES.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub kind: MetricKind,
    pub help: &'static str,
    pub unit: Option<Unit>,
    /// Label keys attached when recording.
    pub labels: &'static [&'static str],
}

impl MetricDef {
    pub const fn counter(name: &'static str, help: &'static str) -> Self {
        Self::declare(MetricKind::Counter, name, help)
    }

    pub const fn gauge(name: &'static str, help: &'static str) -> Self {
        Self::declare(MetricKind::Gauge, name, help)
    }

    pub const fn histogram(name: &'static str, help: &'static str) -> Self {
        Self::declare(MetricKind::Histogram, name, help)
    }

    const fn declare(kind: MetricKind, name: &'static str, help: &'static str) -> Self {
        MetricDef {
            name,
            kind,
            help,
            unit: None,
            labels: &[],
        }
    }

    pub const fn unit(self, unit: Unit) -> Self {
        MetricDef {
            unit: Some(unit),
            ..self
        }
    }

    pub const fn labels(self, labels: &'static [&'static str]) -> Self {
        MetricDef { labels, ..self }
    }

    /// Hands this metric's help text and unit to the installed recorder.
    pub fn describe(&self) {
        let key = KeyName::from_const_str(self.name);
        let help = SharedString::const_str(self.help);
        metrics::with_recorder(|recorder| match self.kind {
            MetricKind::Counter => recorder.describe_counter(key, self.unit, help),
            MetricKind::Gauge => recorder.describe_gauge(key, self.unit, help),
            MetricKind::Histogram => recorder.describe_histogram(key, self.unit, help),
        });
    }
}

/// Every metric the engine records, grouped by pipeline stage.
pub mod metric_defs {
    use super::{MetricDef, Unit};

    pub const ESTIMATES_COMPLETED: MetricDef =
        MetricDef::counter("earthwork.estimates.completed", "Volume estimates completed successfully").unit(Unit::Count);

    /// Labels: error (the failing `VolumeError` kind)
    pub const ESTIMATES_FAILED: MetricDef =
        MetricDef::counter("earthwork.estimates.failed", "Volume estimates that ended in an error")
            .unit(Unit::Count)
            .labels(&["error"]);

    pub const ESTIMATE_DURATION: MetricDef =
        MetricDef::histogram("earthwork.estimates.duration_seconds", "Wall-clock duration of one volume estimate")
            .unit(Unit::Seconds);

    pub const GRID_POINTS: MetricDef =
        MetricDef::histogram("earthwork.grid.points", "Sample points generated for one estimate").unit(Unit::Count);

    pub const POINTS_SAMPLED: MetricDef =
        MetricDef::counter("earthwork.points.sampled", "Sample points that contributed to a volume total")
            .unit(Unit::Count);

    /// Labels: reason (no_design_coverage, design_query_failed, no_tile_for_point,
    /// pixel_out_of_range, unsupported_image_format, cancelled)
    pub const POINTS_SKIPPED: MetricDef =
        MetricDef::counter("earthwork.points.skipped", "Sample points excluded from accumulation")
            .unit(Unit::Count)
            .labels(&["reason"]);

    pub const TILES_FETCHED: MetricDef =
        MetricDef::counter("earthwork.tiles.fetched", "Terrain tiles returned by the tile store").unit(Unit::Count);

    pub const TILES_MISSING: MetricDef =
        MetricDef::counter("earthwork.tiles.missing", "Terrain tiles requested but not held by the tile store")
            .unit(Unit::Count);

    pub const TILES_UNDECODABLE: MetricDef =
        MetricDef::counter("earthwork.tiles.undecodable", "Terrain tiles that failed to decode").unit(Unit::Count);

    pub const ALL: &[&MetricDef] = &[
        &ESTIMATES_COMPLETED,
        &ESTIMATES_FAILED,
        &ESTIMATE_DURATION,
        &GRID_POINTS,
        &POINTS_SAMPLED,
        &POINTS_SKIPPED,
        &TILES_FETCHED,
        &TILES_MISSING,
        &TILES_UNDECODABLE,
    ];
}

/// Describes every metric in [`metric_defs::ALL`] to the installed recorder.
pub fn describe_metrics() {
    metric_defs::ALL.iter().for_each(|def| def.describe());
}

/// Starts a Prometheus scrape endpoint on `addr` and describes all metrics.
#[cfg(feature = "prometheus")]
pub fn install_prometheus_exporter(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_unique_and_namespaced() {
        let names: HashSet<_> = metric_defs::ALL.iter().map(|m| m.name).collect();
        assert_eq!(names.len(), metric_defs::ALL.len());
        for def in metric_defs::ALL {
            assert!(def.name.starts_with("earthwork."), "{}", def.name);
            assert!(!def.help.is_empty(), "{} has no help text", def.name);
        }
    }

    #[test]
    fn test_labelled_metrics() {
        assert_eq!(metric_defs::POINTS_SKIPPED.labels, &["reason"]);
        assert_eq!(metric_defs::ESTIMATES_FAILED.labels, &["error"]);
        assert_eq!(metric_defs::ESTIMATE_DURATION.kind, MetricKind::Histogram);
        assert_eq!(metric_defs::ESTIMATE_DURATION.unit, Some(Unit::Seconds));
    }

    #[test]
    fn test_const_declaration() {
        const DEPTH: MetricDef = MetricDef::gauge("earthwork.test.depth", "test gauge").labels(&["site", "stage"]);
        assert_eq!(DEPTH.kind.to_string(), "gauge");
        assert_eq!(DEPTH.labels, &["site", "stage"]);
        assert!(DEPTH.unit.is_none());
    }

    #[test]
    fn test_describe_without_recorder() {
        describe_metrics();
    }
}
