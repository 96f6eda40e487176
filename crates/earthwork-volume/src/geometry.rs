//! Input geometry: polygons, sample points and design survey points.

use crate::{Result, VolumeError};
use geo::{Coord, LineString, Polygon};
use geojson::{GeoJson, Value};
use serde::{Deserialize, Serialize};

/// A grid point at which volume is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    /// Longitude in degrees
    pub lon: f64,
    /// Latitude in degrees
    pub lat: f64,
}

impl SamplePoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// One design survey point. `x` is longitude, `y` latitude, `z` the design
/// elevation in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurveyPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl SurveyPoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Parse a polygon from GeoJSON text.
///
/// Accepts a bare geometry, a Feature, or a FeatureCollection (the first
/// feature with polygonal geometry wins). A MultiPolygon is accepted only
/// when it holds exactly one polygon.
pub fn parse_polygon_geojson(text: &str) -> Result<Polygon<f64>> {
    let geojson: GeoJson = text.parse()?;
    let value = match geojson {
        GeoJson::Geometry(geometry) => geometry.value,
        GeoJson::Feature(feature) => feature
            .geometry
            .map(|g| g.value)
            .ok_or_else(|| VolumeError::InvalidPolygon("feature has no geometry".into()))?,
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .filter_map(|f| f.geometry)
            .map(|g| g.value)
            .find(|v| matches!(v, Value::Polygon(_) | Value::MultiPolygon(_)))
            .ok_or_else(|| {
                VolumeError::InvalidPolygon("feature collection has no polygon feature".into())
            })?,
    };

    match value {
        Value::Polygon(rings) => polygon_from_rings(&rings),
        Value::MultiPolygon(mut polygons) if polygons.len() == 1 => {
            let rings = polygons.remove(0);
            polygon_from_rings(&rings)
        }
        Value::MultiPolygon(polygons) => Err(VolumeError::InvalidPolygon(format!(
            "multipolygon with {} parts, expected exactly one",
            polygons.len()
        ))),
        other => Err(VolumeError::InvalidPolygon(format!(
            "expected Polygon geometry, got {}",
            geometry_type(&other)
        ))),
    }
}

fn geometry_type(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Build a polygon from GeoJSON-style rings. The first ring is the exterior.
///
/// Every ring must be explicitly closed; `geo` would silently close an open
/// ring, which would hide malformed input.
pub fn polygon_from_rings(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>> {
    let (exterior, interiors) = rings
        .split_first()
        .ok_or_else(|| VolumeError::InvalidPolygon("polygon has no rings".into()))?;

    let polygon = Polygon::new(
        ring_to_line_string(exterior, "exterior")?,
        interiors
            .iter()
            .map(|ring| ring_to_line_string(ring, "interior"))
            .collect::<Result<Vec<_>>>()?,
    );
    validate_polygon(&polygon)?;
    Ok(polygon)
}

fn ring_to_line_string(ring: &[Vec<f64>], which: &str) -> Result<LineString<f64>> {
    let coords = ring
        .iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(VolumeError::InvalidPolygon(format!(
                "{} ring position has {} ordinates",
                which,
                position.len()
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    match (coords.first(), coords.last()) {
        (Some(first), Some(last)) if coords.len() >= 4 && first == last => Ok(LineString::new(coords)),
        _ => Err(VolumeError::InvalidPolygon(format!(
            "{} ring must be closed with at least 4 positions",
            which
        ))),
    }
}

/// Check that a polygon is usable: finite coordinates within WGS84 range and
/// at least three distinct exterior vertices.
pub fn validate_polygon(polygon: &Polygon<f64>) -> Result<()> {
    let exterior = polygon.exterior();
    if !exterior.is_closed() {
        return Err(VolumeError::InvalidPolygon("exterior ring is not closed".into()));
    }

    let all_coords = std::iter::once(exterior)
        .chain(polygon.interiors())
        .flat_map(|ring| ring.coords());
    for c in all_coords {
        if !c.x.is_finite() || !c.y.is_finite() {
            return Err(VolumeError::InvalidPolygon("non-finite coordinate".into()));
        }
        if !(-180.0..=180.0).contains(&c.x) || !(-90.0..=90.0).contains(&c.y) {
            return Err(VolumeError::InvalidPolygon(format!(
                "coordinate ({}, {}) is outside WGS84 range",
                c.x, c.y
            )));
        }
    }

    let mut distinct: Vec<Coord<f64>> = Vec::new();
    for c in exterior.coords() {
        if !distinct.contains(c) {
            distinct.push(*c);
        }
    }
    if distinct.len() < 3 {
        return Err(VolumeError::InvalidPolygon(format!(
            "exterior ring has {} distinct vertices, need at least 3",
            distinct.len()
        )));
    }
    Ok(())
}

/// Check that survey points can define a surface.
pub fn validate_survey_points(points: &[SurveyPoint]) -> Result<()> {
    if points.len() < 3 {
        return Err(VolumeError::InvalidSurveyPoints(format!(
            "need at least 3 survey points, got {}",
            points.len()
        )));
    }
    if let Some((i, p)) = points
        .iter()
        .enumerate()
        .find(|(_, p)| !p.x.is_finite() || !p.y.is_finite() || !p.z.is_finite())
    {
        return Err(VolumeError::InvalidSurveyPoints(format!(
            "survey point {} ({}, {}, {}) is not finite",
            i, p.x, p.y, p.z
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    const SQUARE: &str = r#"{
        "type": "Polygon",
        "coordinates": [[[104.0, 30.0], [104.001, 30.0], [104.001, 30.001], [104.0, 30.001], [104.0, 30.0]]]
    }"#;

    #[test]
    fn test_parse_geometry() {
        let polygon = parse_polygon_geojson(SQUARE).unwrap();
        assert_eq!(polygon.exterior().coords().count(), 5);
        assert!(polygon.interiors().is_empty());
    }

    #[test]
    fn test_parse_feature_and_collection() {
        let feature = format!(r#"{{"type":"Feature","properties":{{"name":"pit"}},"geometry":{}}}"#, SQUARE);
        assert!(parse_polygon_geojson(&feature).is_ok());

        let collection = format!(
            r#"{{"type":"FeatureCollection","features":[
                {{"type":"Feature","properties":null,"geometry":{{"type":"Point","coordinates":[1.0,2.0]}}}},
                {}
            ]}}"#,
            feature
        );
        let polygon = parse_polygon_geojson(&collection).unwrap();
        assert_eq!(polygon.exterior().0[1], Coord { x: 104.001, y: 30.0 });
    }

    #[test]
    fn test_parse_single_multipolygon() {
        let text = r#"{"type":"MultiPolygon","coordinates":[[[[0,0],[1,0],[1,1],[0,0]]]]}"#;
        assert!(parse_polygon_geojson(text).is_ok());

        let two = r#"{"type":"MultiPolygon","coordinates":[[[[0,0],[1,0],[1,1],[0,0]]],[[[2,2],[3,2],[3,3],[2,2]]]]}"#;
        assert!(matches!(parse_polygon_geojson(two), Err(VolumeError::InvalidPolygon(_))));
    }

    #[test]
    fn test_reject_bad_polygons() {
        // Not a polygon
        let point = r#"{"type":"Point","coordinates":[1.0,2.0]}"#;
        assert!(matches!(parse_polygon_geojson(point), Err(VolumeError::InvalidPolygon(_))));

        // Open ring
        let open = r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1]]]}"#;
        assert!(matches!(parse_polygon_geojson(open), Err(VolumeError::InvalidPolygon(_))));

        // Degenerate ring
        let degenerate = r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[0,0],[1,0],[0,0]]]}"#;
        assert!(matches!(parse_polygon_geojson(degenerate), Err(VolumeError::InvalidPolygon(_))));

        // Out of range
        let far = r#"{"type":"Polygon","coordinates":[[[0,0],[200,0],[1,1],[0,0]]]}"#;
        assert!(matches!(parse_polygon_geojson(far), Err(VolumeError::InvalidPolygon(_))));

        assert!(matches!(parse_polygon_geojson("not json"), Err(VolumeError::GeoJson(_))));
    }

    #[test]
    fn test_validate_polygon_nan() {
        let p = polygon![(x: 0.0, y: 0.0), (x: f64::NAN, y: 0.0), (x: 1.0, y: 1.0)];
        assert!(validate_polygon(&p).is_err());

        let ok = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        validate_polygon(&ok).unwrap();
    }

    #[test]
    fn test_validate_survey_points() {
        let pts = vec![
            SurveyPoint::new(0.0, 0.0, 1.0),
            SurveyPoint::new(1.0, 0.0, 1.0),
            SurveyPoint::new(0.0, 1.0, 1.0),
        ];
        validate_survey_points(&pts).unwrap();
        assert!(validate_survey_points(&pts[..2]).is_err());

        let mut bad = pts.clone();
        bad[1].z = f64::INFINITY;
        assert!(matches!(
            validate_survey_points(&bad),
            Err(VolumeError::InvalidSurveyPoints(_))
        ));
    }
}
