//! Loading the site polygon and design survey points from files.

use crate::{Result, RunnerError};
use earthwork_volume::{parse_polygon_geojson, SurveyPoint};
use geo::Polygon;
use std::path::Path;

/// Read a site polygon from a GeoJSON file.
pub fn load_polygon(path: &Path) -> Result<Polygon<f64>> {
    let text = std::fs::read_to_string(path).map_err(|e| RunnerError::io(path, e))?;
    Ok(parse_polygon_geojson(&text)?)
}

/// Read design survey points. `.json` files hold an array of `{x, y, z}`;
/// anything else is read as CSV.
pub fn load_survey_points(path: &Path) -> Result<Vec<SurveyPoint>> {
    let text = std::fs::read_to_string(path).map_err(|e| RunnerError::io(path, e))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let parsed = if is_json {
        parse_survey_json(&text)
    } else {
        parse_survey_csv(&text)
    };
    parsed.map_err(|reason| RunnerError::DesignInput {
        path: path.display().to_string(),
        reason,
    })
}

/// Parse `x,y,z` rows. A first row that is not numeric is taken as a header;
/// blank lines and `#` comments are ignored. Extra columns are ignored.
pub fn parse_survey_csv(text: &str) -> std::result::Result<Vec<SurveyPoint>, String> {
    let mut points = Vec::new();
    let mut seen_row = false;

    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let first_row = !seen_row;
        seen_row = true;

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let parsed = match fields.as_slice() {
            [x, y, z, ..] => match (x.parse::<f64>(), y.parse::<f64>(), z.parse::<f64>()) {
                (Ok(x), Ok(y), Ok(z)) => Some(SurveyPoint::new(x, y, z)),
                _ => None,
            },
            _ => None,
        };

        match parsed {
            Some(point) => points.push(point),
            None if first_row => continue,
            None => return Err(format!("line {}: expected numeric x,y,z, got '{}'", i + 1, line)),
        }
    }

    if points.is_empty() {
        return Err("no survey points".into());
    }
    Ok(points)
}

/// Parse a JSON array of `{x, y, z}` objects.
pub fn parse_survey_json(text: &str) -> std::result::Result<Vec<SurveyPoint>, String> {
    serde_json::from_str(text).map_err(|e| e.to_string())
}
