//! Point store: turns imported records into points using a column mapping.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{GeopinError, Result};
use crate::models::{Point, Record};

static SAFE_LAT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)latitude").unwrap());
static SAFE_LNG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)longitude").unwrap());
static RISKY_LAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(^|[^a-z])(lat|y)($|[^a-z])").unwrap());
static RISKY_LNG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(^|[^a-z])(lng|lon|long|x)($|[^a-z])").unwrap());

/// Likely coordinate columns for a header row
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnGuess {
    pub lat: Option<String>,
    pub lng: Option<String>,
}

impl ColumnGuess {
    pub fn is_complete(&self) -> bool {
        self.lat.is_some() && self.lng.is_some()
    }
}

/// Guess latitude/longitude columns from header names.
///
/// Full words ("latitude") beat short tokens ("lat", "y").
pub fn guess_columns<S: AsRef<str>>(headers: &[S]) -> ColumnGuess {
    let find = |safe: &Regex, risky: &Regex| {
        headers
            .iter()
            .map(AsRef::as_ref)
            .find(|h| safe.is_match(h))
            .or_else(|| headers.iter().map(AsRef::as_ref).find(|h| risky.is_match(h)))
            .map(str::to_string)
    };

    ColumnGuess {
        lat: find(&SAFE_LAT, &RISKY_LAT),
        lng: find(&SAFE_LNG, &RISKY_LNG),
    }
}

/// Header names of a record set (keys of the first record)
pub fn headers(records: &[Record]) -> Vec<String> {
    records
        .first()
        .map(|r| r.keys().cloned().collect())
        .unwrap_or_default()
}

/// Parse a coordinate cell. Numbers pass through; strings must parse fully.
fn parse_coordinate(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// Build points from records using the chosen coordinate columns.
///
/// Rows whose coordinates do not parse, or fall outside the valid
/// lat/lng ranges, are dropped. Fails when nothing survives.
pub fn load(records: &[Record], lat_field: &str, lng_field: &str) -> Result<Vec<Point>> {
    let points: Vec<Point> = records
        .iter()
        .filter_map(|record| {
            let lat = parse_coordinate(record.get(lat_field))?;
            let lng = parse_coordinate(record.get(lng_field))?;
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                debug!("Dropping out-of-range coordinate ({}, {})", lat, lng);
                return None;
            }
            Some(Point::new(lat, lng, record.clone()))
        })
        .collect();

    if points.is_empty() {
        return Err(GeopinError::NoValidRows {
            lat_field: lat_field.to_string(),
            lng_field: lng_field.to_string(),
        });
    }

    info!(
        "Loaded {} of {} records as points ({} dropped)",
        points.len(),
        records.len(),
        records.len() - points.len()
    );

    Ok(points)
}

/// Eight well-known cities, handy for trying the pipeline without a file
pub fn sample_records() -> Vec<Record> {
    let rows = [
        (1, "New York", 40.7128, -74.0060),
        (2, "London", 51.5074, -0.1278),
        (3, "Tokyo", 35.6762, 139.6503),
        (4, "Sydney", -33.8688, 151.2093),
        (5, "Rio de Janeiro", -22.9068, -43.1729),
        (6, "Cape Town", -33.9249, 18.4241),
        (7, "Mumbai", 19.0760, 72.8777),
        (8, "Paris", 48.8566, 2.3522),
    ];

    rows.iter()
        .filter_map(|(id, name, lat, lng)| {
            json!({"id": id, "name": name, "lat": lat, "lng": lng, "category": "City"})
                .as_object()
                .cloned()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_guess_prefers_full_words() {
        let guess = guess_columns(&["y", "Latitude", "x", "Longitude"]);
        assert_eq!(guess.lat.as_deref(), Some("Latitude"));
        assert_eq!(guess.lng.as_deref(), Some("Longitude"));
    }

    #[test]
    fn test_guess_short_tokens() {
        let guess = guess_columns(&["id", "site_lat", "site_lon"]);
        assert_eq!(guess.lat.as_deref(), Some("site_lat"));
        assert_eq!(guess.lng.as_deref(), Some("site_lon"));

        let guess = guess_columns(&["X", "Y"]);
        assert_eq!(guess.lat.as_deref(), Some("Y"));
        assert_eq!(guess.lng.as_deref(), Some("X"));
    }

    #[test]
    fn test_guess_ignores_embedded_tokens() {
        // "plateau" contains "lat", "xylophone" contains "x"
        let guess = guess_columns(&["plateau", "xylophone"]);
        assert!(guess.lat.is_none());
        assert!(guess.lng.is_none());
        assert!(!guess.is_complete());
    }

    #[test]
    fn test_load_keeps_all_fields() {
        let records = vec![record(
            serde_json::json!({"name": "A", "lat": "10.5", "lng": 20, "extra": null}),
        )];
        let points = load(&records, "lat", "lng").unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].lat, 10.5);
        assert_eq!(points[0].lng, 20.0);
        assert_eq!(points[0].attributes, records[0]);
    }

    #[test]
    fn test_load_drops_unparseable_rows() {
        let records = vec![
            record(serde_json::json!({"lat": "abc", "lng": "1"})),
            record(serde_json::json!({"lat": " 2 ", "lng": "3"})),
            record(serde_json::json!({"lat": "NaN", "lng": "3"})),
            record(serde_json::json!({"lat": "95", "lng": "3"})),
            record(serde_json::json!({"lat": "1", "lng": "-181"})),
            record(serde_json::json!({"lng": "3"})),
        ];
        let points = load(&records, "lat", "lng").unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].lat, 2.0);
    }

    #[test]
    fn test_load_single_invalid_row_fails() {
        let records = vec![record(serde_json::json!({"lat": "abc", "lng": "1"}))];
        let err = load(&records, "lat", "lng").unwrap_err();
        assert!(matches!(err, GeopinError::NoValidRows { .. }));
    }

    #[test]
    fn test_load_preserves_order() {
        let points = load(&sample_records(), "lat", "lng").unwrap();
        let names: Vec<String> = points
            .iter()
            .filter_map(|p| p.attribute_text("name"))
            .collect();
        assert_eq!(names.len(), 8);
        assert_eq!(names[0], "New York");
        assert_eq!(names[7], "Paris");
    }

    #[test]
    fn test_headers() {
        assert_eq!(
            headers(&sample_records()),
            vec!["id", "name", "lat", "lng", "category"]
        );
        assert!(headers(&[]).is_empty());
    }
}
