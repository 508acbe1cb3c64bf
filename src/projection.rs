//! WGS84 to UTM projection.
//!
//! Zone and hemisphere are derived from the coordinate; the transform itself
//! is delegated to proj4rs with a per-zone proj string.

use std::fmt;

use hashbrown::HashMap;
use proj4rs::Proj;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GeopinError, Result};
use crate::models::point::{UTM_EASTING_FIELD, UTM_NORTHING_FIELD, UTM_ZONE_FIELD};
use crate::models::Point;

const WGS84: &str = "+proj=longlat +datum=WGS84 +no_defs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hemisphere {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "S")]
    South,
}

impl Hemisphere {
    pub fn from_latitude(lat: f64) -> Self {
        if lat >= 0.0 {
            Hemisphere::North
        } else {
            Hemisphere::South
        }
    }

    pub fn letter(&self) -> char {
        match self {
            Hemisphere::North => 'N',
            Hemisphere::South => 'S',
        }
    }
}

/// Projected UTM coordinate in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtmCoordinate {
    pub zone: u8,
    pub hemisphere: Hemisphere,
    pub easting: f64,
    pub northing: f64,
}

impl UtmCoordinate {
    /// Zone label such as "18N"
    pub fn zone_label(&self) -> String {
        format!("{}{}", self.zone, self.hemisphere.letter())
    }
}

impl fmt::Display for UtmCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.2}E {:.2}N",
            self.zone_label(),
            self.easting,
            self.northing
        )
    }
}

/// UTM zone number for a longitude, 1..=60.
///
/// The antimeridian itself (180°) belongs to zone 60.
pub fn utm_zone(lng: f64) -> u8 {
    let zone = ((lng + 180.0) / 6.0).floor() as i64 + 1;
    zone.clamp(1, 60) as u8
}

fn utm_proj_string(zone: u8, hemisphere: Hemisphere) -> String {
    let south = match hemisphere {
        Hemisphere::South => "+south ",
        Hemisphere::North => "",
    };
    format!("+proj=utm +zone={} {}+datum=WGS84 +units=m +no_defs", zone, south)
}

fn zone_proj(
    zones: &mut HashMap<(u8, Hemisphere), Proj>,
    zone: u8,
    hemisphere: Hemisphere,
) -> std::result::Result<&Proj, String> {
    if !zones.contains_key(&(zone, hemisphere)) {
        let proj = Proj::from_proj_string(&utm_proj_string(zone, hemisphere))
            .map_err(|e| format!("failed to create UTM zone {} projection: {:?}", zone, e))?;
        zones.insert((zone, hemisphere), proj);
    }
    zones
        .get(&(zone, hemisphere))
        .ok_or_else(|| format!("missing UTM zone {} projection", zone))
}

/// Caches the geographic and per-zone UTM projections
pub struct UtmProjector {
    wgs84: Proj,
    zones: HashMap<(u8, Hemisphere), Proj>,
}

impl UtmProjector {
    pub fn new() -> Result<Self> {
        let wgs84 = Proj::from_proj_string(WGS84).map_err(|e| GeopinError::ProjectionFailure {
            lat: 0.0,
            lng: 0.0,
            reason: format!("failed to create WGS84 projection: {:?}", e),
        })?;
        Ok(Self {
            wgs84,
            zones: HashMap::new(),
        })
    }

    /// Project a geographic coordinate to UTM
    pub fn to_utm(&mut self, lat: f64, lng: f64) -> Result<UtmCoordinate> {
        let failure = |reason: String| GeopinError::ProjectionFailure { lat, lng, reason };

        if !lat.is_finite() || !lng.is_finite() {
            return Err(failure("coordinate is not a finite number".into()));
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(failure("coordinate is out of range".into()));
        }

        let zone = utm_zone(lng);
        let hemisphere = Hemisphere::from_latitude(lat);

        let utm = zone_proj(&mut self.zones, zone, hemisphere).map_err(failure)?;
        // proj4rs takes geographic input in radians
        let mut point = (lng.to_radians(), lat.to_radians(), 0.0);
        proj4rs::transform::transform(&self.wgs84, utm, &mut point)
            .map_err(|e| failure(format!("{:?}", e)))?;

        if !point.0.is_finite() || !point.1.is_finite() {
            return Err(failure("projection produced a non-finite result".into()));
        }

        Ok(UtmCoordinate {
            zone,
            hemisphere,
            easting: point.0,
            northing: point.1,
        })
    }

    /// Inverse projection, returning (lat, lng) in degrees
    pub fn from_utm(&mut self, coord: &UtmCoordinate) -> Result<(f64, f64)> {
        let failure = |reason: String| GeopinError::ProjectionFailure {
            lat: f64::NAN,
            lng: f64::NAN,
            reason,
        };

        let utm = zone_proj(&mut self.zones, coord.zone, coord.hemisphere).map_err(failure)?;
        let mut point = (coord.easting, coord.northing, 0.0);
        proj4rs::transform::transform(utm, &self.wgs84, &mut point)
            .map_err(|e| failure(format!("{:?}", e)))?;

        Ok((point.1.to_degrees(), point.0.to_degrees()))
    }
}

/// Project a single coordinate with a fresh projector
pub fn to_utm(lat: f64, lng: f64) -> Result<UtmCoordinate> {
    UtmProjector::new()?.to_utm(lat, lng)
}

/// Points after a projection pass, with one outcome per input point
#[derive(Debug)]
pub struct ProjectionBatch {
    pub points: Vec<Point>,
    pub outcomes: Vec<Result<UtmCoordinate>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl ProjectionBatch {
    pub fn report(&self) -> BatchReport {
        let succeeded = self.outcomes.iter().filter(|o| o.is_ok()).count();
        BatchReport {
            succeeded,
            failed: self.outcomes.len() - succeeded,
        }
    }
}

/// Add UTM attributes to a copy of every point.
///
/// A point that fails to project is passed through unchanged and its
/// failure recorded; the rest of the batch is unaffected.
pub fn project_points(points: &[Point]) -> Result<ProjectionBatch> {
    let mut projector = UtmProjector::new()?;

    let mut projected = Vec::with_capacity(points.len());
    let mut outcomes = Vec::with_capacity(points.len());

    for point in points {
        let mut point = point.clone();
        let outcome = projector.to_utm(point.lat, point.lng);
        match &outcome {
            Ok(utm) => {
                debug!("({}, {}) -> {}", point.lat, point.lng, utm);
                point.set_attribute(UTM_ZONE_FIELD, utm.zone_label());
                point.set_attribute(UTM_EASTING_FIELD, format!("{:.2}", utm.easting));
                point.set_attribute(UTM_NORTHING_FIELD, format!("{:.2}", utm.northing));
            }
            Err(e) => debug!("UTM conversion skipped: {}", e),
        }
        projected.push(point);
        outcomes.push(outcome);
    }

    let batch = ProjectionBatch {
        points: projected,
        outcomes,
    };

    let report = batch.report();
    info!(
        "UTM coordinates added to {} points ({} failed)",
        report.succeeded, report.failed
    );

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;

    #[test]
    fn test_zone_numbers() {
        assert_eq!(utm_zone(-180.0), 1);
        assert_eq!(utm_zone(-74.006), 18);
        assert_eq!(utm_zone(-0.1278), 30);
        assert_eq!(utm_zone(0.0), 31);
        assert_eq!(utm_zone(3.0), 31);
        assert_eq!(utm_zone(179.9), 60);
        assert_eq!(utm_zone(180.0), 60);
    }

    #[test]
    fn test_hemisphere() {
        assert_eq!(Hemisphere::from_latitude(0.0), Hemisphere::North);
        assert_eq!(Hemisphere::from_latitude(-0.0001), Hemisphere::South);
    }

    #[test]
    fn test_proj_string() {
        assert_eq!(
            utm_proj_string(56, Hemisphere::South),
            "+proj=utm +zone=56 +south +datum=WGS84 +units=m +no_defs"
        );
        assert_eq!(
            utm_proj_string(18, Hemisphere::North),
            "+proj=utm +zone=18 +datum=WGS84 +units=m +no_defs"
        );
    }

    #[test]
    fn test_central_meridian_on_equator() {
        let utm = to_utm(0.0, 3.0).unwrap();
        assert_eq!(utm.zone_label(), "31N");
        assert!((utm.easting - 500_000.0).abs() < 1e-3);
        assert!(utm.northing.abs() < 1e-3);
    }

    #[test]
    fn test_display() {
        let utm = UtmCoordinate {
            zone: 56,
            hemisphere: Hemisphere::South,
            easting: 334_368.6,
            northing: 6_250_948.1,
        };
        assert_eq!(utm.to_string(), "56S 334368.60E 6250948.10N");
    }

    #[test]
    fn test_known_cities() {
        let ny = to_utm(40.7128, -74.0060).unwrap();
        assert_eq!(ny.zone_label(), "18N");
        assert!(ny.easting > 580_000.0 && ny.easting < 590_000.0);
        assert!(ny.northing > 4_500_000.0 && ny.northing < 4_515_000.0);

        let sydney = to_utm(-33.8688, 151.2093).unwrap();
        assert_eq!(sydney.zone_label(), "56S");
        // False northing of 10,000 km in the south
        assert!(sydney.northing > 6_200_000.0 && sydney.northing < 6_300_000.0);
    }

    #[test]
    fn test_round_trip() {
        let mut projector = UtmProjector::new().unwrap();
        let coords = [
            (40.7128, -74.0060),
            (51.5074, -0.1278),
            (-33.8688, 151.2093),
            (-22.9068, -43.1729),
            (0.0, 0.0),
            (64.1466, -21.9426),
        ];
        for (lat, lng) in coords {
            let utm = projector.to_utm(lat, lng).unwrap();
            let (back_lat, back_lng) = projector.from_utm(&utm).unwrap();
            assert!((back_lat - lat).abs() < 1e-6, "lat {} -> {}", lat, back_lat);
            assert!((back_lng - lng).abs() < 1e-6, "lng {} -> {}", lng, back_lng);
        }
    }

    #[test]
    fn test_invalid_coordinates() {
        assert!(matches!(
            to_utm(f64::NAN, 0.0),
            Err(GeopinError::ProjectionFailure { .. })
        ));
        assert!(to_utm(91.0, 0.0).is_err());
        assert!(to_utm(0.0, 200.0).is_err());
    }

    #[test]
    fn test_batch_skips_bad_points() {
        let points = vec![
            Point::new(40.7128, -74.0060, Record::new()),
            Point::new(f64::NAN, 0.0, Record::new()),
            Point::new(51.5074, -0.1278, Record::new()),
        ];
        let batch = project_points(&points).unwrap();
        assert_eq!(batch.report(), BatchReport { succeeded: 2, failed: 1 });
        assert_eq!(batch.points.len(), 3);
        assert_eq!(
            batch.points[0].attribute_text(UTM_ZONE_FIELD).as_deref(),
            Some("18N")
        );
        assert!(batch.points[1].attributes.is_empty());
        assert_eq!(
            batch.points[2].attribute_text(UTM_ZONE_FIELD).as_deref(),
            Some("30N")
        );
        let easting = batch.points[2].attribute_text(UTM_EASTING_FIELD).unwrap();
        assert_eq!(easting.split('.').nth(1).map(str::len), Some(2));
    }
}
