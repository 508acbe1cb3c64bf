//! Country enrichment over a point collection.

use serde::Serialize;
use tracing::{debug, info};

use super::CountryIndex;
use crate::error::{GeopinError, Result};
use crate::models::point::COUNTRY_FIELD;
use crate::models::Point;

/// Name assigned when no boundary contains a point
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Enriched copies of the input points
#[derive(Debug, Clone)]
pub struct Enrichment {
    pub points: Vec<Point>,
    pub report: EnrichReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnrichReport {
    pub total: usize,
    /// Points that fell inside some boundary
    pub matched: usize,
}

/// Country name for a single coordinate
pub fn country_name(index: &CountryIndex, lat: f64, lng: f64) -> Option<String> {
    index
        .lookup(lng, lat)
        .map(|b| b.name.clone().unwrap_or_else(|| UNKNOWN_COUNTRY.to_string()))
}

/// Add a `country` attribute to a copy of every point.
///
/// Fails only when the boundary dataset is not available yet.
pub fn enrich(points: &[Point], index: Option<&CountryIndex>) -> Result<Enrichment> {
    let index = index.ok_or(GeopinError::DatasetUnavailable)?;

    let mut matched = 0;
    let enriched: Vec<Point> = points
        .iter()
        .map(|point| {
            let name = match country_name(index, point.lat, point.lng) {
                Some(name) => {
                    matched += 1;
                    name
                }
                None => UNKNOWN_COUNTRY.to_string(),
            };
            debug!("({}, {}) -> {}", point.lat, point.lng, name);

            let mut point = point.clone();
            point.set_attribute(COUNTRY_FIELD, name);
            point
        })
        .collect();

    info!(
        "Country names added to {} of {} points",
        matched,
        enriched.len()
    );

    Ok(Enrichment {
        report: EnrichReport {
            total: enriched.len(),
            matched,
        },
        points: enriched,
    })
}
