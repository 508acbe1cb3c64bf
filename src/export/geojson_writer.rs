use geojson::{Feature, FeatureCollection, Geometry, Value};

use crate::error::{GeopinError, Result};
use crate::models::Point;

/// One Point feature per point, coordinates in `[lng, lat]` order
pub fn to_feature_collection(points: &[Point]) -> FeatureCollection {
    let features = points
        .iter()
        .map(|p| Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![p.lng, p.lat]))),
            id: None,
            properties: Some(p.exportable_record()),
            foreign_members: None,
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

pub fn to_geojson(points: &[Point]) -> Result<Vec<u8>> {
    serde_json::to_vec(&to_feature_collection(points)).map_err(GeopinError::export)
}
