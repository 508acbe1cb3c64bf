//! Country boundary loading from GeoJSON.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use geo::MultiPolygon;
use geojson::{Feature, GeoJson};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{GeopinError, Result};

/// Property keys checked for a feature's display name, in priority order
pub const NAME_PROPERTIES: [&str; 3] = ["name", "NAME", "admin"];

/// A single country polygon with its dataset position
#[derive(Debug, Clone)]
pub struct BoundaryFeature {
    /// Position in the source dataset; lower wins on overlap
    pub ordinal: usize,
    pub name: Option<String>,
    pub geometry: MultiPolygon<f64>,
}

impl BoundaryFeature {
    /// Get the bounding box of this boundary
    pub fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        use geo::BoundingRect;
        self.geometry
            .bounding_rect()
            .map(|rect| (rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }
}

/// Read-only collection of country boundaries in dataset order
#[derive(Debug, Clone, Default)]
pub struct BoundaryDataset {
    pub features: Vec<BoundaryFeature>,
}

impl BoundaryDataset {
    /// Load a GeoJSON FeatureCollection, gzip-compressed when the path ends in `.gz`
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading world boundaries from {}", path.display());

        let file = File::open(path)?;
        let mut reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };

        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::from_geojson_str(&text)
    }

    pub fn from_geojson_str(text: &str) -> Result<Self> {
        let geojson: GeoJson = text
            .parse()
            .map_err(|e| GeopinError::parse("GeoJSON", e))?;

        let features = match geojson {
            GeoJson::FeatureCollection(fc) => fc.features,
            GeoJson::Feature(f) => vec![f],
            GeoJson::Geometry(_) => {
                return Err(GeopinError::parse(
                    "GeoJSON",
                    "expected a FeatureCollection of country polygons",
                ))
            }
        };

        let mut boundaries = Vec::with_capacity(features.len());
        for (ordinal, feature) in features.into_iter().enumerate() {
            if let Some(boundary) = to_boundary(ordinal, feature) {
                boundaries.push(boundary);
            }
        }

        info!("Found {} country boundaries", boundaries.len());

        Ok(Self {
            features: boundaries,
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

fn to_boundary(ordinal: usize, feature: Feature) -> Option<BoundaryFeature> {
    let name = feature_name(&feature);

    let geometry = match feature.geometry {
        Some(g) => g,
        None => {
            debug!("Feature {} has no geometry", ordinal);
            return None;
        }
    };

    let geometry = match geo_types::Geometry::<f64>::try_from(geometry) {
        Ok(geo_types::Geometry::Polygon(p)) => MultiPolygon::new(vec![p]),
        Ok(geo_types::Geometry::MultiPolygon(mp)) => mp,
        Ok(_) => {
            debug!("Skipping non-polygon feature {}", ordinal);
            return None;
        }
        Err(e) => {
            warn!("Could not convert geometry of feature {}: {}", ordinal, e);
            return None;
        }
    };

    Some(BoundaryFeature {
        ordinal,
        name,
        geometry,
    })
}

/// Preferred display name of a feature
fn feature_name(feature: &Feature) -> Option<String> {
    let properties = feature.properties.as_ref()?;
    NAME_PROPERTIES.iter().find_map(|key| match properties.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const TWO_SQUARES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"NAME": "Upper", "admin": "ignored"},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
            {"type": "Feature", "properties": {"kind": "line"},
             "geometry": {"type": "LineString", "coordinates": [[0,0],[1,1]]}},
            {"type": "Feature", "properties": {"admin": "Lower"},
             "geometry": {"type": "MultiPolygon", "coordinates": [[[[0,-1],[1,-1],[1,0],[0,0],[0,-1]]]]}}
        ]
    }"#;

    #[test]
    fn test_name_priority_and_skips() {
        let dataset = BoundaryDataset::from_geojson_str(TWO_SQUARES).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.features[0].name.as_deref(), Some("Upper"));
        assert_eq!(dataset.features[0].ordinal, 0);
        assert_eq!(dataset.features[1].name.as_deref(), Some("Lower"));
        // Ordinal keeps the original dataset position
        assert_eq!(dataset.features[1].ordinal, 2);
        assert_eq!(dataset.features[1].bbox(), Some((0.0, -1.0, 1.0, 0.0)));
    }

    #[test]
    fn test_rejects_bare_geometry() {
        let err = BoundaryDataset::from_geojson_str(r#"{"type":"Point","coordinates":[0,0]}"#)
            .unwrap_err();
        assert!(matches!(err, GeopinError::ParseFailure { .. }));
        assert!(BoundaryDataset::from_geojson_str("not json").is_err());
    }

    #[test]
    fn test_load_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.geojson.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(TWO_SQUARES.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let dataset = BoundaryDataset::load(&path).unwrap();
        assert_eq!(dataset.len(), 2);
    }
}
