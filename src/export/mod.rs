//! Export of the working point set to GIS and tabular formats.
//!
//! Attributes whose names start with the internal marker are never written.

mod csv_writer;
mod geojson_writer;
mod kml_writer;
mod shapefile_writer;

use serde::{Deserialize, Serialize};
use tracing::info;

pub use csv_writer::{export_columns, to_csv};
pub use geojson_writer::{to_feature_collection, to_geojson};
pub use kml_writer::{to_kml, to_kmz};
pub use shapefile_writer::{field_truncations, to_shapefile_zip, FieldTruncation};

use crate::error::Result;
use crate::models::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Geojson,
    Kml,
    Kmz,
    Shapefile,
}

impl ExportFormat {
    /// Suggested download name
    pub fn file_name(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "enriched_data.csv",
            ExportFormat::Geojson => "enriched_data.geojson",
            ExportFormat::Kml => "enriched_data.kml",
            ExportFormat::Kmz => "enriched_data.kmz",
            ExportFormat::Shapefile => "enriched_data.zip",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Geojson => "application/geo+json",
            ExportFormat::Kml => "application/vnd.google-earth.kml+xml",
            ExportFormat::Kmz => "application/vnd.google-earth.kmz",
            ExportFormat::Shapefile => "application/zip",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Proceed with a Shapefile export even if field names get truncated
    pub allow_field_truncation: bool,
}

/// Encode `points` in `format`
pub fn export(points: &[Point], format: ExportFormat, options: &ExportOptions) -> Result<Vec<u8>> {
    let bytes = match format {
        ExportFormat::Csv => to_csv(points)?,
        ExportFormat::Geojson => to_geojson(points)?,
        ExportFormat::Kml => to_kml(points)?,
        ExportFormat::Kmz => to_kmz(points)?,
        ExportFormat::Shapefile => to_shapefile_zip(points, options.allow_field_truncation)?,
    };

    info!(
        "Exported {} points as {:?} ({} bytes)",
        points.len(),
        format,
        bytes.len()
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        assert_eq!(ExportFormat::Kmz.file_name(), "enriched_data.kmz");
        assert_eq!(ExportFormat::Shapefile.content_type(), "application/zip");
        let format: ExportFormat = serde_json::from_str("\"geojson\"").unwrap();
        assert_eq!(format, ExportFormat::Geojson);
    }
}
