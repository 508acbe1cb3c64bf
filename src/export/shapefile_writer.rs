use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use hashbrown::HashSet;
use serde::Serialize;
use serde_json::Value;
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point as ShpPoint, Writer};
use tempfile::Builder;
use tracing::{debug, warn};
use zip::write::FileOptions;
use zip::CompressionMethod;

use super::export_columns;
use crate::error::{GeopinError, Result};
use crate::models::point::value_to_text;
use crate::models::Point;

/// dBASE field names hold at most this many bytes
const MAX_FIELD_NAME: usize = 10;
/// dBASE character fields hold at most this many bytes
const MAX_CHARACTER_WIDTH: usize = 254;

const FOLDER: &str = "shapefiles";
const LAYER: &str = "points";
const COMPONENTS: [&str; 5] = ["shp", "shx", "dbf", "prj", "cpg"];

const WGS84_PRJ: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137,298.257223563]],PRIMEM["Greenwich",0],UNIT["Degree",0.017453292519943295]]"#;

/// A column whose name does not fit a dBASE field name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldTruncation {
    pub original: String,
    pub truncated: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FieldKind {
    Numeric,
    Character(u8),
}

#[derive(Debug, Clone)]
struct ShapefileField {
    source: String,
    name: String,
    kind: FieldKind,
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Assign unique dBASE names to columns, shortening where needed
fn field_names(columns: &[String]) -> Vec<String> {
    let mut used = HashSet::new();
    columns
        .iter()
        .map(|column| {
            let mut name = truncate_bytes(column, MAX_FIELD_NAME).to_string();
            let mut n = 1;
            while !used.insert(name.clone()) {
                let suffix = format!("_{}", n);
                name = format!(
                    "{}{}",
                    truncate_bytes(column, MAX_FIELD_NAME - suffix.len()),
                    suffix
                );
                n += 1;
            }
            name
        })
        .collect()
}

/// Columns that would be renamed by a Shapefile export
pub fn field_truncations(points: &[Point]) -> Vec<FieldTruncation> {
    let columns = export_columns(points);
    columns
        .iter()
        .zip(field_names(&columns))
        .filter(|(original, truncated)| original.as_str() != truncated.as_str())
        .map(|(original, truncated)| FieldTruncation {
            original: original.clone(),
            truncated,
        })
        .collect()
}

fn plan_fields(points: &[Point]) -> Vec<ShapefileField> {
    let columns = export_columns(points);
    let names = field_names(&columns);

    columns
        .into_iter()
        .zip(names)
        .map(|(source, name)| {
            let values: Vec<&Value> = points
                .iter()
                .filter_map(|p| p.attributes.get(&source))
                .filter(|v| !v.is_null())
                .collect();

            let kind = if !values.is_empty() && values.iter().all(|v| v.is_number()) {
                FieldKind::Numeric
            } else {
                let width = values
                    .iter()
                    .map(|v| value_to_text(v).len())
                    .max()
                    .unwrap_or(1)
                    .clamp(1, MAX_CHARACTER_WIDTH);
                FieldKind::Character(width as u8)
            };

            ShapefileField { source, name, kind }
        })
        .collect()
}

fn table_builder(fields: &[ShapefileField]) -> Result<TableWriterBuilder> {
    let mut builder = TableWriterBuilder::new();
    for field in fields {
        let name = FieldName::try_from(field.name.as_str())
            .map_err(|e| GeopinError::export(format!("invalid field name '{}': {:?}", field.name, e)))?;
        builder = match field.kind {
            FieldKind::Numeric => builder.add_numeric_field(name, 18, 6),
            FieldKind::Character(width) => builder.add_character_field(name, width),
        };
    }
    Ok(builder)
}

fn record(point: &Point, fields: &[ShapefileField]) -> Record {
    let mut record = Record::default();
    for field in fields {
        let value = point.attributes.get(&field.source);
        let value = match field.kind {
            FieldKind::Numeric => FieldValue::Numeric(value.and_then(Value::as_f64)),
            FieldKind::Character(_) => FieldValue::Character(
                value
                    .filter(|v| !v.is_null())
                    .map(|v| truncate_bytes(&value_to_text(v), MAX_CHARACTER_WIDTH).to_string()),
            ),
        };
        record.insert(field.name.clone(), value);
    }
    record
}

fn write_layer(dir: &Path, points: &[Point], fields: &[ShapefileField]) -> Result<()> {
    let builder = table_builder(fields)?;
    let mut writer = Writer::from_path(dir.join(format!("{}.shp", LAYER)), builder)
        .map_err(GeopinError::export)?;

    for point in points {
        let shape = ShpPoint::new(point.lng, point.lat);
        writer
            .write_shape_and_record(&shape, &record(point, fields))
            .map_err(GeopinError::export)?;
    }
    drop(writer);

    fs::write(dir.join(format!("{}.prj", LAYER)), WGS84_PRJ)?;
    fs::write(dir.join(format!("{}.cpg", LAYER)), "UTF-8")?;
    Ok(())
}

/// Zipped Shapefile layer of points.
///
/// Refuses to rename columns silently: unless `allow_truncation` is set,
/// any name longer than 10 bytes fails with `FieldTruncation`.
pub fn to_shapefile_zip(points: &[Point], allow_truncation: bool) -> Result<Vec<u8>> {
    let truncations = field_truncations(points);
    if !truncations.is_empty() {
        if !allow_truncation {
            return Err(GeopinError::FieldTruncation(truncations));
        }
        for t in &truncations {
            warn!("Field '{}' written as '{}'", t.original, t.truncated);
        }
    }

    let fields = plan_fields(points);
    let temp_dir = Builder::new().prefix("geopin-shp-").tempdir()?;
    write_layer(temp_dir.path(), points, &fields)?;

    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options: FileOptions<'_, ()> =
            FileOptions::default().compression_method(CompressionMethod::Deflated);

        for ext in COMPONENTS {
            let file_name = format!("{}.{}", LAYER, ext);
            let path = temp_dir.path().join(&file_name);
            if !path.exists() {
                continue;
            }
            debug!("Adding {} to archive", file_name);
            zip.start_file(format!("{}/{}", FOLDER, file_name), options)
                .map_err(GeopinError::export)?;
            zip.write_all(&fs::read(&path)?)?;
        }
        zip.finish().map_err(GeopinError::export)?;
    }

    Ok(buf)
}
