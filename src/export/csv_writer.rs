use csv::Writer;
use hashbrown::HashSet;

use crate::error::{GeopinError, Result};
use crate::models::point::value_to_text;
use crate::models::Point;

/// Exportable column names across all points, in first-seen order
pub fn export_columns(points: &[Point]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for point in points {
        for (key, _) in point.exportable_attributes() {
            if seen.insert(key.as_str()) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// CSV with a header row; missing values become empty cells
pub fn to_csv(points: &[Point]) -> Result<Vec<u8>> {
    let columns = export_columns(points);
    let mut writer = Writer::from_writer(Vec::new());

    if !columns.is_empty() {
        writer
            .write_record(&columns)
            .map_err(GeopinError::export)?;

        for point in points {
            let row: Vec<String> = columns
                .iter()
                .map(|c| point.attributes.get(c).map(value_to_text).unwrap_or_default())
                .collect();
            writer.write_record(&row).map_err(GeopinError::export)?;
        }
    }

    writer.into_inner().map_err(GeopinError::export)
}
