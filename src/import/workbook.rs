//! Spreadsheet workbook input (first sheet only).

use std::path::Path;

use serde_json::{Number, Value};
use tracing::info;
use umya_spreadsheet::reader::xlsx;
use umya_spreadsheet::{CellRawValue, Worksheet};

use crate::error::{GeopinError, Result};
use crate::models::Record;

/// Cell value keeping its type: numbers and booleans stay typed, the rest is text
fn cell_value(sheet: &Worksheet, col: u32, row: u32) -> Option<Value> {
    let cell = sheet.get_cell((col, row))?;
    let value = match cell.get_raw_value() {
        CellRawValue::Numeric(n) => {
            if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                Value::from(*n as i64)
            } else {
                Value::Number(Number::from_f64(*n)?)
            }
        }
        CellRawValue::Bool(b) => Value::Bool(*b),
        _ => {
            let text = cell.get_value();
            if text.is_empty() {
                return None;
            }
            Value::String(text.to_string())
        }
    };
    Some(value)
}

/// Read the first sheet of an XLSX workbook.
///
/// The first row names the columns; empty cells are left out of a row and
/// rows with no values at all are skipped. Numeric cells become JSON numbers.
pub fn read_workbook(path: &Path) -> Result<Vec<Record>> {
    let book = xlsx::read(path).map_err(|e| GeopinError::parse("XLSX", e))?;
    let sheet = book
        .get_sheet(&0)
        .ok_or_else(|| GeopinError::parse("XLSX", "workbook has no sheets"))?;

    let (max_col, max_row) = sheet.get_highest_column_and_row();
    if max_row == 0 {
        return Ok(Vec::new());
    }

    let headers: Vec<String> = (1..=max_col)
        .map(|col| sheet.get_value((col, 1)))
        .collect();

    let mut records = Vec::new();
    for row in 2..=max_row {
        let record: Record = headers
            .iter()
            .enumerate()
            .filter(|(_, header)| !header.is_empty())
            .filter_map(|(i, header)| {
                cell_value(sheet, i as u32 + 1, row).map(|value| (header.clone(), value))
            })
            .collect();
        if !record.is_empty() {
            records.push(record);
        }
    }

    info!(
        "Read {} rows from first sheet of {}",
        records.len(),
        path.display()
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cities.xlsx");

        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_mut(&0).unwrap();
        for (c, header) in ["name", "lat", "lng", "rank"].iter().enumerate() {
            sheet.get_cell_mut(((c + 1) as u32, 1)).set_value_string(*header);
        }
        // Row 3 stays blank
        let rows = [(2, "Tokyo", 35.6762, 139.6503, 1.0), (4, "Paris", 48.8566, 2.3522, 2.0)];
        for (r, name, lat, lng, rank) in rows {
            sheet.get_cell_mut((1, r)).set_value_string(name);
            sheet.get_cell_mut((2, r)).set_value_number(lat);
            sheet.get_cell_mut((3, r)).set_value_number(lng);
            sheet.get_cell_mut((4, r)).set_value_number(rank);
        }
        umya_spreadsheet::writer::xlsx::write(&book, &path).unwrap();

        let records = read_workbook(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["name"], Value::String("Tokyo".into()));
        assert_eq!(records[0]["lat"], serde_json::json!(35.6762));
        assert_eq!(records[1]["lng"], serde_json::json!(2.3522));
        assert_eq!(records[1]["rank"], serde_json::json!(2));
        assert!(records[1]["lat"].is_number());
    }
}
