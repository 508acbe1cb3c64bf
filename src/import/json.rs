//! JSON array-of-objects input.

use serde_json::Value;
use tracing::info;

use crate::error::{GeopinError, Result};
use crate::models::Record;

/// Parse a JSON array whose elements are all objects
pub fn parse_json(text: &str) -> Result<Vec<Record>> {
    let value: Value = serde_json::from_str(text).map_err(|e| GeopinError::parse("JSON", e))?;

    let items = match value {
        Value::Array(items) => items,
        _ => {
            return Err(GeopinError::parse(
                "JSON",
                "format not supported, expected an array of objects",
            ))
        }
    };

    let records = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(record) => Ok(record),
            _ => Err(GeopinError::parse(
                "JSON",
                format!("element {} is not an object", i),
            )),
        })
        .collect::<Result<Vec<Record>>>()?;

    info!("Parsed {} JSON records", records.len());
    Ok(records)
}
