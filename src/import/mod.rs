//! Tabular input: delimited text, JSON, XLSX workbooks and remote URLs.
//!
//! Every source ends up as `Vec<Record>` before reaching the point store.

mod delimited;
mod json;
mod remote;
mod workbook;

use std::path::Path;

use tracing::info;

pub use delimited::{parse_delimited, sniff_delimiter};
pub use json::parse_json;
pub use remote::RemoteImporter;
pub use workbook::read_workbook;

use crate::error::{GeopinError, Result};
use crate::models::Record;

/// Byte-order mark some editors put at the start of UTF-8 files
const BOM: char = '\u{feff}';

/// Parse text as JSON when it looks like JSON, otherwise as delimited text
pub fn parse_text(text: &str) -> Result<Vec<Record>> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        parse_json(trimmed)
    } else {
        parse_delimited(text)
    }
}

/// Read a local file; `.xlsx` goes through the workbook reader
pub fn read_file(path: &Path) -> Result<Vec<Record>> {
    info!("Importing {}", path.display());

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("xlsx") => read_workbook(path),
        Some("xls") => Err(GeopinError::parse(
            "XLS",
            "legacy .xls workbooks are not supported, save as .xlsx",
        )),
        _ => {
            let text = std::fs::read_to_string(path)?;
            parse_text(&text)
        }
    }
}
