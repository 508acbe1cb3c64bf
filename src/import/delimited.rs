//! Delimited text (CSV, TSV, ...) with delimiter sniffing.

use csv::{ReaderBuilder, StringRecord};
use hashbrown::HashSet;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{GeopinError, Result};
use crate::models::Record;

/// Delimiters tried when sniffing, in preference order
const CANDIDATES: [u8; 4] = [b',', b'\t', b'|', b';'];

/// Rows examined when sniffing
const PREVIEW_ROWS: usize = 10;

fn preview_rows(text: &str, delimiter: u8) -> Vec<usize> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    reader
        .records()
        .filter_map(|r| r.ok())
        .filter(|r| !is_blank(r))
        .take(PREVIEW_ROWS)
        .map(|r| r.len())
        .collect()
}

/// Pick the delimiter giving the steadiest field count across the first rows.
///
/// Ties go to the higher average field count; a delimiter must split rows
/// into at least two fields on average to qualify. Falls back to comma.
pub fn sniff_delimiter(text: &str) -> u8 {
    let mut best: Option<(u8, usize, f64)> = None;

    for delimiter in CANDIDATES {
        let counts = preview_rows(text, delimiter);
        if counts.is_empty() {
            continue;
        }

        let avg = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
        if avg < 1.99 {
            continue;
        }
        let delta: usize = counts.windows(2).map(|w| w[0].abs_diff(w[1])).sum();

        let better = match best {
            None => true,
            Some((_, best_delta, best_avg)) => {
                delta < best_delta || (delta == best_delta && avg > best_avg)
            }
        };
        if better {
            best = Some((delimiter, delta, avg));
        }
    }

    let delimiter = best.map(|(d, _, _)| d).unwrap_or(b',');
    debug!("Sniffed delimiter {:?}", delimiter as char);
    delimiter
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|f| f.trim().is_empty())
}

/// Make header names unique by suffixing repeats with `_1`, `_2`, ...
fn unique_headers(headers: &StringRecord) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .iter()
        .map(|h| {
            let mut name = h.to_string();
            let mut n = 0;
            while !seen.insert(name.clone()) {
                n += 1;
                name = format!("{}_{}", h, n);
            }
            name
        })
        .collect()
}

/// Parse delimited text with a header row into records of string values
pub fn parse_delimited(text: &str) -> Result<Vec<Record>> {
    let delimiter = sniff_delimiter(text);

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let headers = unique_headers(
        reader
            .headers()
            .map_err(|e| GeopinError::parse("CSV", e))?,
    );

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result.map_err(|e| GeopinError::parse("CSV", e))?;
        if is_blank(&row) {
            continue;
        }
        if row.len() > headers.len() {
            debug!(
                "Row {} has {} extra field(s); ignoring them",
                records.len() + 1,
                row.len() - headers.len()
            );
        }

        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(h, v)| (h.clone(), Value::String(v.to_string())))
            .collect();
        records.push(record);
    }

    info!(
        "Parsed {} rows with {} columns",
        records.len(),
        headers.len()
    );
    Ok(records)
}
