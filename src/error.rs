//! Error taxonomy shared by every session operation.

use thiserror::Error;

use crate::export::FieldTruncation;

pub type Result<T, E = GeopinError> = std::result::Result<T, E>;

/// Errors surfaced to the caller. None of them poisons a session; the caller
/// reports them and keeps going.
#[derive(Debug, Error)]
pub enum GeopinError {
    /// No record survived coordinate parsing with the chosen columns
    #[error("no valid rows found with latitude column '{lat_field}' and longitude column '{lng_field}'")]
    NoValidRows {
        lat_field: String,
        lng_field: String,
    },

    /// Country enrichment requested before the boundary dataset was loaded
    #[error("world boundaries dataset is not loaded yet")]
    DatasetUnavailable,

    /// A single point could not be projected
    #[error("projection failed for ({lat}, {lng}): {reason}")]
    ProjectionFailure { lat: f64, lng: f64, reason: String },

    /// Remote fetch failed or returned a non-2xx status
    #[error("failed to fetch {url}: {reason}")]
    NetworkFailure { url: String, reason: String },

    /// Malformed input text or workbook
    #[error("failed to parse {format} data: {reason}")]
    ParseFailure {
        format: &'static str,
        reason: String,
    },

    /// An operation needed imported records and there are none
    #[error("no data found")]
    NoData,

    /// An operation needed points in the working set and there are none
    #[error("no points to process")]
    EmptyWorkingSet,

    /// Shapefile export would truncate field names and the caller did not allow it
    #[error("{} field name(s) would be truncated to 10 characters", .0.len())]
    FieldTruncation(Vec<FieldTruncation>),

    #[error("export failed: {0}")]
    Export(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GeopinError {
    pub(crate) fn parse(format: &'static str, reason: impl ToString) -> Self {
        GeopinError::ParseFailure {
            format,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn network(url: &str, reason: impl ToString) -> Self {
        GeopinError::NetworkFailure {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn export(reason: impl ToString) -> Self {
        GeopinError::Export(reason.to_string())
    }
}
