//! Working session: imported records, the two point views and the selection.
//!
//! Every operation is a plain method call that runs to completion. Errors
//! are returned to the caller and leave the session usable.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{GeopinError, Result};
use crate::export::{self, ExportFormat, ExportOptions};
use crate::filter::filter_in_bounds;
use crate::models::{Point, Record, SelectionRect};
use crate::pip::{self, CountryIndex, EnrichReport};
use crate::projection::{self, BatchReport};
use crate::store::{self, ColumnGuess};

/// Headers of freshly ingested records and the suggested coordinate columns
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub rows: usize,
    pub headers: Vec<String>,
    pub guess: ColumnGuess,
}

/// Snapshot of the session for status displays
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub raw_rows: usize,
    pub all_points: usize,
    pub working_points: usize,
    pub filtering_enabled: bool,
    pub selection: Option<SelectionRect>,
    pub boundaries_loaded: bool,
    pub loaded_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct Session {
    raw_records: Vec<Record>,
    all_points: Vec<Point>,
    /// Independent copies; enrichment only ever touches this view
    working_points: Vec<Point>,
    filtering_enabled: bool,
    selection: Option<SelectionRect>,
    boundaries: Option<Arc<CountryIndex>>,
    loaded_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_boundaries(index: Arc<CountryIndex>) -> Self {
        Self {
            boundaries: Some(index),
            ..Self::default()
        }
    }

    /// Make a boundary index available once it has finished loading
    pub fn attach_boundaries(&mut self, index: Arc<CountryIndex>) {
        info!("Boundary index attached with {} features", index.len());
        self.boundaries = Some(index);
    }

    pub fn boundaries_loaded(&self) -> bool {
        self.boundaries.is_some()
    }

    /// Keep freshly imported records until a column mapping is applied
    pub fn ingest_records(&mut self, records: Vec<Record>) -> Result<IngestSummary> {
        if records.is_empty() {
            return Err(GeopinError::NoData);
        }

        let headers = store::headers(&records);
        let guess = store::guess_columns(&headers);
        debug!("Column guess: {:?}", guess);

        self.raw_records = records;
        self.loaded_at = Some(Utc::now());

        Ok(IngestSummary {
            rows: self.raw_records.len(),
            headers,
            guess,
        })
    }

    /// Build points from the raw records with the chosen columns.
    ///
    /// On success both views are replaced, enrichment is cleared and
    /// filtering is turned off. On failure the previous points remain.
    pub fn apply_column_mapping(&mut self, lat_field: &str, lng_field: &str) -> Result<usize> {
        if self.raw_records.is_empty() {
            return Err(GeopinError::NoData);
        }

        let points = store::load(&self.raw_records, lat_field, lng_field)?;
        self.working_points = points.clone();
        self.all_points = points;
        self.filtering_enabled = false;

        info!(
            "Mapped {} of {} rows using '{}'/'{}'",
            self.all_points.len(),
            self.raw_records.len(),
            lat_field,
            lng_field
        );
        Ok(self.all_points.len())
    }

    fn refilter(&mut self) {
        self.working_points = match (&self.selection, self.filtering_enabled) {
            (_, false) => self.all_points.clone(),
            (Some(rect), true) => filter_in_bounds(&self.all_points, rect),
            (None, true) => Vec::new(),
        };
        debug!("Working view holds {} points", self.working_points.len());
    }

    /// Toggle filtering. Rebuilds the working view either way.
    pub fn set_filtering(&mut self, enabled: bool) {
        self.filtering_enabled = enabled;
        self.refilter();
    }

    /// Replace the selection rectangle
    pub fn set_selection(&mut self, rect: SelectionRect) {
        self.selection = Some(rect);
        if self.filtering_enabled {
            self.refilter();
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
        if self.filtering_enabled {
            self.working_points.clear();
        }
    }

    pub fn selection(&self) -> Option<&SelectionRect> {
        self.selection.as_ref()
    }

    pub fn filtering_enabled(&self) -> bool {
        self.filtering_enabled
    }

    pub fn all_points(&self) -> &[Point] {
        &self.all_points
    }

    pub fn working_points(&self) -> &[Point] {
        &self.working_points
    }

    /// What a map would plot: the working view while filtering, else everything
    pub fn visible_points(&self) -> &[Point] {
        if self.filtering_enabled {
            &self.working_points
        } else {
            &self.all_points
        }
    }

    /// Tag every working point with the country that contains it
    pub fn enrich_countries(&mut self) -> Result<EnrichReport> {
        let index = self
            .boundaries
            .as_deref()
            .ok_or(GeopinError::DatasetUnavailable)?;
        if self.working_points.is_empty() {
            return Err(GeopinError::EmptyWorkingSet);
        }

        let enrichment = pip::enrich(&self.working_points, Some(index))?;
        self.working_points = enrichment.points;
        Ok(enrichment.report)
    }

    /// Add UTM zone, easting and northing to every working point
    pub fn add_utm(&mut self) -> Result<BatchReport> {
        if self.working_points.is_empty() {
            return Err(GeopinError::EmptyWorkingSet);
        }

        let batch = projection::project_points(&self.working_points)?;
        let report = batch.report();
        self.working_points = batch.points;
        Ok(report)
    }

    /// Encode the working view
    pub fn export(&self, format: ExportFormat, options: &ExportOptions) -> Result<Vec<u8>> {
        if self.working_points.is_empty() {
            return Err(GeopinError::EmptyWorkingSet);
        }
        export::export(&self.working_points, format, options)
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            raw_rows: self.raw_records.len(),
            all_points: self.all_points.len(),
            working_points: self.working_points.len(),
            filtering_enabled: self.filtering_enabled,
            selection: self.selection,
            boundaries_loaded: self.boundaries_loaded(),
            loaded_at: self.loaded_at,
        }
    }
}
