//! Point-in-Polygon (PIP) country lookup.
//!
//! Loads country boundaries from GeoJSON and answers containment queries
//! through an R-tree spatial index.

mod boundary;
mod index;
mod service;

pub use boundary::{BoundaryDataset, BoundaryFeature, NAME_PROPERTIES};
pub use index::CountryIndex;
pub use service::{country_name, enrich, EnrichReport, Enrichment, UNKNOWN_COUNTRY};
