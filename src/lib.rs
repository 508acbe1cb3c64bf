//! Geopin - point data enrichment with country lookup and UTM projection
//!
//! This library provides the session and pipeline modules shared by the
//! enrich and serve binaries.

pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod import;
pub mod models;
pub mod pip;
pub mod projection;
pub mod session;
pub mod store;

pub use error::{GeopinError, Result};
pub use models::{Point, Record, SelectionRect};
pub use session::Session;
