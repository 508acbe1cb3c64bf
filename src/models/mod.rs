//! Core data models for the point pipeline.

pub mod point;
pub mod selection;

pub use point::{Point, Record};
pub use selection::SelectionRect;
