//! Point records as held by the point store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single imported row: field name to value, in source column order.
pub type Record = Map<String, Value>;

/// Attribute names starting with this marker are internal and never exported.
pub const INTERNAL_FIELD_PREFIX: char = '_';

/// Attribute appended by country enrichment
pub const COUNTRY_FIELD: &str = "country";
/// Attributes appended by UTM projection
pub const UTM_ZONE_FIELD: &str = "utm_zone";
pub const UTM_EASTING_FIELD: &str = "utm_easting";
pub const UTM_NORTHING_FIELD: &str = "utm_northing";

/// Geographic point with the original row attached.
///
/// `lat`/`lng` are derived once from the mapped columns; `attributes` keeps
/// every original column and collects enrichment fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
    pub attributes: Record,
}

impl Point {
    pub fn new(lat: f64, lng: f64, attributes: Record) -> Self {
        Self {
            lat,
            lng,
            attributes,
        }
    }

    /// Set (or overwrite) an attribute
    pub fn set_attribute(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    /// Attribute rendered as plain text, if present
    pub fn attribute_text(&self, key: &str) -> Option<String> {
        self.attributes.get(key).map(value_to_text)
    }

    /// Attributes visible to exports, in column order
    pub fn exportable_attributes(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.attributes
            .iter()
            .filter(|(key, _)| !is_internal_field(key))
    }

    /// Exportable attributes as an owned map
    pub fn exportable_record(&self) -> Record {
        self.exportable_attributes()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

pub fn is_internal_field(key: &str) -> bool {
    key.starts_with(INTERNAL_FIELD_PREFIX)
}

/// Render a JSON value as a flat text cell (strings unquoted, null empty)
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
