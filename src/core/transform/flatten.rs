//! Row flattening
//!
//! Turns a cleaned feature into one flat row for the columnar writer:
//!
//! - `feature_id`: the feature id, if any
//! - `geometry`: the GeoJSON geometry as compact text
//! - every property, with nested map keys joined by the separator
//!   (`ejendePerson.navn.navn`)
//!
//! Sequences are not exploded into columns; they are stored as JSON text so the
//! column set stays bounded by the shape of the maps.
//!
//! Two paths can land on the same column name, e.g. a literal `"a.b"` key next
//! to a nested `{"a": {"b": ..}}`. The first value written keeps the column and
//! the collision is logged.

use crate::domain::{Feature, Map, Value};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Column holding the feature id
pub const FEATURE_ID_COLUMN: &str = "feature_id";

/// Column holding the geometry as GeoJSON text
pub const GEOMETRY_COLUMN: &str = "geometry";

/// Prefix applied to properties whose name collides with a reserved column
const RESERVED_PREFIX: &str = "properties";

/// One flat output row; values are scalars only
pub type Row = BTreeMap<String, Value>;

/// Flatten a feature into a row
///
/// # Examples
///
/// ```
/// use matrikel::core::transform::flatten_feature;
/// use matrikel::domain::{Feature, Value};
/// use serde_json::json;
///
/// let feature = Feature::from_value(0, Value::from(json!({
///     "properties": {"ejendePerson": {"navn": {"navn": "Jens"}}, "ejere": [1, 2]}
/// }))).unwrap();
///
/// let row = flatten_feature(&feature, ".");
/// assert_eq!(row["ejendePerson.navn.navn"], Value::from("Jens"));
/// assert_eq!(row["ejere"], Value::from("[1,2]"));
/// ```
pub fn flatten_feature(feature: &Feature, separator: &str) -> Row {
    let mut row = Row::new();

    flatten_map(&feature.properties, "", separator, &mut row);

    for reserved in [FEATURE_ID_COLUMN, GEOMETRY_COLUMN] {
        if let Some(value) = row.remove(reserved) {
            insert_column(&mut row, format!("{RESERVED_PREFIX}{separator}{reserved}"), value);
        }
    }

    if let Some(id) = &feature.id {
        if let Some(scalar) = to_scalar(id) {
            row.insert(FEATURE_ID_COLUMN.to_string(), scalar);
        }
    }
    if let Some(geometry) = &feature.geometry {
        row.insert(
            GEOMETRY_COLUMN.to_string(),
            Value::String(geometry.to_json_string()),
        );
    }

    row
}

fn flatten_map(map: &Map, prefix: &str, separator: &str, row: &mut Row) {
    for (key, value) in map {
        let column = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}{separator}{key}")
        };

        match value {
            Value::Map(nested) => flatten_map(nested, &column, separator, row),
            other => {
                if let Some(scalar) = to_scalar(other) {
                    insert_column(row, column, scalar);
                }
            }
        }
    }
}

fn insert_column(row: &mut Row, column: String, value: Value) {
    match row.entry(column) {
        Entry::Vacant(slot) => {
            slot.insert(value);
        }
        Entry::Occupied(slot) => {
            tracing::warn!(column = %slot.key(), "Column name collision, later value dropped");
        }
    }
}

fn to_scalar(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Seq(_) | Value::Map(_) => Some(Value::String(value.to_json_string())),
        Value::Float(f) if !f.is_finite() => None,
        scalar => Some(scalar.clone()),
    }
}
