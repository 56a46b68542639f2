//! Structural cleaning
//!
//! Columnar writers either reject or produce useless columns for substructures
//! that are present but empty. Cleaning removes nulls, empty maps, empty
//! sequences, and containers that only held such values, at any depth.
//! Primitive falsy values (`0`, `false`, `""`) are kept.

use crate::domain::{Feature, Map, Value};

/// Clean a value
///
/// A value that cleans away entirely becomes `Value::Null`.
///
/// # Examples
///
/// ```
/// use matrikel::core::transform::clean;
/// use matrikel::domain::Value;
/// use serde_json::json;
///
/// let dirty = Value::from(json!({"a": {"b": null, "c": []}, "d": 0, "e": ""}));
/// assert_eq!(clean(dirty).to_json(), json!({"d": 0, "e": ""}));
/// ```
pub fn clean(value: Value) -> Value {
    prune(value).unwrap_or(Value::Null)
}

/// Clean every entry of a map, dropping those that clean away
pub fn clean_map(map: Map) -> Map {
    map.into_iter()
        .filter_map(|(key, value)| prune(value).map(|v| (key, v)))
        .collect()
}

/// Clean a feature's properties, geometry and id
pub fn clean_feature(feature: Feature) -> Feature {
    Feature {
        id: feature.id.and_then(prune),
        geometry: feature.geometry.and_then(prune),
        properties: clean_map(feature.properties),
    }
}

fn prune(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Map(map) => {
            let map = clean_map(map);
            (!map.is_empty()).then_some(Value::Map(map))
        }
        Value::Seq(items) => {
            let items: Vec<Value> = items.into_iter().filter_map(prune).collect();
            (!items.is_empty()).then_some(Value::Seq(items))
        }
        primitive => Some(primitive),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[test]
    fn test_drops_empty_containers_recursively() {
        let input = v(json!({
            "keep": 1,
            "null": null,
            "empty_map": {},
            "empty_seq": [],
            "nested": {"inner": {"deeper": {}}, "list": [null, {}, []]}
        }));
        assert_eq!(clean(input), v(json!({"keep": 1})));
    }

    #[test]
    fn test_preserves_falsy_primitives() {
        let input = v(json!({"zero": 0, "no": false, "blank": "", "float": 0.0}));
        assert_eq!(clean(input.clone()), input);
    }

    #[test]
    fn test_sequence_elements_cleaned() {
        let input = v(json!([1, null, {"a": null}, {"b": false}]));
        assert_eq!(clean(input), v(json!([1, {"b": false}])));
    }

    #[test]
    fn test_entirely_empty_becomes_null() {
        assert_eq!(clean(v(json!({"a": {"b": []}}))), Value::Null);
        assert_eq!(clean(Value::Null), Value::Null);
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            json!({"a": {"b": null, "c": [[], [null], [0]]}, "d": {"e": {"f": ""}}}),
            json!([[], {}, null]),
            json!("text"),
            json!({"ejendePerson": {"navn": {"navn": "A"}, "beskyttelser": {}}}),
        ];
        for input in inputs {
            let once = clean(v(input));
            let twice = clean(once.clone());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_clean_feature() {
        let feature = Feature::from_value(
            0,
            v(json!({
                "geometry": {"type": "Polygon", "coordinates": []},
                "properties": {"bfe": 7, "ejendePerson": {"adresse": {}}}
            })),
        )
        .unwrap();

        let cleaned = clean_feature(feature);
        assert_eq!(cleaned.properties.len(), 1);
        assert_eq!(cleaned.geometry, Some(v(json!({"type": "Polygon"}))));
    }
}
