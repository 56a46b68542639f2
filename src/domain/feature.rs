//! Feature (record) model
//!
//! A feature is one element of the source feature collection: an optional id,
//! a geometry, and a property bag that may carry a nested ownership sub-record.

use super::errors::MatrikelError;
use super::result::Result;
use super::value::{Map, Value};

/// A single feature in flight between the reader and the batch writer
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Feature identifier, if the source provides one
    pub id: Option<Value>,

    /// GeoJSON geometry object
    pub geometry: Option<Value>,

    /// Property bag
    pub properties: Map,
}

impl Feature {
    /// Create a feature from a property bag
    pub fn new(properties: Map) -> Self {
        Self {
            id: None,
            geometry: None,
            properties,
        }
    }

    /// Set the geometry
    pub fn with_geometry(mut self, geometry: Value) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Set the id
    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Build a feature from a parsed JSON element
    ///
    /// # Errors
    ///
    /// Returns `MatrikelError::Record` if the element is not an object or its
    /// `properties` member is neither an object nor null.
    pub fn from_value(index: u64, value: Value) -> Result<Self> {
        let Value::Map(mut map) = value else {
            return Err(MatrikelError::Record {
                index,
                reason: "feature is not a JSON object".to_string(),
            });
        };

        let properties = match map.remove("properties") {
            Some(Value::Map(props)) => props,
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(MatrikelError::Record {
                    index,
                    reason: "feature properties is not an object".to_string(),
                })
            }
        };

        let geometry = map.remove("geometry").filter(|g| !g.is_null());
        let id = map.remove("id").filter(|id| !id.is_null());

        Ok(Self {
            id,
            geometry,
            properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value() {
        let value = Value::from(json!({
            "type": "Feature",
            "id": 17,
            "geometry": {"type": "Point", "coordinates": [9.5, 56.1]},
            "properties": {"bfe_number": 100}
        }));

        let feature = Feature::from_value(0, value).unwrap();
        assert_eq!(feature.id, Some(Value::Int(17)));
        assert!(feature.geometry.is_some());
        assert_eq!(feature.properties["bfe_number"], Value::Int(100));
    }

    #[test]
    fn test_missing_properties_is_empty_bag() {
        let feature = Feature::from_value(0, Value::from(json!({"type": "Feature"}))).unwrap();
        assert!(feature.properties.is_empty());
        assert!(feature.geometry.is_none());
    }

    #[test]
    fn test_non_object_rejected() {
        let err = Feature::from_value(3, Value::from(json!([1, 2]))).unwrap_err();
        assert!(matches!(err, MatrikelError::Record { index: 3, .. }));
    }

    #[test]
    fn test_non_object_properties_rejected() {
        let value = Value::from(json!({"properties": "oops"}));
        assert!(Feature::from_value(0, value).is_err());
    }
}
