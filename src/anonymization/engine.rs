//! Privacy transformer
//!
//! Applies the field-level rules to every person sub-record of a feature:
//!
//! 1. the gender field is removed
//! 2. the identifier is replaced by a registry surrogate
//! 3. address blocks are removed, including anything nested in them
//! 4. `lives_abroad` is true when any foreign-address indicator key is
//!    present, whatever its value; the indicators are then removed
//! 5. birth date and its uncertainty marker are removed
//!
//! Names and the legal protection flag are left alone. Features without a
//! person sub-record pass through unchanged.
//!
//! # Examples
//!
//! ```
//! use matrikel::anonymization::{PrivacyConfig, PrivacyTransformer, PseudonymRegistry};
//! use matrikel::domain::{Feature, Value};
//! use serde_json::json;
//!
//! let transformer = PrivacyTransformer::new(&PrivacyConfig::default());
//! let mut registry = PseudonymRegistry::new();
//!
//! let raw = Value::from(json!({
//!     "properties": {"ejendePerson": {"id": "1234567890", "koen": "M", "navn": "Jens"}}
//! }));
//! let feature = Feature::from_value(0, raw).unwrap();
//! let out = transformer.transform(feature, &mut registry);
//!
//! let person = out.properties["ejendePerson"].as_map().unwrap();
//! assert!(!person.contains_key("koen"));
//! assert_ne!(person["id"], Value::from("1234567890"));
//! ```

use crate::anonymization::config::{PrivacyConfig, PrivacyFields};
use crate::anonymization::registry::PseudonymRegistry;
use crate::anonymization::report::TransformReport;
use crate::domain::{Feature, Map, Value};

/// Per-record privacy transformer
///
/// Holds only immutable rule configuration. The registry is passed in by the
/// caller so each run, and each test, owns an isolated one.
#[derive(Debug, Clone)]
pub struct PrivacyTransformer {
    person_path: Vec<String>,
    fields: PrivacyFields,
}

impl PrivacyTransformer {
    /// Create a transformer from configuration
    pub fn new(config: &PrivacyConfig) -> Self {
        Self {
            person_path: config.person_path.clone(),
            fields: config.fields.clone(),
        }
    }

    /// Transform a feature
    ///
    /// The only side effect is registry growth.
    pub fn transform(&self, feature: Feature, registry: &mut PseudonymRegistry) -> Feature {
        let mut scratch = TransformReport::new();
        self.transform_counted(feature, registry, &mut scratch)
    }

    /// Transform a feature and count each rule application
    pub fn transform_counted(
        &self,
        mut feature: Feature,
        registry: &mut PseudonymRegistry,
        report: &mut TransformReport,
    ) -> Feature {
        report.features_seen += 1;

        let Some((head, rest)) = self.person_path.split_first() else {
            return feature;
        };

        let persons_before = report.persons;
        if let Some(node) = feature.properties.get_mut(head) {
            visit_persons(node, rest, &mut |person| {
                self.apply_rules(person, registry, report);
            });
        }
        if report.persons > persons_before {
            report.features_with_person += 1;
        }

        feature
    }

    fn apply_rules(
        &self,
        person: &mut Map,
        registry: &mut PseudonymRegistry,
        report: &mut TransformReport,
    ) {
        report.persons += 1;
        let fields = &self.fields;

        if person.remove(&fields.gender).is_some() {
            report.gender_removed += 1;
        }

        let identifier = person
            .get(&fields.identifier)
            .map(|raw| (raw.to_key_string(), raw.is_null()));
        match identifier {
            Some((Some(identifier), _)) => {
                let surrogate = registry.surrogate(&identifier);
                person.insert(fields.identifier.clone(), Value::String(surrogate));
                report.identifiers_replaced += 1;
            }
            Some((None, false)) => {
                person.remove(&fields.identifier);
                report.identifiers_dropped += 1;
            }
            _ => {}
        }

        for block in &fields.address_blocks {
            if person.remove(block).is_some() {
                report.address_blocks_removed += 1;
            }
        }

        let mut abroad = false;
        for indicator in &fields.foreign_address {
            if person.remove(indicator).is_some() {
                report.foreign_address_removed += 1;
                abroad = true;
            }
        }
        person.insert(fields.lives_abroad.clone(), Value::Bool(abroad));
        if abroad {
            report.lives_abroad += 1;
        }

        for field in &fields.birth_date {
            if person.remove(field).is_some() {
                report.birth_date_removed += 1;
            }
        }
    }
}

/// Walk `path` below `node`, calling `f` on every map found at the end.
/// Sequences fan out at every level.
fn visit_persons(node: &mut Value, path: &[String], f: &mut dyn FnMut(&mut Map)) {
    match node {
        Value::Seq(items) => {
            for item in items {
                visit_persons(item, path, f);
            }
        }
        Value::Map(map) => match path.split_first() {
            None => f(map),
            Some((head, rest)) => {
                if let Some(child) = map.get_mut(head) {
                    visit_persons(child, rest, f);
                }
            }
        },
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature(properties: serde_json::Value) -> Feature {
        Feature::from_value(0, Value::from(json!({ "properties": properties }))).unwrap()
    }

    fn person(feature: &Feature) -> &Map {
        feature.properties["ejendePerson"].as_map().unwrap()
    }

    fn transformer() -> PrivacyTransformer {
        PrivacyTransformer::new(&PrivacyConfig::default())
    }

    #[test]
    fn test_removes_sensitive_fields_and_keeps_names() {
        let input = feature(json!({
            "bfeNummer": 100,
            "ejendePerson": {
                "id": "1234567890",
                "koen": "K",
                "navn": {"navn": "Karen Hansen"},
                "beskyttelser": {"navneOgAdressebeskyttelse": true},
                "bopaelsadresse": {"vejnavn": "Torvet", "kommune": {"kode": 751}},
                "standardadresse": "Torvet 1",
                "adresseoplysninger": {"adresse": "x"},
                "foedselsdato": "1970-01-01",
                "foedselsdatoUsikkerhedsmarkering": false
            }
        }));

        let out = transformer().transform(input, &mut PseudonymRegistry::new());
        let person = person(&out);

        for removed in [
            "koen",
            "bopaelsadresse",
            "standardadresse",
            "adresseoplysninger",
            "foedselsdato",
            "foedselsdatoUsikkerhedsmarkering",
            "udlandsadresse",
            "udrejseIndrejse",
        ] {
            assert!(!person.contains_key(removed), "{removed} should be gone");
        }
        assert_eq!(person["navn"], Value::from(json!({"navn": "Karen Hansen"})));
        assert!(person.contains_key("beskyttelser"));
        assert_eq!(person["lives_abroad"], Value::Bool(false));
        assert_eq!(out.properties["bfeNummer"], Value::Int(100));
    }

    #[test]
    fn test_lives_abroad_derived_from_indicators() {
        let input = feature(json!({
            "ejendePerson": {
                "id": "1111111111",
                "udlandsadresse": {"land": "SE", "adresselinje1": "Storgatan 1"}
            }
        }));
        let out = transformer().transform(input, &mut PseudonymRegistry::new());
        assert_eq!(person(&out)["lives_abroad"], Value::Bool(true));
        assert!(!person(&out).contains_key("udlandsadresse"));
    }

    #[test]
    fn test_indicator_key_counts_as_abroad_whatever_its_value() {
        for indicators in [
            json!({"udlandsadresse": {}}),
            json!({"udrejseIndrejse": null}),
            json!({"udlandsadresse": ""}),
        ] {
            let mut person_json = json!({"id": "1"});
            for (key, value) in indicators.as_object().unwrap() {
                person_json[key] = value.clone();
            }
            let input = feature(json!({ "ejendePerson": person_json }));
            let out = transformer().transform(input, &mut PseudonymRegistry::new());
            let person = person(&out);
            assert_eq!(person["lives_abroad"], Value::Bool(true), "{indicators}");
            assert!(!person.contains_key("udlandsadresse"));
            assert!(!person.contains_key("udrejseIndrejse"));
        }
    }

    #[test]
    fn test_no_indicator_key_means_not_abroad() {
        let input = feature(json!({"ejendePerson": {"id": "1", "navn": {"navn": "Ole"}}}));
        let out = transformer().transform(input, &mut PseudonymRegistry::new());
        assert_eq!(person(&out)["lives_abroad"], Value::Bool(false));
    }

    #[test]
    fn test_same_identifier_same_surrogate_across_features() {
        let t = transformer();
        let mut registry = PseudonymRegistry::new();

        let first = t.transform(feature(json!({"ejendePerson": {"id": "1234567890"}})), &mut registry);
        let second = t.transform(feature(json!({"ejendePerson": {"id": 1234567890_i64}})), &mut registry);

        let a = person(&first)["id"].clone();
        let b = person(&second)["id"].clone();
        assert_eq!(a, b);
        assert_ne!(a, Value::from("1234567890"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_feature_without_person_unchanged() {
        let input = feature(json!({"bfeNummer": 7, "ejerforholdskode": "10"}));
        let expected = input.clone();
        let mut registry = PseudonymRegistry::new();
        let mut report = TransformReport::new();

        let out = transformer().transform_counted(input, &mut registry, &mut report);
        assert_eq!(out, expected);
        assert!(registry.is_empty());
        assert_eq!(report.features_seen, 1);
        assert_eq!(report.features_with_person, 0);
    }

    #[test]
    fn test_fans_out_over_owner_lists() {
        let config = PrivacyConfig {
            person_path: vec!["ejere".to_string(), "ejendePerson".to_string()],
            ..PrivacyConfig::default()
        };
        let t = PrivacyTransformer::new(&config);
        let input = feature(json!({
            "ejere": [
                {"ejendePerson": {"id": "1", "koen": "M"}},
                {"ejendeVirksomhed": {"cvr": "12345678"}},
                {"ejendePerson": {"id": "2", "koen": "K"}}
            ]
        }));
        let mut registry = PseudonymRegistry::new();
        let mut report = TransformReport::new();
        let out = t.transform_counted(input, &mut registry, &mut report);

        assert_eq!(report.persons, 2);
        assert_eq!(report.gender_removed, 2);
        assert_eq!(registry.len(), 2);
        let Value::Seq(owners) = &out.properties["ejere"] else {
            panic!("owners should stay a list");
        };
        assert_eq!(
            owners[1],
            Value::from(json!({"ejendeVirksomhed": {"cvr": "12345678"}}))
        );
    }

    #[test]
    fn test_unreadable_identifier_is_dropped() {
        let input = feature(json!({"ejendePerson": {"id": {"nested": "1234567890"}}}));
        let mut report = TransformReport::new();
        let out =
            transformer().transform_counted(input, &mut PseudonymRegistry::new(), &mut report);
        assert!(!person(&out).contains_key("id"));
        assert_eq!(report.identifiers_dropped, 1);
    }
}
