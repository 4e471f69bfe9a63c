mod common;

use chrono::{DateTime, Utc};
use common::strategies::*;
use pipeline_core::{MessageProperties, PropertyKind, PropertyType, PropertyValue};
use proptest::prelude::*;
use uuid::Uuid;

/// Whether a typed lookup of `name` as `V` succeeds, and agrees with the declared tag
fn lookup_matches_tag<V: PropertyType>(properties: &MessageProperties, name: &str) -> bool {
    let declared = properties.kind_of(name);
    let found = properties.get::<V>(name).is_some();
    found == (declared == Some(V::KIND))
}

proptest! {
    /// Property: a lookup with a type other than the declared one is never a hit
    #[test]
    fn typed_lookup_only_hits_declared_type(entries in property_entries_strategy()) {
        let mut properties = MessageProperties::new();
        for (name, value) in &entries {
            properties.add_value(name.clone(), value.clone()).unwrap();
        }

        for (name, _) in &entries {
            prop_assert!(lookup_matches_tag::<bool>(&properties, name));
            prop_assert!(lookup_matches_tag::<i64>(&properties, name));
            prop_assert!(lookup_matches_tag::<u64>(&properties, name));
            prop_assert!(lookup_matches_tag::<f64>(&properties, name));
            prop_assert!(lookup_matches_tag::<String>(&properties, name));
            prop_assert!(lookup_matches_tag::<Vec<u8>>(&properties, name));
            prop_assert!(lookup_matches_tag::<DateTime<Utc>>(&properties, name));
            prop_assert!(lookup_matches_tag::<Uuid>(&properties, name));
            prop_assert!(lookup_matches_tag::<serde_json::Value>(&properties, name));
        }
    }

    /// Property: a mismatched lookup returns the caller-supplied default
    #[test]
    fn mismatched_lookup_returns_default(
        name in property_name_strategy(),
        value in property_value_strategy(),
        fallback in any::<i64>(),
    ) {
        let mut properties = MessageProperties::new();
        properties.add_value(name.clone(), value.clone()).unwrap();

        let expected = match value {
            PropertyValue::Int(stored) => stored,
            _ => fallback,
        };
        prop_assert_eq!(properties.get_or::<i64>(&name, fallback), expected);
    }

    /// Property: property bags survive serialization with their tags intact
    #[test]
    fn properties_keep_tags_through_serde(entries in property_entries_strategy()) {
        let mut properties = MessageProperties::new();
        for (name, value) in &entries {
            properties.add_value(name.clone(), value.clone()).unwrap();
        }

        let json = serde_json::to_string(&properties).unwrap();
        let restored: MessageProperties = serde_json::from_str(&json).unwrap();
        for (name, value) in &entries {
            prop_assert_eq!(restored.kind_of(name), Some(value.kind()));
        }
    }

    /// Property: names are unique; the first value added wins
    #[test]
    fn duplicate_names_keep_first_value(name in property_name_strategy(), first in any::<u64>(), second in any::<u64>()) {
        let mut properties = MessageProperties::new();
        properties.add(name.clone(), first).unwrap();
        prop_assert!(properties.add(name.clone(), second).is_err());
        prop_assert_eq!(properties.get::<u64>(&name), Some(first));
        prop_assert_eq!(properties.kind_of(&name), Some(PropertyKind::UInt));
    }
}
