#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use uuid::Uuid;

use pipeline_core::PropertyValue;

/// Strategy for property names
pub fn property_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,31}"
}

/// Strategy for property values covering every declared type
pub fn property_value_strategy() -> impl Strategy<Value = PropertyValue> {
    prop_oneof![
        any::<bool>().prop_map(PropertyValue::Bool),
        any::<i64>().prop_map(PropertyValue::Int),
        any::<u64>().prop_map(PropertyValue::UInt),
        (-1.0e9f64..1.0e9).prop_map(PropertyValue::Float),
        "[a-zA-Z0-9 ]{0,32}".prop_map(PropertyValue::Text),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(PropertyValue::Bytes),
        (0i64..4_000_000_000).prop_map(|secs| {
            PropertyValue::Timestamp(Utc.timestamp_opt(secs, 0).single().unwrap_or_default())
        }),
        any::<u128>().prop_map(|bits| PropertyValue::Uuid(Uuid::from_u128(bits))),
        any::<i32>().prop_map(|n| PropertyValue::Json(serde_json::json!({ "n": n }))),
    ]
}

/// Unique property entries
pub fn property_entries_strategy() -> impl Strategy<Value = Vec<(String, PropertyValue)>> {
    prop::collection::btree_map(property_name_strategy(), property_value_strategy(), 0..12)
        .prop_map(|entries| entries.into_iter().collect())
}
