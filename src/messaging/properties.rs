//! # Message Properties
//!
//! Out-of-band metadata attached to a message: a map from property name to a
//! tagged value. Typed lookups compare the tag and fall back to a default on a
//! mismatch, so a property is never read back as a different type than it was
//! declared with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{PipelineError, Result};

/// Declared type of a property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Bool,
    Int,
    UInt,
    Float,
    Text,
    Bytes,
    Timestamp,
    Uuid,
    Json,
}

/// Property value tagged with its declared type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    Json(serde_json::Value),
}

impl PropertyValue {
    /// Get the declared type tag
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Bool(_) => PropertyKind::Bool,
            Self::Int(_) => PropertyKind::Int,
            Self::UInt(_) => PropertyKind::UInt,
            Self::Float(_) => PropertyKind::Float,
            Self::Text(_) => PropertyKind::Text,
            Self::Bytes(_) => PropertyKind::Bytes,
            Self::Timestamp(_) => PropertyKind::Timestamp,
            Self::Uuid(_) => PropertyKind::Uuid,
            Self::Json(_) => PropertyKind::Json,
        }
    }
}

/// Rust types that can be stored in and read back from [`MessageProperties`]
///
/// Each type maps to exactly one [`PropertyKind`]; `from_property` returns `None`
/// for any other tag.
pub trait PropertyType: Sized {
    const KIND: PropertyKind;

    fn into_property(self) -> PropertyValue;

    fn from_property(value: &PropertyValue) -> Option<Self>;
}

macro_rules! property_type {
    ($ty:ty, $variant:ident) => {
        impl PropertyType for $ty {
            const KIND: PropertyKind = PropertyKind::$variant;

            fn into_property(self) -> PropertyValue {
                PropertyValue::$variant(self)
            }

            fn from_property(value: &PropertyValue) -> Option<Self> {
                match value {
                    PropertyValue::$variant(inner) => Some(inner.clone()),
                    _ => None,
                }
            }
        }
    };
}

property_type!(bool, Bool);
property_type!(i64, Int);
property_type!(u64, UInt);
property_type!(f64, Float);
property_type!(String, Text);
property_type!(Vec<u8>, Bytes);
property_type!(DateTime<Utc>, Timestamp);
property_type!(Uuid, Uuid);
property_type!(serde_json::Value, Json);

/// Heterogeneous, type-safe property bag
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageProperties {
    properties: HashMap<String, PropertyValue>,
}

impl MessageProperties {
    /// Create an empty property bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property. Names are unique; adding an existing name is an error.
    pub fn add<V: PropertyType>(&mut self, name: impl Into<String>, value: V) -> Result<&mut Self> {
        self.add_value(name, value.into_property())
    }

    /// Add an already tagged value
    pub fn add_value(&mut self, name: impl Into<String>, value: PropertyValue) -> Result<&mut Self> {
        let name = name.into();
        if self.properties.contains_key(&name) {
            return Err(PipelineError::property(name, "property already exists"));
        }
        self.properties.insert(name, value);
        Ok(self)
    }

    /// Add a text property
    pub fn add_text(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<&mut Self> {
        self.add(name, value.into())
    }

    /// Get a property if it exists with the requested type
    pub fn get<V: PropertyType>(&self, name: &str) -> Option<V> {
        self.properties.get(name).and_then(V::from_property)
    }

    /// Get a property, or `default` if it is absent or declared with another type
    pub fn get_or<V: PropertyType>(&self, name: &str, default: V) -> V {
        self.get(name).unwrap_or(default)
    }

    /// Get a property, or the type's default if it is absent or declared with another type
    pub fn get_or_default<V: PropertyType + Default>(&self, name: &str) -> V {
        self.get(name).unwrap_or_default()
    }

    /// Get the raw tagged value
    pub fn get_value(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Get the declared type of a property
    pub fn kind_of(&self, name: &str) -> Option<PropertyKind> {
        self.properties.get(name).map(PropertyValue::kind)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Iterate over property names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_round_trip() {
        let mut properties = MessageProperties::new();
        properties
            .add("attempt", 3_u64)
            .unwrap()
            .add_text("tenant", "acme")
            .unwrap()
            .add("context", json!({"region": "eu"}))
            .unwrap();

        assert_eq!(properties.get::<u64>("attempt"), Some(3));
        assert_eq!(properties.get::<String>("tenant").as_deref(), Some("acme"));
        assert_eq!(
            properties.get::<serde_json::Value>("context"),
            Some(json!({"region": "eu"}))
        );
        assert_eq!(properties.len(), 3);
    }

    #[test]
    fn test_type_mismatch_returns_default() {
        let mut properties = MessageProperties::new();
        properties.add("attempt", 3_u64).unwrap();

        // Same numeric value, different declared type
        assert_eq!(properties.get::<i64>("attempt"), None);
        assert_eq!(properties.get_or::<i64>("attempt", -1), -1);
        assert_eq!(properties.get_or_default::<String>("attempt"), String::new());
        assert_eq!(properties.kind_of("attempt"), Some(PropertyKind::UInt));
    }

    #[test]
    fn test_missing_property_returns_default() {
        let properties = MessageProperties::new();
        assert!(!properties.contains("missing"));
        assert!(!properties.get_or("missing", false));
        assert_eq!(properties.kind_of("missing"), None);
    }

    #[test]
    fn test_duplicate_property_rejected() {
        let mut properties = MessageProperties::new();
        properties.add("attempt", 1_i64).unwrap();

        let err = properties.add("attempt", 2_i64).unwrap_err();
        assert!(matches!(err, PipelineError::Property { .. }));
        assert_eq!(properties.get::<i64>("attempt"), Some(1));
    }

    #[test]
    fn test_serialized_form_keeps_tags() {
        let mut properties = MessageProperties::new();
        properties.add("retry", true).unwrap();

        let value = serde_json::to_value(&properties).unwrap();
        assert_eq!(value, json!({"retry": {"kind": "bool", "value": true}}));

        let restored: MessageProperties = serde_json::from_value(value).unwrap();
        assert_eq!(restored.get::<bool>("retry"), Some(true));
    }
}
