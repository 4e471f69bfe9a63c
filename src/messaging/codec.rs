//! # Message Body Codecs
//!
//! Serialization boundary used by transport-backed sources. The pipeline core never
//! depends on a concrete format; `JsonCodec` is the default implementation.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

use crate::error::{PipelineError, Result};

/// Converts messages to and from their wire representation
#[async_trait]
pub trait MessageCodec<T>: Send + Sync + 'static
where
    T: Send + Sync + 'static,
{
    /// Short format name used in logs (e.g. "json")
    fn format(&self) -> &'static str;

    fn serialize(&self, message: &T) -> Result<Vec<u8>>;

    fn deserialize(&self, payload: &[u8]) -> Result<T>;

    fn serialize_to_string(&self, message: &T) -> Result<String> {
        let bytes = self.serialize(message)?;
        String::from_utf8(bytes).map_err(|e| PipelineError::codec(e.to_string()))
    }

    fn deserialize_str(&self, payload: &str) -> Result<T> {
        self.deserialize(payload.as_bytes())
    }

    async fn serialize_async(&self, message: &T) -> Result<Vec<u8>> {
        self.serialize(message)
    }

    async fn deserialize_async(&self, payload: &[u8]) -> Result<T> {
        self.deserialize(payload)
    }
}

/// JSON codec backed by serde_json
#[derive(Debug)]
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> MessageCodec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn format(&self) -> &'static str {
        "json"
    }

    fn serialize(&self, message: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(message)?)
    }

    fn deserialize(&self, payload: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(payload)?)
    }

    fn serialize_to_string(&self, message: &T) -> Result<String> {
        Ok(serde_json::to_string(message)?)
    }

    fn deserialize_str(&self, payload: &str) -> Result<T> {
        Ok(serde_json::from_str(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Reading {
        sensor: String,
        value: f64,
    }

    #[test]
    fn test_json_codec_text_forms() {
        let codec = JsonCodec::<Reading>::new();
        let reading = Reading {
            sensor: "boiler".to_string(),
            value: 71.5,
        };

        let text = codec.serialize_to_string(&reading).unwrap();
        assert_eq!(text, r#"{"sensor":"boiler","value":71.5}"#);
        assert_eq!(codec.deserialize_str(&text).unwrap(), reading);
        assert_eq!(codec.format(), "json");
    }

    #[test]
    fn test_json_codec_rejects_malformed_payload() {
        let codec = JsonCodec::<Reading>::new();
        let err = codec.deserialize(b"{\"sensor\": 12}").unwrap_err();
        assert!(matches!(err, PipelineError::Codec { .. }));
    }

    #[tokio::test]
    async fn test_async_forms_delegate() {
        let codec = JsonCodec::<Reading>::new();
        let bytes = codec
            .serialize_async(&Reading {
                sensor: "pump".to_string(),
                value: 1.0,
            })
            .await
            .unwrap();
        let decoded = codec.deserialize_async(&bytes).await.unwrap();
        assert_eq!(decoded.sensor, "pump");
    }
}
