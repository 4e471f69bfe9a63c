//! # Messaging Module
//!
//! Value types that travel through the pipeline: message containers, their typed
//! property bags, and the body codec boundary used by transport-backed sources.

pub mod codec;
pub mod container;
pub mod properties;

pub use codec::{JsonCodec, MessageCodec};
pub use container::MessageContainer;
pub use properties::{MessageProperties, PropertyKind, PropertyType, PropertyValue};
