//! # Message Container
//!
//! The unit of work flowing from sources through processors and the host: one
//! message plus its properties. Containers are cheap to clone; the payload and
//! properties are shared, never copied.
//!
//! A container is either non-empty (it holds a message) or the empty sentinel
//! returned by probes and queue adapters when nothing is available. Containers are
//! only ever built through the explicit constructors below.

use std::sync::{Arc, OnceLock};

use super::properties::MessageProperties;

static EMPTY_PROPERTIES: OnceLock<Arc<MessageProperties>> = OnceLock::new();

fn empty_properties() -> Arc<MessageProperties> {
    EMPTY_PROPERTIES
        .get_or_init(|| Arc::new(MessageProperties::new()))
        .clone()
}

/// One message in flight together with its properties
#[derive(Debug)]
pub struct MessageContainer<T> {
    message: Option<Arc<T>>,
    properties: Arc<MessageProperties>,
}

impl<T> MessageContainer<T> {
    /// Wrap a message with no properties
    pub fn new(message: T) -> Self {
        Self::from_arc(Arc::new(message))
    }

    /// Wrap a message together with its properties
    pub fn with_properties(message: T, properties: MessageProperties) -> Self {
        Self {
            message: Some(Arc::new(message)),
            properties: Arc::new(properties),
        }
    }

    /// Wrap an already shared message
    pub fn from_arc(message: Arc<T>) -> Self {
        Self {
            message: Some(message),
            properties: empty_properties(),
        }
    }

    /// The empty sentinel: "no message available"
    pub fn empty() -> Self {
        Self {
            message: None,
            properties: empty_properties(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.message.is_none()
    }

    /// Borrow the message, `None` for the empty sentinel
    pub fn message(&self) -> Option<&T> {
        self.message.as_deref()
    }

    /// Borrow the shared message handle
    pub fn message_arc(&self) -> Option<&Arc<T>> {
        self.message.as_ref()
    }

    /// Take the shared message handle out of the container
    pub fn into_message(self) -> Option<Arc<T>> {
        self.message
    }

    pub fn properties(&self) -> &MessageProperties {
        &self.properties
    }

    /// Whether both containers carry the very same message instance
    pub fn same_message(&self, other: &Self) -> bool {
        match (&self.message, &other.message) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<T> Clone for MessageContainer<T> {
    fn clone(&self) -> Self {
        Self {
            message: self.message.clone(),
            properties: self.properties.clone(),
        }
    }
}

impl<T> Default for MessageContainer<T> {
    fn default() -> Self {
        Self::empty()
    }
}
