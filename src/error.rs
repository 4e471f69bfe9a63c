//! # Pipeline Error Types
//!
//! Structured error handling for sources, processors and the host using thiserror.
//! Variants follow the four failure classes of the pipeline: construction errors,
//! lifecycle hook errors, processing errors and routing errors.

use std::sync::Arc;
use thiserror::Error;

use crate::config::ConfigurationError;

/// Error shared across notification channel subscribers
pub type SharedError = Arc<PipelineError>;

/// Comprehensive pipeline error types
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid message processor: {reason}")]
    InvalidProcessor { reason: String },

    #[error("Duplicate message processor name: {name}")]
    DuplicateProcessorName { name: String },

    #[error("Lifecycle hook failed: {component}: {phase}: {source}")]
    LifecycleHook {
        component: String,
        phase: String,
        #[source]
        source: SharedError,
    },

    #[error("Message handler error: {message}")]
    Handler { message: String },

    #[error("Message probe failed for source {source_name}: {message}")]
    Probe { source_name: String, message: String },

    #[error("Notification handler panicked on channel {channel}: {message}")]
    HandlerPanicked { channel: String, message: String },

    #[error("Message processor {processor} failed to process message: {source}")]
    ProcessingFailed {
        processor: String,
        #[source]
        source: SharedError,
    },

    #[error("Invalid forward recipient: {reason}")]
    InvalidRecipient { reason: String },

    #[error("Empty message container cannot be used for {operation}")]
    EmptyMessage { operation: String },

    #[error("Message processor host is no longer available")]
    HostUnavailable,

    #[error("{route} dispatch failed for {} route(s)", .failures.len())]
    DispatchFailed {
        route: String,
        failures: Vec<SharedError>,
    },

    #[error("Message codec error: {message}")]
    Codec { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Message property error: {name}: {reason}")]
    Property { name: String, reason: String },

    #[error("Timeout: operation {operation} did not finish within {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Internal pipeline error: {message}")]
    Internal { message: String },
}

impl PipelineError {
    /// Create an invalid processor error
    pub fn invalid_processor(reason: impl Into<String>) -> Self {
        Self::InvalidProcessor {
            reason: reason.into(),
        }
    }

    /// Create a duplicate processor name error
    pub fn duplicate_processor_name(name: impl Into<String>) -> Self {
        Self::DuplicateProcessorName { name: name.into() }
    }

    /// Create a lifecycle hook error
    pub fn lifecycle_hook(
        component: impl Into<String>,
        phase: impl Into<String>,
        source: PipelineError,
    ) -> Self {
        Self::LifecycleHook {
            component: component.into(),
            phase: phase.into(),
            source: Arc::new(source),
        }
    }

    /// Create a message handler error
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }

    /// Create a probe error
    pub fn probe(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Probe {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a handler panic error
    pub fn handler_panicked(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandlerPanicked {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Wrap a processing failure with the name of the processor that raised it
    pub fn processing_failed(processor: impl Into<String>, source: SharedError) -> Self {
        Self::ProcessingFailed {
            processor: processor.into(),
            source,
        }
    }

    /// Create an invalid recipient error
    pub fn invalid_recipient(reason: impl Into<String>) -> Self {
        Self::InvalidRecipient {
            reason: reason.into(),
        }
    }

    /// Create an empty message error
    pub fn empty_message(operation: impl Into<String>) -> Self {
        Self::EmptyMessage {
            operation: operation.into(),
        }
    }

    /// Create a dispatch failure error
    pub fn dispatch_failed(route: impl Into<String>, failures: Vec<SharedError>) -> Self {
        Self::DispatchFailed {
            route: route.into(),
            failures,
        }
    }

    /// Create a codec error
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a property error
    pub fn property(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Property {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error was raised by a caller-side precondition check
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidRecipient { .. }
                | Self::EmptyMessage { .. }
                | Self::InvalidProcessor { .. }
        )
    }

    /// Get the broad error category used in structured log fields
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidProcessor { .. } | Self::DuplicateProcessorName { .. } => "construction",
            Self::LifecycleHook { .. } => "lifecycle",
            Self::Handler { .. }
            | Self::Probe { .. }
            | Self::HandlerPanicked { .. }
            | Self::ProcessingFailed { .. } => "processing",
            Self::InvalidRecipient { .. }
            | Self::EmptyMessage { .. }
            | Self::HostUnavailable
            | Self::DispatchFailed { .. } => "routing",
            Self::Codec { .. } | Self::Transport { .. } => "transport",
            Self::Property { .. } => "property",
            Self::Timeout { .. } => "timeout",
            Self::Configuration(_) => "configuration",
            Self::Internal { .. } => "internal",
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::codec(err.to_string())
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
