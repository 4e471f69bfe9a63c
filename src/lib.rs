#![allow(clippy::doc_markdown)] // Allow technical terms like JSON, YAML in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Pipeline Core
//!
//! Lightweight in-process message pipeline: message sources feed message
//! processors, and processors forward messages to each other by name through a
//! host.
//!
//! ## Architecture
//!
//! - **Sources** originate messages and publish them on a "message received"
//!   channel. A polling source drives a probe on a fixed interval through a
//!   monotonic `Unstarted -> Started -> Stopped` state machine; a push source
//!   decodes payloads handed over by a transport.
//! - **Processors** bind to exactly one source, process every non-empty message
//!   and republish failures on their own error channel.
//! - **The host** is a write-once dispatch table of start, stop and forward routes.
//!   Processors that forward receive a forwarder bound to the host when it starts.
//!
//! Publishing is fire-and-forget: a slow processor never delays its source.
//! Stopping returns a drain handle that resolves once the last in-flight message
//! has been processed.
//!
//! ## Module Organization
//!
//! - [`messaging`] - Message containers, typed properties and body codecs
//! - [`events`] - Multi-subscriber notification channels
//! - [`sources`] - Polling, queue and push message sources
//! - [`processor`] - Message processors and the forwarding capability
//! - [`host`] - Name-based routing between processors
//! - [`config`] - Layered configuration
//! - [`logging`] - Structured logging
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use pipeline_core::{
//!     CancellationToken, InMemoryQueueAdapter, MessageContainer, MessageHandler,
//!     MessageProcessor, QueuePollingMessageSource, Result,
//! };
//!
//! struct Printer;
//!
//! #[async_trait]
//! impl MessageHandler<String> for Printer {
//!     fn name(&self) -> &str {
//!         "printer"
//!     }
//!
//!     async fn process_message(
//!         &self,
//!         container: MessageContainer<String>,
//!         _cancellation: CancellationToken,
//!     ) -> Result<()> {
//!         println!("{:?}", container.message());
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let queue = Arc::new(InMemoryQueueAdapter::<String>::new());
//! let source = Arc::new(QueuePollingMessageSource::<String, _>::with_queue(
//!     "inbox",
//!     queue.clone(),
//!     Duration::from_millis(100),
//! )?);
//! let processor = MessageProcessor::new(source, Arc::new(Printer))?;
//!
//! processor.start(CancellationToken::new()).await?;
//! queue.enqueue("hello".to_string());
//! processor.stop(CancellationToken::new()).await?.await;
//! # Ok(())
//! # }
//! ```

pub mod cancellation;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod host;
pub mod logging;
pub mod messaging;
pub mod processor;
pub mod sources;

pub use cancellation::CancellationToken;
pub use config::{
    ConfigManager, DuplicateNamePolicy, HostConfig, LoggingConfig, PipelineConfig,
    PollingConfig, PushSourceConfig,
};
pub use error::{PipelineError, Result, SharedError};
pub use events::{NotificationChannel, SubscriptionId};
pub use host::{MessageForwarder, MessageProcessorHost, MessageProcessorHostBuilder, RouteKind};
pub use messaging::{
    JsonCodec, MessageCodec, MessageContainer, MessageProperties, PropertyKind, PropertyType,
    PropertyValue,
};
pub use processor::{ForwarderSlot, MessageHandler, MessageProcessor};
pub use sources::{
    DrainHandle, InMemoryQueueAdapter, MessageProbe, MessageSource, PayloadSender,
    PollingMessageSource, PollingState, PushMessageSource, QueueAdapter,
    QueuePollingMessageSource,
};
