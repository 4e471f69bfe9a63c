//! # Host Builder
//!
//! Assembles the host's dispatch table from a fixed set of processors. Each
//! processor contributes one start route, one stop route and one forward route for
//! its message type.

use futures::FutureExt;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use super::dispatch::{ControlMessage, DispatchTable, RouteHandler, RouteKind};
use super::{DeliveryDrain, HostCore, MessageProcessorHost};
use crate::cancellation::CancellationToken;
use crate::config::{DuplicateNamePolicy, HostConfig};
use crate::error::{PipelineError, Result};
use crate::processor::MessageProcessor;
use crate::sources::MessageSource;

/// Builder for [`MessageProcessorHost`]
#[derive(Default)]
pub struct MessageProcessorHostBuilder {
    config: HostConfig,
    table: DispatchTable,
    names: Vec<String>,
    drains: Vec<DeliveryDrain>,
}

impl std::fmt::Debug for MessageProcessorHostBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageProcessorHostBuilder")
            .field("config", &self.config)
            .field("table", &self.table)
            .field("names", &self.names)
            .finish()
    }
}

impl MessageProcessorHostBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a processor's start, stop and forward routes
    pub fn add_processor<T>(mut self, processor: Arc<MessageProcessor<T>>) -> Self
    where
        T: Send + Sync + 'static,
    {
        let name = processor.name().to_string();
        self.table.register(RouteKind::Start, &name, start_route(processor.clone()));
        self.table.register(RouteKind::Stop, &name, stop_route(processor.clone()));
        self.table
            .register(RouteKind::forward::<T>(), &name, forward_route(processor.clone()));
        self.drains.push(delivery_drain(processor));
        self.names.push(name);
        self
    }

    /// Freeze the routing table into a host
    pub fn build(self) -> Result<MessageProcessorHost> {
        self.config.validate()?;

        let mut seen = HashSet::new();
        for name in &self.names {
            if seen.insert(name.as_str()) {
                continue;
            }
            match self.config.duplicate_names {
                DuplicateNamePolicy::Reject => {
                    return Err(PipelineError::duplicate_processor_name(name));
                }
                DuplicateNamePolicy::DeliverToAll => {
                    warn!(
                        processor = %name,
                        "Duplicate processor name: forwarded messages are delivered to every match"
                    );
                }
            }
        }

        info!(
            processors = self.names.len(),
            duplicate_names = ?self.config.duplicate_names,
            "🏗️ HOST: Dispatch table built"
        );

        Ok(MessageProcessorHost {
            core: Arc::new(HostCore {
                table: self.table,
                names: self.names,
                config: self.config,
                drains: self.drains,
            }),
        })
    }
}

fn start_route<T>(processor: Arc<MessageProcessor<T>>) -> RouteHandler
where
    T: Send + Sync + 'static,
{
    Arc::new(move |message: ControlMessage, cancellation: CancellationToken| {
        on_start(processor.clone(), message, cancellation).boxed()
    })
}

fn stop_route<T>(processor: Arc<MessageProcessor<T>>) -> RouteHandler
where
    T: Send + Sync + 'static,
{
    Arc::new(move |message: ControlMessage, cancellation: CancellationToken| {
        on_stop(processor.clone(), message, cancellation).boxed()
    })
}

fn forward_route<T>(processor: Arc<MessageProcessor<T>>) -> RouteHandler
where
    T: Send + Sync + 'static,
{
    Arc::new(move |message: ControlMessage, cancellation: CancellationToken| {
        on_forward(processor.clone(), message, cancellation).boxed()
    })
}

fn delivery_drain<T>(processor: Arc<MessageProcessor<T>>) -> DeliveryDrain
where
    T: Send + Sync + 'static,
{
    Arc::new(move || {
        let processor = processor.clone();
        async move {
            let channel = processor.source().message_received();
            let pending = channel.in_flight();
            channel.drain().await;
            pending
        }
        .boxed()
    })
}

async fn on_start<T>(
    processor: Arc<MessageProcessor<T>>,
    message: ControlMessage,
    cancellation: CancellationToken,
) -> Result<bool>
where
    T: Send + Sync + 'static,
{
    let ControlMessage::Start(forwarder) = message else {
        return Ok(false);
    };
    processor.inject_forwarder(forwarder);
    processor.start(cancellation).await?;
    Ok(true)
}

/// Stop the processor and wait for its drain
async fn on_stop<T>(
    processor: Arc<MessageProcessor<T>>,
    message: ControlMessage,
    cancellation: CancellationToken,
) -> Result<bool>
where
    T: Send + Sync + 'static,
{
    if !matches!(message, ControlMessage::Stop) {
        return Ok(false);
    }
    processor.stop(cancellation).await?.await;
    Ok(true)
}

/// Deliver the envelope if it is addressed to this processor
async fn on_forward<T>(
    processor: Arc<MessageProcessor<T>>,
    message: ControlMessage,
    cancellation: CancellationToken,
) -> Result<bool>
where
    T: Send + Sync + 'static,
{
    let ControlMessage::Forward(envelope) = message else {
        return Ok(false);
    };
    if envelope.recipient() != processor.name() {
        return Ok(false);
    }
    let Some(container) = envelope.container::<T>() else {
        return Ok(false);
    };
    processor.receive_message(container, cancellation).await?;
    Ok(true)
}
