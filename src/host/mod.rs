//! # Message Processor Host
//!
//! Name-keyed router over a fixed set of processors. The host holds no processors
//! directly: each processor contributes start, stop and forward routes to a
//! dispatch table, and every host operation is one dispatch through that table.
//!
//! Forwarding is synchronous with respect to the dispatch: by the time
//! [`MessageProcessorHost::forward_message`] returns, the recipient's source has
//! accepted the message.

pub mod builder;
pub mod dispatch;

use futures::future::{join_all, BoxFuture};
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument};

use crate::cancellation::CancellationToken;
use crate::config::HostConfig;
use crate::constants::routes;
use crate::error::{PipelineError, Result};
use crate::logging::{log_error, log_routing_operation};
use crate::messaging::MessageContainer;

pub use builder::MessageProcessorHostBuilder;
pub use dispatch::{ControlMessage, DispatchTable, ForwardEnvelope, RouteHandler, RouteKind};

/// Waits out one processor's in-flight deliveries, returning how many were pending
pub(crate) type DeliveryDrain = Arc<dyn Fn() -> BoxFuture<'static, usize> + Send + Sync>;

pub(crate) struct HostCore {
    table: DispatchTable,
    names: Vec<String>,
    config: HostConfig,
    drains: Vec<DeliveryDrain>,
}

impl HostCore {
    /// Re-drain every processor until a full pass finds nothing in flight.
    ///
    /// A handler still running when its processor stopped can forward to a
    /// processor whose own drain already completed.
    async fn drain_forwarded(&self) {
        let mut passes = 0usize;
        loop {
            let pending: usize = join_all(self.drains.iter().map(|drain| drain()))
                .await
                .into_iter()
                .sum();
            if pending == 0 {
                break;
            }
            passes += 1;
            debug!(pending, passes, "Drained deliveries forwarded during shutdown");
        }
    }

    async fn forward<T>(
        &self,
        recipient: &str,
        container: MessageContainer<T>,
        cancellation: CancellationToken,
    ) -> Result<()>
    where
        T: Send + Sync + 'static,
    {
        if recipient.trim().is_empty() {
            return Err(PipelineError::invalid_recipient(
                "recipient processor name must not be blank",
            ));
        }
        if container.is_empty() {
            return Err(PipelineError::empty_message(routes::FORWARD));
        }

        let envelope = ForwardEnvelope::new(recipient, container);
        let matched = self
            .table
            .dispatch(
                RouteKind::forward::<T>(),
                ControlMessage::Forward(envelope),
                cancellation,
            )
            .await?;

        if matched == 0 {
            debug!(
                recipient = %recipient,
                message_type = std::any::type_name::<T>(),
                "No processor matched forward recipient"
            );
            log_routing_operation(routes::FORWARD, Some(recipient), 0, "unmatched");
        } else {
            log_routing_operation(routes::FORWARD, Some(recipient), matched, "delivered");
        }
        Ok(())
    }
}

/// Router that lets a fixed set of processors forward messages to each other by name
#[derive(Clone)]
pub struct MessageProcessorHost {
    core: Arc<HostCore>,
}

impl MessageProcessorHost {
    pub fn builder() -> MessageProcessorHostBuilder {
        MessageProcessorHostBuilder::new()
    }

    /// Start every processor, injecting a forwarder into those that forward.
    ///
    /// Returns once every start route has returned; sources begin receiving in
    /// the background.
    #[instrument(skip_all, fields(processors = self.core.names.len()))]
    pub async fn start(&self, cancellation: CancellationToken) -> Result<()> {
        let forwarder = MessageForwarder {
            host: Arc::downgrade(&self.core),
        };
        let started = self
            .core
            .table
            .dispatch(RouteKind::Start, ControlMessage::Start(forwarder), cancellation)
            .await
            .inspect_err(|error| log_error("host", "start", error, None))?;

        info!(started, "🚀 HOST: Processors started");
        Ok(())
    }

    /// Stop every processor and wait until all of them have drained.
    ///
    /// With a configured shutdown timeout, fails with `Timeout` when the drains
    /// take longer.
    #[instrument(skip_all, fields(processors = self.core.names.len()))]
    pub async fn stop(&self, cancellation: CancellationToken) -> Result<()> {
        let dispatch = async {
            let stopped = self
                .core
                .table
                .dispatch(RouteKind::Stop, ControlMessage::Stop, cancellation)
                .await?;
            self.core.drain_forwarded().await;
            Ok(stopped)
        };

        let outcome = match self.core.config.shutdown_timeout() {
            Some(timeout) => tokio::time::timeout(timeout, dispatch)
                .await
                .unwrap_or_else(|_| {
                    Err(PipelineError::timeout("host stop", timeout.as_millis() as u64))
                }),
            None => dispatch.await,
        };

        let stopped = outcome.inspect_err(|error| log_error("host", "stop", error, None))?;
        info!(stopped, "🛑 HOST: Processors stopped and drained");
        Ok(())
    }

    /// Forward `container` to the processor named `recipient`.
    ///
    /// Fails before dispatch when the name is blank or the container is empty. A
    /// name no processor is registered under is not an error.
    pub async fn forward_message<T>(
        &self,
        recipient: &str,
        container: MessageContainer<T>,
        cancellation: CancellationToken,
    ) -> Result<()>
    where
        T: Send + Sync + 'static,
    {
        self.core.forward(recipient, container, cancellation).await
    }

    /// Processor names in registration order
    pub fn processor_names(&self) -> &[String] {
        &self.core.names
    }

    pub fn route_count(&self, kind: RouteKind) -> usize {
        self.core.table.route_count(kind)
    }

    pub fn config(&self) -> &HostConfig {
        &self.core.config
    }

    /// Forwarder bound to this host
    pub fn forwarder(&self) -> MessageForwarder {
        MessageForwarder {
            host: Arc::downgrade(&self.core),
        }
    }
}

impl std::fmt::Debug for MessageProcessorHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageProcessorHost")
            .field("processors", &self.core.names)
            .field("routes", &self.core.table)
            .finish()
    }
}

/// Capability to forward messages through the host that issued it
///
/// Holds only a weak reference, so a processor keeping its forwarder does not
/// keep the host alive.
#[derive(Clone)]
pub struct MessageForwarder {
    host: Weak<HostCore>,
}

impl MessageForwarder {
    pub async fn forward<T>(
        &self,
        recipient: &str,
        container: MessageContainer<T>,
        cancellation: CancellationToken,
    ) -> Result<()>
    where
        T: Send + Sync + 'static,
    {
        let host = self.host.upgrade().ok_or(PipelineError::HostUnavailable)?;
        host.forward(recipient, container, cancellation).await
    }

    pub fn is_connected(&self) -> bool {
        self.host.strong_count() > 0
    }
}

impl std::fmt::Debug for MessageForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageForwarder")
            .field("connected", &self.is_connected())
            .finish()
    }
}
