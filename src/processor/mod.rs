//! # Message Processor
//!
//! A consumer bound to exactly one [`MessageSource`]. The processor subscribes to
//! the source's channels when it is constructed and keeps those subscriptions for
//! its whole lifetime. Each non-empty message is handed to the
//! [`MessageHandler`]; handler failures are republished on the processor's own
//! error channel, together with every error the bound source reports.
//!
//! A handler that exposes a [`ForwarderSlot`] receives a [`MessageForwarder`] from
//! the host at start time and can use it to hand messages to other processors.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::cancellation::CancellationToken;
use crate::constants::channels;
use crate::error::{PipelineError, Result, SharedError};
use crate::events::NotificationChannel;
use crate::host::MessageForwarder;
use crate::logging::{log_error, log_processor_operation};
use crate::messaging::MessageContainer;
use crate::sources::{DrainHandle, MessageSource};

/// Application logic of a processor
#[async_trait]
pub trait MessageHandler<T>: Send + Sync + 'static
where
    T: Send + Sync + 'static,
{
    /// Name the host routes forwarded messages by
    fn name(&self) -> &str;

    /// Process one non-empty message
    async fn process_message(
        &self,
        container: MessageContainer<T>,
        cancellation: CancellationToken,
    ) -> Result<()>;

    /// Runs before the bound source starts; a failure keeps the source unstarted
    async fn on_start(&self) -> Result<()> {
        Ok(())
    }

    /// Runs before the bound source stops; a failure keeps the source running
    async fn on_stop(&self) -> Result<()> {
        Ok(())
    }

    /// Handlers that forward messages return the slot the host injects into
    fn forwarding(&self) -> Option<&ForwarderSlot> {
        None
    }
}

/// Holds the forwarder injected by the host
#[derive(Debug, Default)]
pub struct ForwarderSlot {
    forwarder: RwLock<Option<MessageForwarder>>,
}

impl ForwarderSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&self, forwarder: MessageForwarder) {
        *self.forwarder.write() = Some(forwarder);
    }

    pub fn get(&self) -> Option<MessageForwarder> {
        self.forwarder.read().clone()
    }

    pub fn is_injected(&self) -> bool {
        self.forwarder.read().is_some()
    }

    /// Forward through the injected forwarder.
    ///
    /// Fails with `HostUnavailable` when no host has injected one yet.
    pub async fn forward<T>(
        &self,
        recipient: &str,
        container: MessageContainer<T>,
        cancellation: CancellationToken,
    ) -> Result<()>
    where
        T: Send + Sync + 'static,
    {
        let forwarder = self.get().ok_or(PipelineError::HostUnavailable)?;
        forwarder.forward(recipient, container, cancellation).await
    }
}

/// Consumer bound to one message source
pub struct MessageProcessor<T>
where
    T: Send + Sync + 'static,
{
    name: String,
    source: Arc<dyn MessageSource<T>>,
    handler: Arc<dyn MessageHandler<T>>,
    errors: Arc<NotificationChannel<SharedError>>,
    cancellation: Arc<RwLock<CancellationToken>>,
}

impl<T> MessageProcessor<T>
where
    T: Send + Sync + 'static,
{
    /// Bind `handler` to `source` and subscribe to the source's channels
    pub fn new<S, H>(source: Arc<S>, handler: Arc<H>) -> Result<Arc<Self>>
    where
        S: MessageSource<T> + 'static,
        H: MessageHandler<T>,
    {
        let name = handler.name().trim().to_string();
        if name.is_empty() {
            return Err(PipelineError::invalid_processor(format!(
                "processor bound to source '{}' has a blank name",
                source.name()
            )));
        }

        let source: Arc<dyn MessageSource<T>> = source;
        let handler: Arc<dyn MessageHandler<T>> = handler;
        let errors = Arc::new(NotificationChannel::new(format!("{name}.{}", channels::ERROR)));
        let cancellation = Arc::new(RwLock::new(CancellationToken::new()));

        {
            let name = name.clone();
            let handler = handler.clone();
            let errors = errors.clone();
            let cancellation = cancellation.clone();
            source.message_received().subscribe(move |container: MessageContainer<T>| {
                let name = name.clone();
                let handler = handler.clone();
                let errors = errors.clone();
                let cancellation = cancellation.read().clone();
                async move {
                    if container.is_empty() {
                        return Ok(());
                    }
                    if let Err(error) = handler.process_message(container, cancellation).await {
                        log_error("processor", "process_message", &error, Some(&name));
                        errors.publish_error(PipelineError::processing_failed(name, Arc::new(error)));
                    }
                    Ok(())
                }
            });
        }

        {
            let errors = errors.clone();
            source.errors().subscribe(move |error: SharedError| {
                let errors = errors.clone();
                async move {
                    if errors.subscriber_count() > 0 {
                        errors.publish(error);
                    } else {
                        debug!(channel = %errors.name(), error = %error, "Source error not observed");
                    }
                    Ok(())
                }
            });
        }

        log_processor_operation("bind", &name, "bound", Some(source.name()));

        Ok(Arc::new(Self {
            name,
            source,
            handler,
            errors,
            cancellation,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Arc<dyn MessageSource<T>> {
        &self.source
    }

    /// Error channel carrying processing failures and the bound source's errors
    pub fn errors(&self) -> &NotificationChannel<SharedError> {
        &self.errors
    }

    pub fn supports_forwarding(&self) -> bool {
        self.handler.forwarding().is_some()
    }

    /// Inject the host's forwarder; returns false when the handler does not forward
    pub fn inject_forwarder(&self, forwarder: MessageForwarder) -> bool {
        match self.handler.forwarding() {
            Some(slot) => {
                slot.inject(forwarder);
                true
            }
            None => false,
        }
    }

    /// Run the start hook, then start the bound source without waiting for delivery
    #[instrument(skip_all, fields(processor = %self.name))]
    pub async fn start(&self, cancellation: CancellationToken) -> Result<()> {
        if let Err(error) = self.handler.on_start().await {
            let error = PipelineError::lifecycle_hook(&self.name, "start", error);
            log_error("processor", "start", &error, Some(&self.name));
            return Err(error);
        }

        *self.cancellation.write() = cancellation.clone();
        self.source.start_receiving(cancellation).await?;
        log_processor_operation("start", &self.name, "started", Some(self.source.name()));
        Ok(())
    }

    /// Run the stop hook, then stop the bound source.
    ///
    /// The returned handle resolves once the last delivered message has been
    /// processed.
    #[instrument(skip_all, fields(processor = %self.name))]
    pub async fn stop(&self, cancellation: CancellationToken) -> Result<DrainHandle> {
        if let Err(error) = self.handler.on_stop().await {
            let error = PipelineError::lifecycle_hook(&self.name, "stop", error);
            log_error("processor", "stop", &error, Some(&self.name));
            return Err(error);
        }

        let drain = self.source.stop_receiving(cancellation).await?;
        log_processor_operation("stop", &self.name, "stopping", Some(self.source.name()));
        Ok(drain)
    }

    /// Inject a message through the bound source
    pub async fn receive_message(
        &self,
        container: MessageContainer<T>,
        cancellation: CancellationToken,
    ) -> Result<()> {
        self.source.receive(container, cancellation).await
    }
}

impl<T> std::fmt::Debug for MessageProcessor<T>
where
    T: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageProcessor")
            .field("name", &self.name)
            .field("source", &self.source.name())
            .field("supports_forwarding", &self.supports_forwarding())
            .finish()
    }
}
