//! # Push Message Source
//!
//! Accepts raw payloads pushed by a transport through a bounded ingress channel,
//! decodes them with a [`MessageCodec`], stamps the received-at time and payload
//! size as properties, and publishes the result. Payloads that fail to decode are
//! reported on the error channel.
//!
//! Payloads pushed before the source starts are buffered. When the source stops it
//! closes the ingress channel and publishes everything already buffered, so every
//! accepted payload is published exactly once.

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::lifecycle::{PollingState, SourceLifecycle, Transition};
use super::{DrainHandle, MessageSource};
use crate::cancellation::CancellationToken;
use crate::config::PushSourceConfig;
use crate::constants::{channels, properties};
use crate::error::{PipelineError, Result, SharedError};
use crate::events::NotificationChannel;
use crate::logging::log_source_operation;
use crate::messaging::{MessageCodec, MessageContainer, MessageProperties};

/// Transport-facing handle used to push payloads into a [`PushMessageSource`]
#[derive(Debug, Clone)]
pub struct PayloadSender {
    source: Arc<str>,
    sender: mpsc::Sender<Vec<u8>>,
}

impl PayloadSender {
    /// Push a payload, waiting for buffer space
    pub async fn send(&self, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.sender
            .send(payload.into())
            .await
            .map_err(|_| PipelineError::transport(format!("source '{}' is no longer accepting payloads", self.source)))
    }

    /// Push a payload without waiting; fails if the buffer is full
    pub fn try_send(&self, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.sender.try_send(payload.into()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                PipelineError::transport(format!("source '{}' ingress buffer is full", self.source))
            }
            mpsc::error::TrySendError::Closed(_) => PipelineError::transport(format!(
                "source '{}' is no longer accepting payloads",
                self.source
            )),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Message source fed by pushed payloads
pub struct PushMessageSource<T, C> {
    inner: Arc<PushInner<T, C>>,
}

struct PushInner<T, C> {
    name: String,
    codec: C,
    lifecycle: Arc<SourceLifecycle>,
    sender: PayloadSender,
    receiver: Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
    message_received: Arc<NotificationChannel<MessageContainer<T>>>,
    errors: Arc<NotificationChannel<SharedError>>,
}

impl<T, C> PushMessageSource<T, C>
where
    T: Send + Sync + 'static,
    C: MessageCodec<T>,
{
    pub fn new(name: impl Into<String>, codec: C, config: &PushSourceConfig) -> Result<Self> {
        config.validate()?;
        let name = name.into();
        let (sender, receiver) = mpsc::channel(config.buffer_size);

        let errors = Arc::new(NotificationChannel::new(format!("{name}.{}", channels::ERROR)));
        let message_received = Arc::new(NotificationChannel::with_fault_sink(
            format!("{name}.{}", channels::MESSAGE_RECEIVED),
            errors.clone(),
        ));

        Ok(Self {
            inner: Arc::new(PushInner {
                lifecycle: Arc::new(SourceLifecycle::new(name.clone())),
                sender: PayloadSender {
                    source: Arc::from(name.as_str()),
                    sender,
                },
                receiver: Mutex::new(Some(receiver)),
                name,
                codec,
                message_received,
                errors,
            }),
        })
    }

    /// Handle for the transport to push payloads with
    pub fn sender(&self) -> PayloadSender {
        self.inner.sender.clone()
    }

    pub fn codec(&self) -> &C {
        &self.inner.codec
    }
}

impl<T, C> PushInner<T, C>
where
    T: Send + Sync + 'static,
    C: MessageCodec<T>,
{
    async fn pump(
        self: Arc<Self>,
        mut receiver: mpsc::Receiver<Vec<u8>>,
        cancellation: CancellationToken,
        stop_signal: CancellationToken,
    ) {
        info!(source = %self.name, "Push ingress opened");

        loop {
            tokio::select! {
                payload = receiver.recv() => match payload {
                    Some(payload) => self.accept(payload).await,
                    None => break,
                },
                _ = stop_signal.cancelled() => break,
                _ = cancellation.cancelled() => break,
            }
        }

        receiver.close();
        let mut flushed = 0_usize;
        while let Some(payload) = receiver.recv().await {
            self.accept(payload).await;
            flushed += 1;
        }

        info!(source = %self.name, flushed, "Push ingress closed");
    }

    async fn accept(&self, payload: Vec<u8>) {
        let decoded = self.codec.deserialize_async(&payload).await;
        let container = decoded.and_then(|message| {
            let mut stamped = MessageProperties::new();
            stamped
                .add(properties::RECEIVED_AT, Utc::now())?
                .add(properties::CONTENT_LENGTH, payload.len() as u64)?;
            Ok(MessageContainer::with_properties(message, stamped))
        });

        match container {
            Ok(container) => {
                self.message_received.publish(container);
            }
            Err(error) => {
                debug!(source = %self.name, bytes = payload.len(), error = %error, "Rejected payload");
                self.errors.publish_error(PipelineError::codec(format!(
                    "source '{}' could not decode {} payload: {error}",
                    self.name,
                    self.codec.format()
                )));
            }
        }
    }
}

#[async_trait]
impl<T, C> MessageSource<T> for PushMessageSource<T, C>
where
    T: Send + Sync + 'static,
    C: MessageCodec<T>,
{
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn state(&self) -> PollingState {
        self.inner.lifecycle.state()
    }

    fn message_received(&self) -> &NotificationChannel<MessageContainer<T>> {
        &self.inner.message_received
    }

    fn errors(&self) -> &NotificationChannel<SharedError> {
        &self.inner.errors
    }

    async fn start_receiving(&self, cancellation: CancellationToken) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        let receiver = self.inner.receiver.lock().take();
        let Some(receiver) = receiver else {
            // Only reachable after a start has already consumed the ingress
            debug!(source = %self.inner.name, state = %self.state(), "Start ignored");
            return Ok(());
        };

        let transition = self.inner.lifecycle.start(
            || Ok(()),
            move |stop_signal| tokio::spawn(inner.pump(receiver, cancellation, stop_signal)),
        )?;

        match transition {
            Transition::Applied => {
                log_source_operation("start_receiving", &self.inner.name, "started", None);
            }
            Transition::Ignored(state) => {
                error!(source = %self.inner.name, state = %state, "Ingress taken while not unstarted");
            }
        }
        Ok(())
    }

    async fn stop_receiving(&self, _cancellation: CancellationToken) -> Result<DrainHandle> {
        let deliveries = Arc::clone(&self.inner.message_received);
        let (transition, drain) = self
            .inner
            .lifecycle
            .stop(|| Ok(()), async move { deliveries.drain().await }.boxed())?;

        if transition == Transition::Applied {
            log_source_operation("stop_receiving", &self.inner.name, "stopping", None);
        }
        Ok(drain)
    }

    async fn receive(
        &self,
        container: MessageContainer<T>,
        _cancellation: CancellationToken,
    ) -> Result<()> {
        if container.is_empty() {
            debug!(source = %self.inner.name, "Ignoring empty container");
            return Ok(());
        }
        self.inner.message_received.try_publish(container)?;
        Ok(())
    }
}

impl<T, C> std::fmt::Debug for PushMessageSource<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushMessageSource")
            .field("name", &self.inner.name)
            .field("lifecycle", &self.inner.lifecycle)
            .finish()
    }
}
