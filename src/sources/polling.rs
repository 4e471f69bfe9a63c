//! # Polling Message Source
//!
//! Periodically asks a [`MessageProbe`] for the next message and publishes every
//! non-empty result. The first probe runs as soon as the source starts; later
//! probes run once per interval. Each probe runs in its own task, so a slow probe
//! never holds up the interval timer, and a stop waits for every probe it started.

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::lifecycle::{PollingState, SourceLifecycle, Transition};
use super::{DrainHandle, MessageSource};
use crate::cancellation::CancellationToken;
use crate::config::{ConfigurationError, PollingConfig};
use crate::constants::channels;
use crate::error::{PipelineError, Result, SharedError};
use crate::events::channel::panic_message;
use crate::events::NotificationChannel;
use crate::logging::log_source_operation;
use crate::messaging::MessageContainer;

/// Produces the next available message, or the empty container when none is ready
#[async_trait]
pub trait MessageProbe<T>: Send + Sync + 'static
where
    T: Send + Sync + 'static,
{
    async fn get_next_message(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<MessageContainer<T>>;

    /// Called once when the owning source starts; a failure aborts the start
    fn on_start(&self) -> Result<()> {
        Ok(())
    }

    /// Called once when the owning source stops; a failure aborts the stop
    fn on_stop(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<T, P> MessageProbe<T> for Arc<P>
where
    T: Send + Sync + 'static,
    P: MessageProbe<T> + ?Sized,
{
    async fn get_next_message(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<MessageContainer<T>> {
        (**self).get_next_message(cancellation).await
    }

    fn on_start(&self) -> Result<()> {
        (**self).on_start()
    }

    fn on_stop(&self) -> Result<()> {
        (**self).on_stop()
    }
}

/// Message source driven by a probe on a fixed interval
pub struct PollingMessageSource<T, P> {
    inner: Arc<PollingInner<T, P>>,
}

struct PollingInner<T, P> {
    name: String,
    probe: P,
    interval: Duration,
    lifecycle: Arc<SourceLifecycle>,
    message_received: Arc<NotificationChannel<MessageContainer<T>>>,
    errors: Arc<NotificationChannel<SharedError>>,
}

impl<T, P> PollingMessageSource<T, P>
where
    T: Send + Sync + 'static,
    P: MessageProbe<T>,
{
    /// Create a polling source. The interval must be positive.
    pub fn new(name: impl Into<String>, probe: P, interval: Duration) -> Result<Self> {
        let name = name.into();
        if interval.is_zero() {
            return Err(ConfigurationError::invalid_value(
                "polling.interval_ms",
                "0",
                "polling interval must be positive",
            )
            .into());
        }

        let errors = Arc::new(NotificationChannel::new(format!("{name}.{}", channels::ERROR)));
        let message_received = Arc::new(NotificationChannel::with_fault_sink(
            format!("{name}.{}", channels::MESSAGE_RECEIVED),
            errors.clone(),
        ));

        Ok(Self {
            inner: Arc::new(PollingInner {
                lifecycle: Arc::new(SourceLifecycle::new(name.clone())),
                name,
                probe,
                interval,
                message_received,
                errors,
            }),
        })
    }

    /// Create a polling source using the configured interval
    pub fn from_config(name: impl Into<String>, probe: P, config: &PollingConfig) -> Result<Self> {
        config.validate()?;
        Self::new(name, probe, config.interval())
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn probe(&self) -> &P {
        &self.inner.probe
    }

    /// Number of probe cycles currently running
    pub fn active_polls(&self) -> usize {
        self.inner.lifecycle.active_cycles()
    }
}

impl<T, P> PollingInner<T, P>
where
    T: Send + Sync + 'static,
    P: MessageProbe<T>,
{
    fn spawn_poll(self: &Arc<Self>, cancellation: &CancellationToken) {
        let inner = Arc::clone(self);
        let cancellation = cancellation.clone();
        let cycle = tokio::spawn(async move { inner.poll_once(cancellation).await });
        self.lifecycle.track_cycle(cycle);
    }

    async fn poll_once(&self, cancellation: CancellationToken) {
        let outcome = AssertUnwindSafe(self.probe.get_next_message(&cancellation))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(container)) if container.is_empty() => {
                debug!(source = %self.name, "Probe returned no message");
            }
            Ok(Ok(container)) => {
                self.message_received.publish(container);
            }
            Ok(Err(error)) => {
                debug!(source = %self.name, error = %error, "Probe failed");
                self.errors.publish_error(error);
            }
            Err(panic) => {
                self.errors.publish_error(PipelineError::probe(
                    &self.name,
                    format!("probe panicked: {}", panic_message(&panic)),
                ));
            }
        }
    }

    async fn run(
        self: Arc<Self>,
        cancellation: CancellationToken,
        stop_signal: CancellationToken,
    ) {
        info!(
            source = %self.name,
            interval_ms = self.interval.as_millis() as u64,
            "Polling loop started"
        );

        while self.lifecycle.is_running() && !cancellation.is_cancelled() {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = stop_signal.cancelled() => break,
                _ = cancellation.cancelled() => {
                    debug!(source = %self.name, "Polling cancelled");
                    break;
                }
            }

            if !self.lifecycle.is_running() || cancellation.is_cancelled() {
                break;
            }
            self.spawn_poll(&cancellation);
        }

        info!(source = %self.name, "Polling loop ended");
    }
}

#[async_trait]
impl<T, P> MessageSource<T> for PollingMessageSource<T, P>
where
    T: Send + Sync + 'static,
    P: MessageProbe<T>,
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
        let transition = self.inner.lifecycle.start(
            || inner.probe.on_start(),
            |stop_signal| {
                inner.spawn_poll(&cancellation);
                tokio::spawn(Arc::clone(&inner).run(cancellation.clone(), stop_signal))
            },
        )?;

        if transition == Transition::Applied {
            let details = format!("interval_ms={}", self.inner.interval.as_millis());
            log_source_operation("start_receiving", &self.inner.name, "started", Some(&details));
        }
        Ok(())
    }

    async fn stop_receiving(&self, _cancellation: CancellationToken) -> Result<DrainHandle> {
        let deliveries = Arc::clone(&self.inner.message_received);
        let (transition, drain) = self.inner.lifecycle.stop(
            || self.inner.probe.on_stop(),
            async move { deliveries.drain().await }.boxed(),
        )?;

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

impl<T, P> std::fmt::Debug for PollingMessageSource<T, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingMessageSource")
            .field("name", &self.inner.name)
            .field("interval", &self.inner.interval)
            .field("lifecycle", &self.inner.lifecycle)
            .finish()
    }
}
