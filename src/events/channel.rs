//! # Notification Channels
//!
//! Multi-subscriber notification channel used for the "message received" and
//! "error" notifications of sources and processors.
//!
//! Publishing never waits for subscribers: each subscriber runs in its own task,
//! spawned in registration order. A subscriber that fails or panics is reported on
//! the channel's fault sink (the owning component's error channel) instead of
//! propagating into the publisher. Deliveries are tracked so a component can
//! `drain()` its channel and know every handler it triggered has finished.

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result, SharedError};

/// Future returned by a channel subscriber
pub type HandlerFuture = BoxFuture<'static, Result<()>>;

type Handler<E> = Arc<dyn Fn(E) -> HandlerFuture + Send + Sync>;

/// Identifies one subscription on one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber<E> {
    id: SubscriptionId,
    handler: Handler<E>,
}

/// Ordered list of subscribers with fire-and-forget dispatch
pub struct NotificationChannel<E> {
    name: String,
    subscribers: RwLock<Vec<Subscriber<E>>>,
    next_id: AtomicU64,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
    fault_sink: Option<Arc<NotificationChannel<SharedError>>>,
}

impl<E> NotificationChannel<E>
where
    E: Clone + Send + 'static,
{
    /// Create a channel whose subscriber failures are only logged
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            in_flight: Mutex::new(Vec::new()),
            fault_sink: None,
        }
    }

    /// Create a channel that reports subscriber failures on `sink`
    pub fn with_fault_sink(
        name: impl Into<String>,
        sink: Arc<NotificationChannel<SharedError>>,
    ) -> Self {
        Self {
            fault_sink: Some(sink),
            ..Self::new(name)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a subscriber. Subscribers are invoked in registration order.
    pub fn subscribe<F, Fut>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handler: Handler<E> = Arc::new(move |event| handler(event).boxed());
        self.subscribers.write().push(Subscriber { id, handler });
        debug!(channel = %self.name, subscription = id.0, "Subscriber registered");
        id
    }

    /// Remove a subscriber; returns false if it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.id != id);
        before != subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Number of deliveries that have been spawned and not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Deliver `event` to every subscriber without waiting for them.
    ///
    /// Returns the number of subscribers the event was handed to. Outside of a
    /// Tokio runtime the event is dropped with a warning; use
    /// [`try_publish`](Self::try_publish) to observe that.
    pub fn publish(&self, event: E) -> usize {
        match self.try_publish(event) {
            Ok(count) => count,
            Err(error) => {
                warn!(channel = %self.name, error = %error, "Event dropped");
                0
            }
        }
    }

    /// Like [`publish`](Self::publish), but fails instead of dropping the event
    /// when subscribers exist and no Tokio runtime is available to run them.
    pub fn try_publish(&self, event: E) -> Result<usize> {
        let handlers: Vec<Handler<E>> = self
            .subscribers
            .read()
            .iter()
            .map(|subscriber| subscriber.handler.clone())
            .collect();

        if handlers.is_empty() {
            debug!(channel = %self.name, "Published with no subscribers");
            return Ok(0);
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            PipelineError::internal(format!(
                "channel '{}' cannot deliver outside of a Tokio runtime",
                self.name
            ))
        })?;

        let mut spawned = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let event = event.clone();
            let channel = self.name.clone();
            let sink = self.fault_sink.clone();

            spawned.push(runtime.spawn(async move {
                let outcome = AssertUnwindSafe(async move { handler(event).await })
                    .catch_unwind()
                    .await;

                let error = match outcome {
                    Ok(Ok(())) => return,
                    Ok(Err(error)) => error,
                    Err(panic) => PipelineError::handler_panicked(&channel, panic_message(&panic)),
                };

                match sink {
                    Some(sink) => sink.publish_error(error),
                    None => warn!(channel = %channel, error = %error, "Unobserved subscriber failure"),
                }
            }));
        }

        let count = spawned.len();
        let mut in_flight = self.in_flight.lock();
        in_flight.retain(|handle| !handle.is_finished());
        in_flight.extend(spawned);
        Ok(count)
    }

    /// Wait for every in-flight delivery, including deliveries published while waiting
    pub async fn drain(&self) {
        loop {
            let pending = std::mem::take(&mut *self.in_flight.lock());
            if pending.is_empty() {
                return;
            }

            debug!(channel = %self.name, pending = pending.len(), "Draining deliveries");
            for result in join_all(pending).await {
                if let Err(join_error) = result {
                    warn!(channel = %self.name, error = %join_error, "Delivery task did not complete");
                }
            }
        }
    }
}

impl NotificationChannel<SharedError> {
    /// Publish an error, logging it when nobody is subscribed so it is never lost silently
    pub fn publish_error(&self, error: PipelineError) {
        if self.subscriber_count() == 0 {
            warn!(
                channel = %self.name,
                category = error.category(),
                error = %error,
                "Error published with no subscribers"
            );
            return;
        }
        self.publish(Arc::new(error));
    }
}

impl<E> std::fmt::Debug for NotificationChannel<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationChannel")
            .field("name", &self.name)
            .field("subscribers", &self.subscribers.read().len())
            .field("has_fault_sink", &self.fault_sink.is_some())
            .finish()
    }
}

pub(crate) fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
