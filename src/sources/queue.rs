//! # Queue Polling
//!
//! A polling source whose probe dequeues from a queue through a [`QueueAdapter`].
//! An empty queue is not an error: adapters return the empty container and the
//! source simply publishes nothing for that cycle.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use super::polling::{MessageProbe, PollingMessageSource};
use crate::cancellation::CancellationToken;
use crate::config::PollingConfig;
use crate::error::Result;
use crate::messaging::MessageContainer;

/// Dequeues the next message from some queue
#[async_trait]
pub trait QueueAdapter<T>: Send + Sync + 'static
where
    T: Send + Sync + 'static,
{
    /// Next message, or the empty container when the queue has nothing to offer
    async fn dequeue(&self, cancellation: &CancellationToken) -> Result<MessageContainer<T>>;
}

#[async_trait]
impl<T, A> QueueAdapter<T> for Arc<A>
where
    T: Send + Sync + 'static,
    A: QueueAdapter<T> + ?Sized,
{
    async fn dequeue(&self, cancellation: &CancellationToken) -> Result<MessageContainer<T>> {
        (**self).dequeue(cancellation).await
    }
}

/// Probe that polls a queue adapter
#[derive(Debug)]
pub struct QueueProbe<A> {
    adapter: A,
}

impl<A> QueueProbe<A> {
    pub fn new(adapter: A) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }
}

#[async_trait]
impl<T, A> MessageProbe<T> for QueueProbe<A>
where
    T: Send + Sync + 'static,
    A: QueueAdapter<T>,
{
    async fn get_next_message(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<MessageContainer<T>> {
        self.adapter.dequeue(cancellation).await
    }
}

/// Polling source reading from a queue adapter
pub type QueuePollingMessageSource<T, A> = PollingMessageSource<T, QueueProbe<A>>;

impl<T, A> PollingMessageSource<T, QueueProbe<A>>
where
    T: Send + Sync + 'static,
    A: QueueAdapter<T>,
{
    /// Create a source that dequeues from `adapter` once per `interval`
    pub fn with_queue(name: impl Into<String>, adapter: A, interval: Duration) -> Result<Self> {
        Self::new(name, QueueProbe::new(adapter), interval)
    }

    pub fn with_queue_config(
        name: impl Into<String>,
        adapter: A,
        config: &PollingConfig,
    ) -> Result<Self> {
        Self::from_config(name, QueueProbe::new(adapter), config)
    }

    pub fn adapter(&self) -> &A {
        self.probe().adapter()
    }
}

/// In-process FIFO queue adapter
#[derive(Debug)]
pub struct InMemoryQueueAdapter<T> {
    queue: Mutex<VecDeque<MessageContainer<T>>>,
}

impl<T> InMemoryQueueAdapter<T> {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn enqueue(&self, message: T) {
        self.enqueue_container(MessageContainer::new(message));
    }

    /// Enqueue a container; empty containers are dropped
    pub fn enqueue_container(&self, container: MessageContainer<T>) {
        if !container.is_empty() {
            self.queue.lock().push_back(container);
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl<T> Default for InMemoryQueueAdapter<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> QueueAdapter<T> for InMemoryQueueAdapter<T>
where
    T: Send + Sync + 'static,
{
    async fn dequeue(&self, _cancellation: &CancellationToken) -> Result<MessageContainer<T>> {
        Ok(self.queue.lock().pop_front().unwrap_or_default())
    }
}
