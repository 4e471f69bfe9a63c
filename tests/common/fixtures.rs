#![allow(dead_code)] // Each test binary uses a different subset of the fixtures

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pipeline_core::{
    CancellationToken, ForwarderSlot, InMemoryQueueAdapter, MessageContainer, MessageHandler,
    MessageProbe, QueuePollingMessageSource, Result,
};

/// Message type used across the integration tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestMessage {
    pub id: u32,
    pub body: String,
}

pub fn message(id: u32) -> TestMessage {
    TestMessage {
        id,
        body: format!("message-{id}"),
    }
}

pub type TestQueue = Arc<InMemoryQueueAdapter<TestMessage>>;
pub type TestQueueSource = QueuePollingMessageSource<TestMessage, TestQueue>;

/// Queue-backed polling source plus a handle on its queue
pub fn queue_source(name: &str, interval: Duration) -> (TestQueue, Arc<TestQueueSource>) {
    let queue: TestQueue = Arc::new(InMemoryQueueAdapter::new());
    let source = TestQueueSource::with_queue(name, queue.clone(), interval)
        .expect("valid polling interval");
    (queue, Arc::new(source))
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Handler that records every container it processes
pub struct RecordingHandler {
    name: String,
    delay: Option<Duration>,
    received: Mutex<Vec<MessageContainer<TestMessage>>>,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
}

impl RecordingHandler {
    pub fn new(name: &str) -> Arc<Self> {
        Self::build(name, None)
    }

    /// Handler whose processing takes `delay`
    pub fn slow(name: &str, delay: Duration) -> Arc<Self> {
        Self::build(name, Some(delay))
    }

    fn build(name: &str, delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            delay,
            received: Mutex::new(Vec::new()),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        })
    }

    pub fn count(&self) -> usize {
        self.received.lock().len()
    }

    pub fn received(&self) -> Vec<MessageContainer<TestMessage>> {
        self.received.lock().clone()
    }

    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .received
            .lock()
            .iter()
            .filter_map(|container| container.message().map(|m| m.id))
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl MessageHandler<TestMessage> for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_message(
        &self,
        container: MessageContainer<TestMessage>,
        _cancellation: CancellationToken,
    ) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.received.lock().push(container);
        Ok(())
    }

    async fn on_start(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn on_stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Handler that records each container and forwards it to `next`
pub struct ForwardingHandler {
    name: String,
    next: Option<String>,
    delay: Option<Duration>,
    slot: ForwarderSlot,
    received: Mutex<Vec<MessageContainer<TestMessage>>>,
}

impl ForwardingHandler {
    pub fn new(name: &str, next: Option<&str>) -> Arc<Self> {
        Self::build(name, next, None)
    }

    /// Forwarder that waits `delay` before handing the message on
    pub fn slow(name: &str, next: Option<&str>, delay: Duration) -> Arc<Self> {
        Self::build(name, next, Some(delay))
    }

    fn build(name: &str, next: Option<&str>, delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            next: next.map(str::to_string),
            delay,
            slot: ForwarderSlot::new(),
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn received(&self) -> Vec<MessageContainer<TestMessage>> {
        self.received.lock().clone()
    }

    pub fn has_forwarder(&self) -> bool {
        self.slot.is_injected()
    }
}

#[async_trait]
impl MessageHandler<TestMessage> for ForwardingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_message(
        &self,
        container: MessageContainer<TestMessage>,
        cancellation: CancellationToken,
    ) -> Result<()> {
        self.received.lock().push(container.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.next {
            Some(next) => self.slot.forward(next, container, cancellation).await,
            None => Ok(()),
        }
    }

    fn forwarding(&self) -> Option<&ForwarderSlot> {
        Some(&self.slot)
    }
}

/// Probe that takes `delay` per call and yields `messages` messages in total
pub struct SlowProbe {
    delay: Duration,
    remaining: AtomicUsize,
    pub calls: AtomicUsize,
    pub completed: AtomicUsize,
}

impl SlowProbe {
    pub fn new(delay: Duration, messages: usize) -> Arc<Self> {
        Arc::new(Self {
            delay,
            remaining: AtomicUsize::new(messages),
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl MessageProbe<TestMessage> for SlowProbe {
    async fn get_next_message(
        &self,
        _cancellation: &CancellationToken,
    ) -> Result<MessageContainer<TestMessage>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as u32;
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);

        let produced = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if produced {
            Ok(MessageContainer::new(message(call)))
        } else {
            Ok(MessageContainer::empty())
        }
    }
}

/// Probe that never has a message and counts how often it is asked
#[derive(Default)]
pub struct EmptyProbe {
    pub calls: AtomicUsize,
}

#[async_trait]
impl MessageProbe<TestMessage> for EmptyProbe {
    async fn get_next_message(
        &self,
        _cancellation: &CancellationToken,
    ) -> Result<MessageContainer<TestMessage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(MessageContainer::empty())
    }
}
