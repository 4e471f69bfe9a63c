//! # Message Sources
//!
//! Producers that originate messages and publish them on a "message received"
//! notification channel. Failures observed by a source, including failures of its
//! own subscribers, are published on its "error" channel instead of propagating.
//!
//! - [`PollingMessageSource`]: repeatedly asks a [`MessageProbe`] for the next message
//! - [`QueuePollingMessageSource`]: a polling source whose probe is a [`QueueAdapter`]
//! - [`PushMessageSource`]: accepts pushed payloads through a bounded ingress channel

pub mod lifecycle;
pub mod polling;
pub mod push;
pub mod queue;

use async_trait::async_trait;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::future::{Future, IntoFuture};
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::error::{PipelineError, Result, SharedError};
use crate::events::NotificationChannel;
use crate::messaging::MessageContainer;

pub use lifecycle::PollingState;
pub use polling::{MessageProbe, PollingMessageSource};
pub use push::{PayloadSender, PushMessageSource};
pub use queue::{InMemoryQueueAdapter, QueueAdapter, QueuePollingMessageSource, QueueProbe};

/// A producer of messages
#[async_trait]
pub trait MessageSource<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Source name used in logs and errors
    fn name(&self) -> &str;

    /// Current lifecycle phase
    fn state(&self) -> PollingState;

    /// Channel on which received, non-empty messages are published
    fn message_received(&self) -> &NotificationChannel<MessageContainer<T>>;

    /// Channel on which receive and subscriber failures are published
    fn errors(&self) -> &NotificationChannel<SharedError>;

    /// Start receiving. Never blocks on message delivery; idempotent.
    async fn start_receiving(&self, cancellation: CancellationToken) -> Result<()>;

    /// Stop receiving. The returned handle resolves once the last in-flight
    /// message has finished processing.
    async fn stop_receiving(&self, cancellation: CancellationToken) -> Result<DrainHandle>;

    /// Inject a message in-process and publish it for processing. Fails when the
    /// message cannot be handed to subscribers.
    async fn receive(
        &self,
        container: MessageContainer<T>,
        cancellation: CancellationToken,
    ) -> Result<()>;
}

/// Handle that resolves once a stopped component has drained its in-flight work
///
/// Clones share the same underlying drain, so every caller of a repeated stop
/// observes the same completion.
#[derive(Clone)]
pub struct DrainHandle {
    inner: Shared<BoxFuture<'static, ()>>,
}

impl DrainHandle {
    /// Handle for a component that had nothing to drain
    pub fn completed() -> Self {
        Self::from_future(async {})
    }

    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            inner: future.boxed().shared(),
        }
    }

    /// Combine several drains into one that resolves when all of them have
    pub fn join_all(handles: Vec<DrainHandle>) -> Self {
        Self::from_future(async move {
            futures::future::join_all(handles.into_iter().map(DrainHandle::wait)).await;
        })
    }

    /// Whether the drain has already been observed to finish
    pub fn is_complete(&self) -> bool {
        self.inner.peek().is_some()
    }

    /// Wait for the drain to finish
    pub async fn wait(self) {
        self.inner.await
    }

    /// Wait for the drain to finish, failing if it takes longer than `timeout`
    pub async fn wait_with_timeout(self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.inner)
            .await
            .map_err(|_| PipelineError::timeout("drain", timeout.as_millis() as u64))
    }
}

impl IntoFuture for DrainHandle {
    type Output = ();
    type IntoFuture = Shared<BoxFuture<'static, ()>>;

    fn into_future(self) -> Self::IntoFuture {
        self.inner
    }
}

impl std::fmt::Debug for DrainHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrainHandle")
            .field("complete", &self.is_complete())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_completed_handle_resolves() {
        DrainHandle::completed().wait().await;
    }

    #[tokio::test]
    async fn test_clones_share_completion() {
        let finished = Arc::new(AtomicBool::new(false));
        let handle = {
            let finished = finished.clone();
            DrainHandle::from_future(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                finished.store(true, Ordering::SeqCst);
            })
        };

        let clone = handle.clone();
        handle.await;
        assert!(finished.load(Ordering::SeqCst));
        assert!(clone.is_complete());
        clone.wait().await;
    }

    #[tokio::test]
    async fn test_wait_with_timeout_expires() {
        let handle = DrainHandle::from_future(tokio::time::sleep(Duration::from_secs(5)));
        let err = handle
            .wait_with_timeout(Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_join_all_waits_for_every_handle() {
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let handles = (1..=3)
            .map(|i| {
                let count = count.clone();
                DrainHandle::from_future(async move {
                    tokio::time::sleep(Duration::from_millis(5 * i)).await;
                    count.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        DrainHandle::join_all(handles).wait().await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
