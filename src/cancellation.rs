//! # Cooperative Cancellation
//!
//! A clonable, level-triggered cancellation signal threaded from the host and
//! processor entry points down into every poll iteration and `process_message`
//! call. Cancelling never aborts work in flight; components observe the flag at
//! their own suspension points.

use std::sync::Arc;
use tokio::sync::watch;

/// Shared cancellation signal backed by a `watch` flag
#[derive(Debug, Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    /// Create a new, uncancelled token
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Wait until cancellation is requested. Resolves immediately if it already was.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                // Sender lives as long as any token clone; unreachable while self exists
                return;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
