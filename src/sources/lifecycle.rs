//! # Source Lifecycle
//!
//! Shared `Unstarted -> Started -> Stopped` state machine used by the polling and
//! push sources. Transitions are monotonic: a stopped source never restarts, and
//! repeated start or stop calls are no-ops.
//!
//! The lifecycle owns the background worker of a source and every per-cycle task
//! the worker spawns, so a stop can hand back a single [`DrainHandle`] covering
//! all of them.

use futures::future::{join_all, BoxFuture};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::DrainHandle;
use crate::cancellation::CancellationToken;
use crate::error::Result;

/// Lifecycle phase of a message source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollingState {
    Unstarted,
    Started,
    Stopped,
}

impl std::fmt::Display for PollingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unstarted => write!(f, "unstarted"),
            Self::Started => write!(f, "started"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Outcome of a start or stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    Ignored(PollingState),
}

pub(crate) struct SourceLifecycle {
    source: String,
    state: Mutex<PollingState>,
    stop_signal: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
    cycles: Mutex<Vec<JoinHandle<()>>>,
    drain: Mutex<Option<DrainHandle>>,
}

impl SourceLifecycle {
    pub(crate) fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            state: Mutex::new(PollingState::Unstarted),
            stop_signal: CancellationToken::new(),
            worker: Mutex::new(None),
            cycles: Mutex::new(Vec::new()),
            drain: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> PollingState {
        *self.state.lock()
    }

    /// Whether the worker should keep producing
    pub(crate) fn is_running(&self) -> bool {
        self.state() == PollingState::Started && !self.stop_signal.is_cancelled()
    }

    /// Move `Unstarted -> Started`.
    ///
    /// `hook` runs first; if it fails the state is left untouched and the error is
    /// returned. `spawn_worker` receives the internal stop signal and returns the
    /// worker task.
    pub(crate) fn start<H, W>(&self, hook: H, spawn_worker: W) -> Result<Transition>
    where
        H: FnOnce() -> Result<()>,
        W: FnOnce(CancellationToken) -> JoinHandle<()>,
    {
        let mut state = self.state.lock();
        if *state != PollingState::Unstarted {
            debug!(source = %self.source, state = %*state, "Start ignored");
            return Ok(Transition::Ignored(*state));
        }

        hook()?;

        *state = PollingState::Started;
        *self.worker.lock() = Some(spawn_worker(self.stop_signal.clone()));
        Ok(Transition::Applied)
    }

    /// Move `Started -> Stopped` and build the drain handle.
    ///
    /// Stopping an unstarted source is a no-op that returns an already completed
    /// handle. Stopping a stopped source returns the handle from the first stop.
    /// If `hook` fails the source keeps running and the error is returned.
    pub(crate) fn stop<H>(
        self: &Arc<Self>,
        hook: H,
        drain_deliveries: BoxFuture<'static, ()>,
    ) -> Result<(Transition, DrainHandle)>
    where
        H: FnOnce() -> Result<()>,
    {
        let mut state = self.state.lock();
        match *state {
            PollingState::Unstarted => {
                debug!(source = %self.source, "Stop before start ignored");
                return Ok((
                    Transition::Ignored(PollingState::Unstarted),
                    DrainHandle::completed(),
                ));
            }
            PollingState::Stopped => {
                let handle = self.drain.lock().clone().unwrap_or_else(DrainHandle::completed);
                return Ok((Transition::Ignored(PollingState::Stopped), handle));
            }
            PollingState::Started => {}
        }

        hook()?;

        *state = PollingState::Stopped;
        self.stop_signal.cancel();

        let worker = self.worker.lock().take();
        let lifecycle = Arc::clone(self);
        let handle = DrainHandle::from_future(async move {
            if let Some(worker) = worker {
                if let Err(join_error) = worker.await {
                    warn!(source = %lifecycle.source, error = %join_error, "Source worker did not complete");
                }
            }
            lifecycle.drain_cycles().await;
            drain_deliveries.await;
            debug!(source = %lifecycle.source, "Source drained");
        });

        *self.drain.lock() = Some(handle.clone());
        Ok((Transition::Applied, handle))
    }

    /// Track a task spawned for one receive cycle
    pub(crate) fn track_cycle(&self, cycle: JoinHandle<()>) {
        let mut cycles = self.cycles.lock();
        cycles.retain(|handle| !handle.is_finished());
        cycles.push(cycle);
    }

    pub(crate) fn active_cycles(&self) -> usize {
        self.cycles
            .lock()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    async fn drain_cycles(&self) {
        loop {
            let pending = std::mem::take(&mut *self.cycles.lock());
            if pending.is_empty() {
                return;
            }
            for result in join_all(pending).await {
                if let Err(join_error) = result {
                    warn!(source = %self.source, error = %join_error, "Receive cycle did not complete");
                }
            }
        }
    }
}

impl std::fmt::Debug for SourceLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceLifecycle")
            .field("source", &self.source)
            .field("state", &self.state())
            .finish()
    }
}
