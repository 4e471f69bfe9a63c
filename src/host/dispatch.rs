//! # Host Dispatch Table
//!
//! Map from a route kind to the ordered list of handlers registered for it. The
//! table is filled while the host is being built and is read-only afterwards, so
//! concurrent dispatches from many sources only ever read it.

use futures::future::{join_all, BoxFuture};
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::cancellation::CancellationToken;
use crate::constants::routes;
use crate::error::{PipelineError, Result, SharedError};
use crate::messaging::MessageContainer;

use super::MessageForwarder;

/// Discriminator a control message is dispatched by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    Start,
    Stop,
    /// Forward envelopes carrying messages of one concrete type
    Forward(TypeId),
}

impl RouteKind {
    pub fn forward<T: 'static>() -> Self {
        Self::Forward(TypeId::of::<T>())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Start => routes::START,
            Self::Stop => routes::STOP,
            Self::Forward(_) => routes::FORWARD,
        }
    }
}

/// A message routed to another processor by name
#[derive(Clone)]
pub struct ForwardEnvelope {
    recipient: Arc<str>,
    message_type: &'static str,
    container: Arc<dyn Any + Send + Sync>,
}

impl ForwardEnvelope {
    pub(crate) fn new<T>(recipient: &str, container: MessageContainer<T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            recipient: Arc::from(recipient),
            message_type: type_name::<T>(),
            container: Arc::new(container),
        }
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn message_type(&self) -> &'static str {
        self.message_type
    }

    /// The carried container, if it holds messages of type `T`
    pub fn container<T>(&self) -> Option<MessageContainer<T>>
    where
        T: Send + Sync + 'static,
    {
        self.container
            .downcast_ref::<MessageContainer<T>>()
            .cloned()
    }
}

impl std::fmt::Debug for ForwardEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardEnvelope")
            .field("recipient", &self.recipient)
            .field("message_type", &self.message_type)
            .finish()
    }
}

/// Internal message dispatched through the table
#[derive(Debug, Clone)]
pub enum ControlMessage {
    Start(MessageForwarder),
    Stop,
    Forward(ForwardEnvelope),
}

/// Route outcome: `true` when the route acted on the message
pub type RouteFuture = BoxFuture<'static, Result<bool>>;

pub type RouteHandler = Arc<dyn Fn(ControlMessage, CancellationToken) -> RouteFuture + Send + Sync>;

struct Route {
    processor: String,
    handler: RouteHandler,
}

/// Write-once routing table
#[derive(Default)]
pub struct DispatchTable {
    routes: HashMap<RouteKind, Vec<Route>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&mut self, kind: RouteKind, processor: &str, handler: RouteHandler) {
        self.routes.entry(kind).or_default().push(Route {
            processor: processor.to_string(),
            handler,
        });
    }

    pub fn route_count(&self, kind: RouteKind) -> usize {
        self.routes.get(&kind).map_or(0, Vec::len)
    }

    /// Processors with a route of `kind`, in registration order
    pub fn processors(&self, kind: RouteKind) -> impl Iterator<Item = &str> {
        self.routes
            .get(&kind)
            .into_iter()
            .flatten()
            .map(|route| route.processor.as_str())
    }

    /// Run every route registered for `kind` concurrently.
    ///
    /// Returns how many routes acted on the message. Every route runs even when
    /// some fail; failures are collected into one `DispatchFailed` error.
    pub async fn dispatch(
        &self,
        kind: RouteKind,
        message: ControlMessage,
        cancellation: CancellationToken,
    ) -> Result<usize> {
        let Some(routes) = self.routes.get(&kind) else {
            return Ok(0);
        };

        let outcomes = join_all(
            routes
                .iter()
                .map(|route| (route.handler)(message.clone(), cancellation.clone())),
        )
        .await;

        let mut matched = 0;
        let mut failures: Vec<SharedError> = Vec::new();
        for (route, outcome) in routes.iter().zip(outcomes) {
            match outcome {
                Ok(true) => matched += 1,
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(
                        route = kind.label(),
                        processor = %route.processor,
                        error = %error,
                        "Route failed"
                    );
                    matched += 1;
                    failures.push(Arc::new(error));
                }
            }
        }

        if failures.is_empty() {
            Ok(matched)
        } else {
            Err(PipelineError::dispatch_failed(kind.label(), failures))
        }
    }
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (kind, routes) in &self.routes {
            map.entry(kind, &routes.len());
        }
        map.finish()
    }
}
