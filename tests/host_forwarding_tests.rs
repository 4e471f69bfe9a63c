//! Host routing: start/stop fan-out and name-based forwarding

mod common;

use common::*;
use pipeline_core::{
    CancellationToken, DuplicateNamePolicy, HostConfig, MessageContainer, MessageProcessor,
    MessageProcessorHost, MessageSource, PipelineError, PollingState, RouteKind,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

struct Chain {
    host: MessageProcessorHost,
    intake: TestQueue,
    a: Arc<ForwardingHandler>,
    b: Arc<ForwardingHandler>,
    c: Arc<ForwardingHandler>,
}

/// A forwards to B, B forwards to C
fn chain() -> Chain {
    let (intake, source_a) = queue_source("a", Duration::from_millis(5));
    let (_, source_b) = queue_source("b", Duration::from_millis(5));
    let (_, source_c) = queue_source("c", Duration::from_millis(5));

    let a = ForwardingHandler::new("a", Some("b"));
    let b = ForwardingHandler::new("b", Some("c"));
    let c = ForwardingHandler::new("c", None);

    let host = MessageProcessorHost::builder()
        .add_processor(MessageProcessor::new(source_a, a.clone()).unwrap())
        .add_processor(MessageProcessor::new(source_b, b.clone()).unwrap())
        .add_processor(MessageProcessor::new(source_c, c.clone()).unwrap())
        .build()
        .unwrap();

    Chain {
        host,
        intake,
        a,
        b,
        c,
    }
}

#[tokio::test]
async fn test_message_travels_a_to_b_to_c_by_identity() {
    let chain = chain();
    assert_ok!(chain.host.start(CancellationToken::new()).await);
    assert!(chain.a.has_forwarder() && chain.b.has_forwarder() && chain.c.has_forwarder());

    let sent = MessageContainer::new(message(1));
    chain.intake.enqueue_container(sent.clone());

    let c = chain.c.clone();
    assert!(wait_until(Duration::from_secs(2), move || !c.received().is_empty()).await);
    assert_ok!(chain.host.stop(CancellationToken::new()).await);

    let delivered = chain.c.received();
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].same_message(&sent));
    assert!(chain.a.received()[0].same_message(&sent));
    assert!(chain.b.received()[0].same_message(&sent));
}

#[tokio::test]
async fn test_forward_to_unknown_name_is_noop() {
    let chain = chain();
    chain.host.start(CancellationToken::new()).await.unwrap();

    assert_ok!(
        chain
            .host
            .forward_message("nobody", MessageContainer::new(message(2)), CancellationToken::new())
            .await
    );
    chain.host.stop(CancellationToken::new()).await.unwrap();

    assert!(chain.a.received().is_empty());
    assert!(chain.b.received().is_empty());
    assert!(chain.c.received().is_empty());
}

#[tokio::test]
async fn test_blank_recipient_fails_before_dispatch() {
    let chain = chain();

    for recipient in ["", "   ", "\t"] {
        let err = chain
            .host
            .forward_message(recipient, MessageContainer::new(message(3)), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_precondition());
        assert!(matches!(err, PipelineError::InvalidRecipient { .. }));
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(chain.a.received().is_empty());
    assert!(chain.b.received().is_empty());
    assert!(chain.c.received().is_empty());
}

#[tokio::test]
async fn test_forward_reaches_recipient_by_name_only() {
    let chain = chain();

    // Not started: delivery goes through the recipient source's receive path
    chain
        .host
        .forward_message("c", MessageContainer::new(message(4)), CancellationToken::new())
        .await
        .unwrap();

    let c = chain.c.clone();
    assert!(wait_until(Duration::from_secs(1), move || c.received().len() == 1).await);
    assert!(chain.a.received().is_empty());
    assert!(chain.b.received().is_empty());
}

#[tokio::test]
async fn test_host_stop_drains_every_processor() {
    let (queue_a, source_a) = queue_source("slow-a", Duration::from_millis(2));
    let (queue_b, source_b) = queue_source("slow-b", Duration::from_millis(2));
    let handler_a = RecordingHandler::slow("slow-a", Duration::from_millis(80));
    let handler_b = RecordingHandler::slow("slow-b", Duration::from_millis(80));

    let host = MessageProcessorHost::builder()
        .add_processor(MessageProcessor::new(source_a.clone(), handler_a.clone()).unwrap())
        .add_processor(MessageProcessor::new(source_b.clone(), handler_b.clone()).unwrap())
        .build()
        .unwrap();

    queue_a.enqueue(message(1));
    queue_b.enqueue(message(2));
    host.start(CancellationToken::new()).await.unwrap();
    assert!(wait_until(Duration::from_secs(1), || queue_a.is_empty() && queue_b.is_empty()).await);

    host.stop(CancellationToken::new()).await.unwrap();
    assert_eq!(handler_a.count(), 1);
    assert_eq!(handler_b.count(), 1);
    assert_eq!(source_a.state(), PollingState::Stopped);
    assert_eq!(source_b.state(), PollingState::Stopped);
    assert_eq!(handler_a.starts.load(Ordering::SeqCst), 1);
    assert_eq!(handler_b.stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stop_waits_for_messages_forwarded_while_stopping() {
    let (intake, source_a) = queue_source("upstream", Duration::from_millis(2));
    let (_, source_b) = queue_source("downstream", Duration::from_millis(2));
    let upstream =
        ForwardingHandler::slow("upstream", Some("downstream"), Duration::from_millis(150));
    let downstream = RecordingHandler::slow("downstream", Duration::from_millis(50));

    let host = MessageProcessorHost::builder()
        .add_processor(MessageProcessor::new(source_a, upstream.clone()).unwrap())
        .add_processor(MessageProcessor::new(source_b.clone(), downstream.clone()).unwrap())
        .build()
        .unwrap();

    intake.enqueue(message(1));
    host.start(CancellationToken::new()).await.unwrap();
    let seen = upstream.clone();
    assert!(wait_until(Duration::from_secs(1), move || seen.received().len() == 1).await);

    // Downstream stops at once; upstream forwards to it while draining
    assert_ok!(host.stop(CancellationToken::new()).await);
    assert_eq!(downstream.ids(), vec![1]);
    assert_eq!(source_b.message_received().in_flight(), 0);
}

#[tokio::test]
async fn test_shutdown_timeout_bounds_stop() {
    let (queue, source) = queue_source("stuck", Duration::from_millis(2));
    let handler = RecordingHandler::slow("stuck", Duration::from_millis(500));
    let host = MessageProcessorHost::builder()
        .with_config(HostConfig::default().with_shutdown_timeout(Duration::from_millis(50)))
        .add_processor(MessageProcessor::new(source, handler).unwrap())
        .build()
        .unwrap();

    queue.enqueue(message(1));
    host.start(CancellationToken::new()).await.unwrap();
    assert!(wait_until(Duration::from_secs(1), || queue.is_empty()).await);

    let err = host.stop(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Timeout { .. }));
}

#[tokio::test]
async fn test_duplicate_names_policy() {
    let twins = || {
        let (_, first) = queue_source("dup-1", Duration::from_millis(5));
        let (_, second) = queue_source("dup-2", Duration::from_millis(5));
        let one = RecordingHandler::new("twin");
        let two = RecordingHandler::new("twin");
        (
            MessageProcessor::new(first, one.clone()).unwrap(),
            MessageProcessor::new(second, two.clone()).unwrap(),
            one,
            two,
        )
    };

    let (first, second, _, _) = twins();
    let rejected = MessageProcessorHost::builder()
        .add_processor(first)
        .add_processor(second)
        .build();
    assert_err!(rejected);

    let (first, second, one, two) = twins();
    let host = MessageProcessorHost::builder()
        .with_config(HostConfig::default().with_duplicate_names(DuplicateNamePolicy::DeliverToAll))
        .add_processor(first)
        .add_processor(second)
        .build()
        .unwrap();
    assert_eq!(host.route_count(RouteKind::forward::<TestMessage>()), 2);

    host.forward_message("twin", MessageContainer::new(message(9)), CancellationToken::new())
        .await
        .unwrap();
    assert!(wait_until(Duration::from_secs(1), || one.count() == 1 && two.count() == 1).await);
}
