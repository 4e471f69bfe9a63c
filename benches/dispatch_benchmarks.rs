use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::time::Duration;

use pipeline_core::{
    CancellationToken, InMemoryQueueAdapter, MessageContainer, MessageHandler, MessageProcessor,
    MessageProcessorHost, MessageProperties, QueuePollingMessageSource, Result,
};

struct Discard {
    name: String,
}

#[async_trait]
impl MessageHandler<u64> for Discard {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_message(
        &self,
        container: MessageContainer<u64>,
        _cancellation: CancellationToken,
    ) -> Result<()> {
        black_box(container.message());
        Ok(())
    }
}

fn host_with(processors: usize) -> MessageProcessorHost {
    let mut builder = MessageProcessorHost::builder();
    for index in 0..processors {
        let name = format!("processor-{index}");
        let source = QueuePollingMessageSource::with_queue(
            name.clone(),
            Arc::new(InMemoryQueueAdapter::<u64>::new()),
            Duration::from_secs(60),
        )
        .unwrap();
        let processor =
            MessageProcessor::new(Arc::new(source), Arc::new(Discard { name })).unwrap();
        builder = builder.add_processor(processor);
    }
    builder.build().unwrap()
}

fn benchmark_forward_dispatch(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("forward_dispatch");

    for processors in [1_usize, 8, 64] {
        let host = runtime.block_on(async { host_with(processors) });
        let recipient = format!("processor-{}", processors - 1);
        group.bench_function(format!("{processors}_processors"), |b| {
            b.to_async(&runtime).iter(|| async {
                host.forward_message(&recipient, MessageContainer::new(7_u64), CancellationToken::new())
                    .await
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn benchmark_property_lookup(c: &mut Criterion) {
    let mut properties = MessageProperties::new();
    for index in 0..16_u64 {
        properties.add(format!("key-{index}"), index).unwrap();
    }

    c.bench_function("property_lookup_typed", |b| {
        b.iter(|| properties.get::<u64>(black_box("key-7")))
    });
    c.bench_function("property_lookup_mismatch", |b| {
        b.iter(|| properties.get_or::<i64>(black_box("key-7"), -1))
    });
}

criterion_group!(benches, benchmark_forward_dispatch, benchmark_property_lookup);
criterion_main!(benches);
