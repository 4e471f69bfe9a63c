//! # Pipeline Demo
//!
//! Console driver that wires queue-polling processors together, starts them and
//! lets an operator inject messages from stdin.
//!
//! Operator input, one command per line:
//! - a number `n` enqueues `n` sample orders into the intake queue
//! - `stop` stops every processor, waits for the drain and exits

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use uuid::Uuid;

use pipeline_core::config::ConfigManager;
use pipeline_core::logging::init_structured_logging;
use pipeline_core::{
    CancellationToken, ForwarderSlot, InMemoryQueueAdapter, MessageContainer, MessageHandler,
    MessageProcessor, MessageProcessorHost, MessageProperties, PipelineConfig,
    QueuePollingMessageSource, SharedError,
};

#[derive(Parser)]
#[command(name = "pipeline-demo")]
#[command(about = "Run an in-process message pipeline driven from stdin")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Directory containing pipeline.yaml and pipeline.<environment>.yaml
    #[arg(short, long, env = "PIPELINE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Environment overlay to load (development, test, production)
    #[arg(short, long)]
    environment: Option<String>,

    /// Override the configured polling interval
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Processor topology to run
    #[arg(long, value_enum, default_value_t = Topology::Chain)]
    topology: Topology,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Topology {
    /// One processor bound to the intake queue
    Single,
    /// intake -> enrich -> audit, forwarding through a host
    Chain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Order {
    id: Uuid,
    sequence: u64,
    created_at: DateTime<Utc>,
}

type IntakeQueue = Arc<InMemoryQueueAdapter<Order>>;

/// Logs each order and optionally forwards it to the next stage
struct Stage {
    name: String,
    next: Option<String>,
    forwarding: ForwarderSlot,
    processed: AtomicU64,
}

impl Stage {
    fn new(name: &str, next: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            next: next.map(str::to_string),
            forwarding: ForwarderSlot::new(),
            processed: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl MessageHandler<Order> for Stage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_message(
        &self,
        container: MessageContainer<Order>,
        cancellation: CancellationToken,
    ) -> pipeline_core::Result<()> {
        let count = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(order) = container.message() {
            info!(
                stage = %self.name,
                order_id = %order.id,
                sequence = order.sequence,
                batch = container.properties().get_or_default::<String>("batch"),
                processed = count,
                "📦 Order processed"
            );
        }

        match &self.next {
            Some(next) => self.forwarding.forward(next, container, cancellation).await,
            None => Ok(()),
        }
    }

    fn forwarding(&self) -> Option<&ForwarderSlot> {
        self.next.as_ref().map(|_| &self.forwarding)
    }
}

enum Pipeline {
    Single(Arc<MessageProcessor<Order>>),
    Hosted(MessageProcessorHost),
}

impl Pipeline {
    async fn start(&self, cancellation: CancellationToken) -> pipeline_core::Result<()> {
        match self {
            Self::Single(processor) => processor.start(cancellation).await,
            Self::Hosted(host) => host.start(cancellation).await,
        }
    }

    async fn stop(&self, cancellation: CancellationToken) -> pipeline_core::Result<()> {
        match self {
            Self::Single(processor) => {
                let drain = processor.stop(cancellation).await?;
                drain.await;
                Ok(())
            }
            Self::Hosted(host) => host.stop(cancellation).await,
        }
    }
}

fn stage_processor(
    config: &PipelineConfig,
    name: &str,
    next: Option<&str>,
    queue: IntakeQueue,
) -> Result<Arc<MessageProcessor<Order>>> {
    let source = QueuePollingMessageSource::<Order, _>::with_queue_config(name, queue, &config.polling)
        .with_context(|| format!("creating source for stage '{name}'"))?;
    let processor = MessageProcessor::new(Arc::new(source), Stage::new(name, next))?;

    let stage = name.to_string();
    processor.errors().subscribe(move |error: SharedError| {
        let stage = stage.clone();
        async move {
            warn!(stage = %stage, category = error.category(), error = %error, "Stage reported an error");
            Ok(())
        }
    });
    Ok(processor)
}

fn build_pipeline(
    config: &PipelineConfig,
    topology: Topology,
    intake: IntakeQueue,
) -> Result<Pipeline> {
    match topology {
        Topology::Single => Ok(Pipeline::Single(stage_processor(config, "intake", None, intake)?)),
        Topology::Chain => {
            let host = MessageProcessorHost::builder()
                .with_config(config.host.clone())
                .add_processor(stage_processor(config, "intake", Some("enrich"), intake)?)
                .add_processor(stage_processor(
                    config,
                    "enrich",
                    Some("audit"),
                    Arc::new(InMemoryQueueAdapter::new()),
                )?)
                .add_processor(stage_processor(
                    config,
                    "audit",
                    None,
                    Arc::new(InMemoryQueueAdapter::new()),
                )?)
                .build()?;
            Ok(Pipeline::Hosted(host))
        }
    }
}

fn enqueue_orders(queue: &InMemoryQueueAdapter<Order>, count: u64, next_sequence: &mut u64) {
    let batch = Uuid::new_v4().to_string();
    for _ in 0..count {
        *next_sequence += 1;
        let mut properties = MessageProperties::new();
        if let Err(error) = properties.add_text("batch", batch.as_str()) {
            warn!(error = %error, "Could not tag order with its batch");
        }
        queue.enqueue_container(MessageContainer::with_properties(
            Order {
                id: Uuid::new_v4(),
                sequence: *next_sequence,
                created_at: Utc::now(),
            },
            properties,
        ));
    }
    info!(count, batch = %batch, queued = queue.len(), "📨 Orders enqueued");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.environment {
        Some(environment) => {
            ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), environment)
        }
        None => ConfigManager::load_from_directory(cli.config_dir.clone()),
    }
    .context("loading pipeline configuration")?;

    let mut config = manager.config().clone();
    if let Some(interval_ms) = cli.interval_ms {
        config.polling.interval_ms = interval_ms;
        config.validate().context("validating --interval-ms")?;
    }

    init_structured_logging(&config.logging);
    info!(
        environment = %manager.environment(),
        topology = ?cli.topology,
        interval_ms = config.polling.interval_ms,
        "🚀 Starting pipeline demo"
    );

    let intake: IntakeQueue = Arc::new(InMemoryQueueAdapter::new());
    let pipeline = build_pipeline(&config, cli.topology, intake.clone())?;
    let cancellation = CancellationToken::new();
    pipeline.start(cancellation.clone()).await?;

    println!("Enter a number to enqueue that many orders, or 'stop' to exit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sequence = 0_u64;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading operator input")? else {
                    info!("stdin closed");
                    break;
                };
                let command = line.trim();
                if command.eq_ignore_ascii_case("stop") {
                    break;
                }
                match command.parse::<u64>() {
                    Ok(count) => enqueue_orders(&intake, count, &mut sequence),
                    Err(_) if command.is_empty() => {}
                    Err(_) => println!("Unrecognized input '{command}': enter a number or 'stop'"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    info!("🛑 Stopping pipeline");
    pipeline.stop(cancellation.clone()).await?;
    cancellation.cancel();

    info!(remaining = intake.len(), "✅ Pipeline drained");
    Ok(())
}
