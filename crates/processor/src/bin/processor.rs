//! processor-worker — consumes Q2 (process-topic), writes ProcessedArticle,
//! fans out to Q3 (generate-markdown). See SPEC_FULL §4.4.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::Notify;
use tracing::info;
use uuid::Uuid;

use pipeline_core::config::Config;
use pipeline_core::envelope::Queue;
use pipeline_llm::providers::create_provider;
use pipeline_processor::ProcessorHandler;
use pipeline_queue::SqsConsumer;
use pipeline_ratelimit::{presets, RateLimiter};
use pipeline_store::{StorageBackend, StoreClient};
use pipeline_worker::{WorkerBuilder, WorkerRunner};

/// Processor worker — lease-protected single-topic LLM rewrite.
#[derive(Parser, Debug)]
#[command(name = "processor-worker", version, about)]
struct Cli {
    /// Health ping interval in seconds.
    #[arg(long, env = "PROCESSOR_HEALTH_INTERVAL", default_value_t = 30)]
    health_interval: u64,

    /// Shutdown timeout in seconds.
    #[arg(long, env = "PROCESSOR_SHUTDOWN_TIMEOUT", default_value_t = 10)]
    shutdown_timeout: u64,

    /// Messages pulled per poll (capped at 10 by SQS).
    #[arg(long, env = "PROCESSOR_POLL_BATCH_SIZE", default_value_t = 5)]
    poll_batch_size: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pipeline_core::config::load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_summary();

    let backend = StorageBackend::from_config(&config.store, &config.aws)?;
    let store = Arc::new(StoreClient::new(backend));

    let inbound = Arc::new(SqsConsumer::new(&config.aws, &config.queue, Queue::ProcessTopic).await?);
    let outbound: Arc<dyn pipeline_queue::QueueConsumer> =
        Arc::new(SqsConsumer::new(&config.aws, &config.queue, Queue::GenerateMarkdown).await?);

    let limiter = Arc::new(RateLimiter::new(presets::openai()).with_preset("openai", presets::openai()));
    let provider = Arc::from(create_provider(&config.llm)?);

    let replica_id = format!("processor-{}", Uuid::new_v4());
    info!(replica_id = %replica_id, "starting processor replica");

    let handler = Arc::new(ProcessorHandler::new(
        store,
        outbound,
        limiter,
        provider,
        replica_id,
        config.llm.region.clone(),
        config.llm.openai_model.clone(),
        config.llm.temperature,
        config.llm.max_tokens,
        config.limits.lease_ttl_secs,
    ));

    let runner_config = WorkerBuilder::new("processor-worker")
        .health_interval(Duration::from_secs(cli.health_interval))
        .shutdown_timeout(Duration::from_secs(cli.shutdown_timeout))
        .poll_batch_size(cli.poll_batch_size)
        .build();

    let shutdown = Arc::new(Notify::new());
    WorkerRunner::run(inbound, handler, runner_config, Some(shutdown)).await;

    Ok(())
}
