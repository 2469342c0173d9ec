//! collector-worker — Q1 `wake_up` poll loop plus a manual `POST /collect`
//! HTTP trigger, running concurrently and sharing one shutdown signal
//! (SPEC_FULL §4.5).

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::Notify;
use tracing::info;

use pipeline_collector::handler::CollectorHandler;
use pipeline_collector::http::{self, AppState};
use pipeline_collector::pipeline::CollectorPipeline;
use pipeline_core::config::Config;
use pipeline_core::envelope::Queue;
use pipeline_queue::SqsConsumer;
use pipeline_ratelimit::{presets, RateLimiter};
use pipeline_store::{StorageBackend, StoreClient};
use pipeline_worker::{WorkerBuilder, WorkerRunner};

/// Collector worker — streaming ingestion, quality gate, dedup, fan-out.
#[derive(Parser, Debug)]
#[command(name = "collector-worker", version, about)]
struct Cli {
    /// Health ping interval in seconds.
    #[arg(long, env = "COLLECTOR_HEALTH_INTERVAL", default_value_t = 30)]
    health_interval: u64,

    /// Shutdown timeout in seconds.
    #[arg(long, env = "COLLECTOR_SHUTDOWN_TIMEOUT", default_value_t = 10)]
    shutdown_timeout: u64,

    /// Messages pulled per poll (capped at 10 by SQS); Q1 wake-ups are rare
    /// and cheap to poll one at a time.
    #[arg(long, env = "COLLECTOR_POLL_BATCH_SIZE", default_value_t = 1)]
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

    let inbound = Arc::new(SqsConsumer::new(&config.aws, &config.queue, Queue::CollectionRequests).await?);
    let outbound: Arc<dyn pipeline_queue::QueueConsumer> =
        Arc::new(SqsConsumer::new(&config.aws, &config.queue, Queue::ProcessTopic).await?);

    let limiter = Arc::new(
        RateLimiter::new(presets::reddit())
            .with_preset("reddit", presets::reddit())
            .with_preset("mastodon", presets::mastodon()),
    );

    let pipeline = CollectorPipeline::new(
        store,
        outbound,
        limiter,
        config.aws.region.clone(),
        config.collector.clone(),
    );

    let shutdown = Arc::new(Notify::new());

    let http_handle = {
        let state = Arc::new(AppState {
            pipeline: pipeline.clone(),
            api_key: config.collector.api_key.clone(),
            default_max_items: config.collector.default_max_items,
        });
        let addr = format!("0.0.0.0:{}", config.collector.http_port);
        let router = http::router(state);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(&addr).await {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!(addr, error = %e, "failed to bind /collect listener");
                    return;
                }
            };
            info!(addr, "manual /collect trigger listening");
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.notified().await })
                .await
                .ok();
        })
    };

    let handler = Arc::new(CollectorHandler::new(pipeline, config.collector.clone()));
    let runner_config = WorkerBuilder::new("collector-worker")
        .health_interval(Duration::from_secs(cli.health_interval))
        .shutdown_timeout(Duration::from_secs(cli.shutdown_timeout))
        .poll_batch_size(cli.poll_batch_size)
        .build();

    WorkerRunner::run(inbound, handler, runner_config, Some(shutdown.clone())).await;
    shutdown.notify_waiters();
    http_handle.await.ok();

    Ok(())
}
