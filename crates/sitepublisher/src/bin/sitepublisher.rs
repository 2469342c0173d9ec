//! sitepublisher-worker — consumes Q4 (publish-site), builds the static site,
//! and atomically replaces `web/`. Single-replica by design (SPEC_FULL §4.7).

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::Notify;
use tracing::info;

use pipeline_core::config::Config;
use pipeline_core::envelope::Queue;
use pipeline_queue::SqsConsumer;
use pipeline_sitepublisher::SitePublisherHandler;
use pipeline_store::{StorageBackend, StoreClient};
use pipeline_worker::{WorkerBuilder, WorkerRunner};

/// SitePublisher worker — static site build and web-root swap.
#[derive(Parser, Debug)]
#[command(name = "sitepublisher-worker", version, about)]
struct Cli {
    /// Health ping interval in seconds.
    #[arg(long, env = "SITEPUBLISHER_HEALTH_INTERVAL", default_value_t = 30)]
    health_interval: u64,

    /// Shutdown timeout in seconds.
    #[arg(long, env = "SITEPUBLISHER_SHUTDOWN_TIMEOUT", default_value_t = 10)]
    shutdown_timeout: u64,

    /// Messages pulled per poll. SitePublisher is single-replica with
    /// `max_replicas=1`; batching beyond 1 just means extra builds run
    /// sequentially within this replica.
    #[arg(long, env = "SITEPUBLISHER_POLL_BATCH_SIZE", default_value_t = 1)]
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

    let inbound = Arc::new(SqsConsumer::new(&config.aws, &config.queue, Queue::PublishSite).await?);

    info!("starting sitepublisher replica");

    let handler = Arc::new(SitePublisherHandler::new(
        store,
        config.site.generator_bin.clone(),
        config.site.theme_dir.clone(),
        Duration::from_secs(config.site.build_timeout_secs),
    ));

    let runner_config = WorkerBuilder::new("sitepublisher-worker")
        .health_interval(Duration::from_secs(cli.health_interval))
        .shutdown_timeout(Duration::from_secs(cli.shutdown_timeout))
        .poll_batch_size(cli.poll_batch_size)
        .build();

    let shutdown = Arc::new(Notify::new());
    WorkerRunner::run(inbound, handler, runner_config, Some(shutdown)).await;

    Ok(())
}
