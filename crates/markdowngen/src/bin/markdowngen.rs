//! markdowngen-worker — consumes Q3 (generate-markdown), renders articles to
//! `markdown/`, and fires the at-most-once Q4 publish trigger when idle. See
//! SPEC_FULL §4.6.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::Notify;
use tracing::info;
use uuid::Uuid;

use pipeline_core::config::Config;
use pipeline_core::envelope::Queue;
use pipeline_markdowngen::{MarkdownGenHandler, MarkdownGenRunner};
use pipeline_queue::SqsConsumer;
use pipeline_store::{StorageBackend, StoreClient};

/// MarkdownGen worker — JSON-to-Markdown rendering and publish signalling.
#[derive(Parser, Debug)]
#[command(name = "markdowngen-worker", version, about)]
struct Cli {
    /// Messages pulled per poll (capped at 10 by SQS).
    #[arg(long, env = "MARKDOWNGEN_POLL_BATCH_SIZE", default_value_t = 5)]
    poll_batch_size: u32,

    /// Age, in days, after which an unreaped publish lock is treated as
    /// abandoned (SPEC_FULL §9).
    #[arg(long, env = "MARKDOWNGEN_STALE_LOCK_MAX_AGE_DAYS", default_value_t = 7)]
    stale_lock_max_age_days: i64,
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

    let inbound = Arc::new(SqsConsumer::new(&config.aws, &config.queue, Queue::GenerateMarkdown).await?);
    let outbound: Arc<dyn pipeline_queue::QueueConsumer> =
        Arc::new(SqsConsumer::new(&config.aws, &config.queue, Queue::PublishSite).await?);

    let replica_id = format!("markdowngen-{}", Uuid::new_v4());
    info!(replica_id = %replica_id, "starting markdowngen replica");

    let handler = Arc::new(MarkdownGenHandler::new(
        store,
        outbound,
        replica_id,
        cli.stale_lock_max_age_days,
    ));

    let shutdown = Arc::new(Notify::new());
    MarkdownGenRunner::run(inbound, handler, "markdowngen-worker", cli.poll_batch_size, Some(shutdown)).await;

    Ok(())
}
