//! MarkdownGen's own poll loop.
//!
//! Generalizes `pipeline_worker::WorkerRunner`'s poll → handle → ack/nack
//! shape, but a generic [`pipeline_worker::MessageHandler`] never learns
//! that a poll returned zero messages — and the end-of-batch publish
//! trigger (SPEC_FULL §4.6) only fires on exactly that event. Rather than
//! widen the shared trait for one consumer, MarkdownGen runs its own loop
//! that calls [`MarkdownGenHandler::on_idle`] when `poll_batch` drains.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{info, warn};

use pipeline_queue::QueueConsumer;
use pipeline_worker::{Disposition, MessageHandler};

use crate::handler::MarkdownGenHandler;

pub struct MarkdownGenRunner;

impl MarkdownGenRunner {
    pub async fn run(
        consumer: Arc<dyn QueueConsumer>,
        handler: Arc<MarkdownGenHandler>,
        name: &str,
        poll_batch_size: u32,
        shutdown: Option<Arc<Notify>>,
    ) {
        info!(worker = name, "starting markdowngen replica");

        loop {
            let poll = tokio::select! {
                result = consumer.poll_batch(poll_batch_size) => result,
                _ = wait_for_shutdown(&shutdown) => {
                    info!(worker = name, "shutdown signal received; leaving any in-flight message untouched");
                    return;
                }
            };

            let messages = match poll {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(worker = name, error = %e, "poll_batch failed, backing off");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            if messages.is_empty() {
                handler.on_idle().await;
                continue;
            }

            for message in messages {
                let receipt_handle = message.receipt_handle.clone();
                let disposition = match handler.handle(message).await {
                    Ok(d) => d,
                    Err(e) => {
                        warn!(worker = name, error = %e, "handler failed, nacking message");
                        Disposition::Nack
                    }
                };

                match disposition {
                    Disposition::Ack => {
                        if let Err(e) = consumer.ack(&receipt_handle).await {
                            warn!(worker = name, error = %e, "ack failed");
                        }
                    }
                    Disposition::Nack => {
                        if let Err(e) = consumer.nack(&receipt_handle).await {
                            warn!(worker = name, error = %e, "nack failed");
                        }
                    }
                    Disposition::Leave => {
                        tracing::debug!(worker = name, "leaving message for visibility timeout to expire");
                    }
                }
            }
        }
    }
}

/// Resolves on an external shutdown notification (tests use this to avoid
/// touching process-wide signal handlers) or on SIGINT/SIGTERM, whichever
/// comes first — mirrors `pipeline_worker::WorkerRunner::wait_for_shutdown`.
async fn wait_for_shutdown(external: &Option<Arc<Notify>>) {
    match external {
        Some(notify) => {
            tokio::select! {
                _ = os_signal() => {}
                _ = notify.notified() => {}
            }
        }
        None => os_signal().await,
    }
}

async fn os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("failed to listen for ctrl_c");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pipeline_core::article::{ArticleCosts, ProcessedArticle, ProvenanceRecord, ProvenanceStage};
    use pipeline_core::collection::Source;
    use pipeline_queue::{QueueError, QueueHealth, QueueMessage as TransportMessage};
    use pipeline_store::{LocalBackend, StorageBackend, StoreClient};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use uuid::Uuid;

    struct FeedOnceThenEmptyQueue {
        message: StdMutex<Option<TransportMessage>>,
        acked: AtomicUsize,
        sent: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl QueueConsumer for FeedOnceThenEmptyQueue {
        async fn enqueue(&self, body: &str, _group: &str, _dedup: &str) -> Result<String, QueueError> {
            self.sent.lock().unwrap().push(body.to_string());
            Ok(Uuid::new_v4().to_string())
        }
        async fn poll_batch(&self, _max: u32) -> Result<Vec<TransportMessage>, QueueError> {
            Ok(self.message.lock().unwrap().take().into_iter().collect())
        }
        async fn ack(&self, _receipt_handle: &str) -> Result<(), QueueError> {
            self.acked.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn nack(&self, _receipt_handle: &str) -> Result<(), QueueError> {
            Ok(())
        }
        async fn health_check(&self) -> Result<QueueHealth, QueueError> {
            Ok(QueueHealth { connected: true, approximate_message_count: Some(0), provider: "mock".into() })
        }
    }

    fn sample_article() -> ProcessedArticle {
        ProcessedArticle {
            article_id: "article_20241008_164657_deadbeef".into(),
            original_topic_id: "reddit_abc123".into(),
            slug: "a-big-idea".into(),
            title: "A Big Idea".into(),
            seo_title: "A Big Idea".into(),
            content: "Body.".into(),
            word_count: 1,
            source: Source::Reddit,
            source_url: "https://reddit.com/r/rust/abc123".into(),
            publish_date: chrono::NaiveDate::from_ymd_opt(2024, 10, 8).unwrap(),
            quality_score: 0.7,
            content_hash: "deadbeef".into(),
            processor_id: "processor-1".into(),
            provenance: vec![ProvenanceRecord {
                stage: ProvenanceStage::LlmRewritten,
                timestamp: chrono::Utc::now(),
                actor: "processor-1".into(),
            }],
            costs: ArticleCosts::default(),
            processed_at: chrono::Utc::now(),
            contract_version: "1.0.0".into(),
            tags: vec!["reddit".into()],
            cover: None,
        }
    }

    #[tokio::test]
    async fn processes_one_message_then_triggers_publish_on_the_next_empty_poll() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(tmp.path()).unwrap();
        let store = Arc::new(StoreClient::new(StorageBackend::Local(backend)));
        store.upload_json("articles", "a-big-idea.json", &sample_article(), false).await.unwrap();

        let envelope = pipeline_core::envelope::QueueMessage::new(
            "processor",
            pipeline_core::envelope::Operation::GenerateMarkdown,
            Uuid::new_v4(),
            serde_json::json!({
                "content_type": "json",
                "blob_path": "articles/a-big-idea.json",
                "article_id": "a-big-idea",
                "batch_id": "batch-1",
            }),
        );
        let message = TransportMessage {
            id: "m1".into(),
            body: serde_json::to_string(&envelope).unwrap(),
            receipt_handle: "r1".into(),
            timestamp: chrono::Utc::now(),
            attempt_count: 1,
        };

        let inbound = Arc::new(FeedOnceThenEmptyQueue {
            message: StdMutex::new(Some(message)),
            acked: AtomicUsize::new(0),
            sent: StdMutex::new(Vec::new()),
        });
        let outbound = Arc::new(FeedOnceThenEmptyQueue {
            message: StdMutex::new(None),
            acked: AtomicUsize::new(0),
            sent: StdMutex::new(Vec::new()),
        });

        let handler = Arc::new(MarkdownGenHandler::new(store, outbound.clone(), "markdowngen-1", 7));
        let shutdown = Arc::new(Notify::new());
        let s = shutdown.clone();
        let inbound_clone = inbound.clone();
        let handler_clone = handler.clone();
        let task = tokio::spawn(async move {
            MarkdownGenRunner::run(inbound_clone, handler_clone, "test", 5, Some(s)).await
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(inbound.acked.load(Ordering::SeqCst), 1);
        assert_eq!(outbound.sent.lock().unwrap().len(), 1);

        shutdown.notify_waiters();
        tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }
}
