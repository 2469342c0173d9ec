//! `handle_generate_markdown` and the end-of-batch publish trigger
//! (SPEC_FULL §4.6).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use pipeline_core::diagnostics::FailureRecord;
use pipeline_core::envelope::{Operation, Queue, QueueMessage as Envelope};
use pipeline_core::publish_lock::PublishLock;
use pipeline_queue::{QueueConsumer, QueueMessage as TransportMessage};
use pipeline_store::{StoreClient, StoreError};
use pipeline_worker::{Disposition, MessageHandler};

use crate::error::MarkdownGenError;
use crate::frontmatter::render_markdown;

/// Tagged variant for the Q3 payload's `content_type` field (SPEC_FULL §9
/// Design Notes: exhaustive `match`, not a dynamic string dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Json,
    Markdown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateMarkdownPayload {
    pub content_type: ContentType,
    pub blob_path: String,
    pub article_id: String,
    #[serde(default)]
    pub batch_id: Option<String>,
}

/// Splits `"articles/a-big-idea.json"` into `("articles", "a-big-idea.json")`.
fn split_container_path(blob_path: &str) -> Result<(&str, &str), MarkdownGenError> {
    blob_path
        .split_once('/')
        .ok_or_else(|| MarkdownGenError::Validation(format!("blob_path has no container segment: {blob_path}")))
}

/// Per-batch bookkeeping the idle-trigger check needs: which batch the
/// replica last rendered for, how many it rendered, and whether the most
/// recent attempt succeeded (a failed last attempt suppresses the trigger —
/// SPEC_FULL §4.6 step 1 "the last processing attempt succeeded").
#[derive(Debug, Default)]
struct BatchState {
    current_batch_id: Option<String>,
    rendered_count: u64,
    last_attempt_ok: bool,
}

pub struct MarkdownGenHandler {
    store: Arc<StoreClient>,
    publish_queue: Arc<dyn QueueConsumer>,
    replica_id: String,
    stale_lock_max_age_days: i64,
    state: Mutex<BatchState>,
}

impl MarkdownGenHandler {
    pub fn new(
        store: Arc<StoreClient>,
        publish_queue: Arc<dyn QueueConsumer>,
        replica_id: impl Into<String>,
        stale_lock_max_age_days: i64,
    ) -> Self {
        Self {
            store,
            publish_queue,
            replica_id: replica_id.into(),
            stale_lock_max_age_days,
            state: Mutex::new(BatchState::default()),
        }
    }

    fn markdown_path(filename: &str, publish_date: chrono::NaiveDate) -> String {
        format!("articles/{}/{filename}", publish_date.format("%Y/%m"))
    }

    async fn handle_generate_markdown(&self, payload: GenerateMarkdownPayload) -> Result<(), MarkdownGenError> {
        if payload.content_type != ContentType::Json {
            return Err(MarkdownGenError::UnsupportedContentType(format!("{:?}", payload.content_type)));
        }

        let (container, path) = split_container_path(&payload.blob_path)?;
        let article = self
            .store
            .download_json(container, path)
            .await?
            .ok_or_else(|| MarkdownGenError::MissingArticle(payload.blob_path.clone()))?;

        let rendered = render_markdown(&article);
        let markdown_path = Self::markdown_path(&article.filename(), article.publish_date);
        self.store.upload_text("markdown", &markdown_path, &rendered, "text/markdown; charset=utf-8").await?;

        info!(slug = %article.slug, markdown_path = %markdown_path, "article rendered to markdown");
        Ok(())
    }

    /// Called by the poll loop once `poll_batch` returns empty. Attempts the
    /// end-of-batch publish trigger (SPEC_FULL §4.6 steps 1-5) and resets
    /// per-batch state regardless of outcome, so a later batch starts clean.
    pub async fn on_idle(&self) {
        let (batch_id, markdown_count, last_attempt_ok) = {
            let guard = self.state.lock().await;
            (guard.current_batch_id.clone(), guard.rendered_count, guard.last_attempt_ok)
        };

        let Some(batch_id) = batch_id else {
            return;
        };
        if !last_attempt_ok {
            info!(batch_id, "queue idle but last processing attempt failed; not a trigger candidate");
            return;
        }

        self.reap_stale_lock(&batch_id).await;

        let lock = PublishLock::new(&batch_id, self.replica_id.clone());
        match self.store.upload_json("locks", &PublishLock::object_key(&batch_id), &lock, true).await {
            Ok(()) => {
                let envelope = Envelope::new(
                    "markdowngen",
                    Operation::PublishSiteRequest,
                    Uuid::new_v4(),
                    serde_json::json!({
                        "batch_id": batch_id,
                        "markdown_count": markdown_count,
                        "markdown_container": "markdown",
                        "trigger": "queue_drained",
                        "contract_version": pipeline_core::envelope::CONTRACT_VERSION,
                    }),
                );
                match serde_json::to_string(&envelope) {
                    Ok(body) => {
                        match self.publish_queue.enqueue(&body, &batch_id, &envelope.message_id.to_string()).await {
                            Ok(_) => info!(batch_id, "trigger sent; this replica won the lock"),
                            Err(e) => warn!(batch_id, error = %e, "won the publish lock but Q4 enqueue failed"),
                        }
                    }
                    Err(e) => warn!(batch_id, error = %e, "failed to serialize publish trigger envelope"),
                }
            }
            Err(StoreError::Conflict(_)) => {
                info!(batch_id, "publish lock already held by another replica; not re-sending");
            }
            Err(e) => warn!(batch_id, error = %e, "publish lock creation failed"),
        }

        let mut guard = self.state.lock().await;
        *guard = BatchState::default();
    }

    /// Best-effort write of a diagnostic record for a permanent failure
    /// (SPEC_FULL §7 "Diagnostic prefix").
    async fn write_failure_record(&self, article_id: &str, error: &MarkdownGenError, dequeue_count: u32) {
        let now = Utc::now();
        let record = FailureRecord::new("permanent", error.to_string(), dequeue_count);
        if let Err(e) = self
            .store
            .upload_json("markdown", &FailureRecord::path(article_id, now), &record, false)
            .await
        {
            warn!(article_id, error = %e, "failed to write diagnostic failure record");
        }
    }

    /// SPEC_FULL §9: a lock left behind by a replica that crashed before
    /// SitePublisher ever ran is reaped after `stale_lock_max_age_days`, so a
    /// future batch with the same `batch_id` (unlikely but not impossible
    /// across retried runs) is not wedged forever.
    async fn reap_stale_lock(&self, batch_id: &str) {
        let path = PublishLock::object_key(batch_id);
        let existing: Result<Option<PublishLock>, _> = self.store.download_json("locks", &path).await;
        if let Ok(Some(lock)) = existing {
            if lock.is_stale(self.stale_lock_max_age_days) {
                warn!(batch_id, "reaping stale publish lock older than retention window");
                if let Err(e) = self.store.delete("locks", &path).await {
                    warn!(batch_id, error = %e, "failed to reap stale publish lock");
                }
            }
        }
    }
}

#[async_trait]
impl MessageHandler for MarkdownGenHandler {
    async fn handle(&self, message: TransportMessage) -> Result<Disposition, anyhow::Error> {
        let envelope: Envelope = match serde_json::from_str(&message.body) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "malformed envelope, nacking");
                return Ok(Disposition::Nack);
            }
        };

        if let Err(e) = envelope.operation(Queue::GenerateMarkdown) {
            warn!(error = %e, "unknown operation, nacking for eventual DLQ redrive");
            return Ok(Disposition::Nack);
        }

        let payload: GenerateMarkdownPayload = match envelope.payload_as() {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "malformed GenerateMarkdown payload, nacking for eventual DLQ redrive");
                return Ok(Disposition::Nack);
            }
        };

        let batch_id = payload.batch_id.clone().unwrap_or_else(|| Utc::now().format("%Y%m%d-%H%M%S").to_string());
        let article_id = payload.article_id.clone();
        let result = self.handle_generate_markdown(payload).await;

        let mut guard = self.state.lock().await;
        guard.current_batch_id = Some(batch_id);
        guard.last_attempt_ok = result.is_ok();
        if result.is_ok() {
            guard.rendered_count += 1;
        }
        drop(guard);

        match result {
            Ok(()) => Ok(Disposition::Ack),
            Err(e) if e.is_permanent() => {
                warn!(error = %e, "permanent markdowngen failure, leaving for DLQ redrive");
                self.write_failure_record(&article_id, &e, message.attempt_count).await;
                Ok(Disposition::Nack)
            }
            Err(e) => {
                warn!(error = %e, "transient markdowngen failure, nacking for retry");
                Ok(Disposition::Nack)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_core::article::{ArticleCosts, ProcessedArticle, ProvenanceRecord, ProvenanceStage};
    use pipeline_core::collection::Source;
    use pipeline_queue::{QueueError, QueueHealth};
    use pipeline_store::{LocalBackend, StorageBackend};
    use std::sync::Mutex as StdMutex;

    struct MockQueue {
        sent: StdMutex<Vec<String>>,
    }

    impl MockQueue {
        fn new() -> Self {
            Self { sent: StdMutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl QueueConsumer for MockQueue {
        async fn enqueue(&self, body: &str, _group: &str, _dedup: &str) -> Result<String, QueueError> {
            self.sent.lock().unwrap().push(body.to_string());
            Ok(Uuid::new_v4().to_string())
        }
        async fn poll_batch(&self, _max: u32) -> Result<Vec<TransportMessage>, QueueError> {
            Ok(Vec::new())
        }
        async fn ack(&self, _receipt_handle: &str) -> Result<(), QueueError> {
            Ok(())
        }
        async fn nack(&self, _receipt_handle: &str) -> Result<(), QueueError> {
            Ok(())
        }
        async fn health_check(&self) -> Result<QueueHealth, QueueError> {
            Ok(QueueHealth { connected: true, approximate_message_count: Some(0), provider: "mock".into() })
        }
    }

    fn store() -> (tempfile::TempDir, Arc<StoreClient>) {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(tmp.path()).unwrap();
        (tmp, Arc::new(StoreClient::new(StorageBackend::Local(backend))))
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
                timestamp: Utc::now(),
                actor: "processor-1".into(),
            }],
            costs: ArticleCosts::default(),
            processed_at: Utc::now(),
            contract_version: "1.0.0".into(),
            tags: vec!["reddit".into()],
            cover: None,
        }
    }

    #[tokio::test]
    async fn renders_article_to_expected_markdown_path() {
        let (_tmp, store) = store();
        store.upload_json("articles", "a-big-idea.json", &sample_article(), false).await.unwrap();
        let publish_queue = Arc::new(MockQueue::new());
        let handler = MarkdownGenHandler::new(store.clone(), publish_queue, "markdowngen-1", 7);

        let payload = GenerateMarkdownPayload {
            content_type: ContentType::Json,
            blob_path: "articles/a-big-idea.json".into(),
            article_id: "a-big-idea".into(),
            batch_id: Some("batch-1".into()),
        };
        handler.handle_generate_markdown(payload).await.unwrap();

        let rendered = store.download_text("markdown", "articles/2024/10/20241008-a-big-idea.md").await.unwrap();
        assert!(rendered.unwrap().contains("slug: a-big-idea"));
    }

    #[tokio::test]
    async fn missing_article_blob_is_permanent_failure() {
        let (_tmp, store) = store();
        let publish_queue = Arc::new(MockQueue::new());
        let handler = MarkdownGenHandler::new(store, publish_queue, "markdowngen-1", 7);

        let payload = GenerateMarkdownPayload {
            content_type: ContentType::Json,
            blob_path: "articles/missing.json".into(),
            article_id: "missing".into(),
            batch_id: None,
        };
        let err = handler.handle_generate_markdown(payload).await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn idle_with_no_batch_in_progress_sends_nothing() {
        let (_tmp, store) = store();
        let publish_queue = Arc::new(MockQueue::new());
        let handler = MarkdownGenHandler::new(store, publish_queue.clone(), "markdowngen-1", 7);
        handler.on_idle().await;
        assert!(publish_queue.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn idle_after_successful_batch_triggers_exactly_once_on_the_winner() {
        let (_tmp, store) = store();
        store.upload_json("articles", "a-big-idea.json", &sample_article(), false).await.unwrap();
        let publish_queue = Arc::new(MockQueue::new());
        let handler = Arc::new(MarkdownGenHandler::new(store.clone(), publish_queue.clone(), "markdowngen-1", 7));

        let payload = GenerateMarkdownPayload {
            content_type: ContentType::Json,
            blob_path: "articles/a-big-idea.json".into(),
            article_id: "a-big-idea".into(),
            batch_id: Some("batch-1".into()),
        };
        let result = handler.handle_generate_markdown(payload).await;
        {
            let mut guard = handler.state.lock().await;
            guard.current_batch_id = Some("batch-1".into());
            guard.last_attempt_ok = result.is_ok();
            guard.rendered_count = 1;
        }

        handler.on_idle().await;
        assert_eq!(publish_queue.sent.lock().unwrap().len(), 1);

        // A second replica (or this one, re-entering idle with a stale
        // batch id it never got to clear) observes the lock conflict.
        let other = MarkdownGenHandler::new(store, publish_queue.clone(), "markdowngen-2", 7);
        {
            let mut guard = other.state.lock().await;
            guard.current_batch_id = Some("batch-1".into());
            guard.last_attempt_ok = true;
            guard.rendered_count = 1;
        }
        other.on_idle().await;
        assert_eq!(publish_queue.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn idle_after_failed_last_attempt_does_not_trigger() {
        let (_tmp, store) = store();
        let publish_queue = Arc::new(MockQueue::new());
        let handler = MarkdownGenHandler::new(store, publish_queue.clone(), "markdowngen-1", 7);
        {
            let mut guard = handler.state.lock().await;
            guard.current_batch_id = Some("batch-1".into());
            guard.last_attempt_ok = false;
            guard.rendered_count = 0;
        }
        handler.on_idle().await;
        assert!(publish_queue.sent.lock().unwrap().is_empty());
    }
}
