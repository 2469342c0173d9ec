//! `handle_process_topic` — the Processor's single public operation
//! (SPEC_FULL §4.4).

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use pipeline_core::article::{ArticleCosts, ProcessedArticle, ProvenanceRecord, ProvenanceStage};
use pipeline_core::diagnostics::FailureRecord;
use pipeline_core::envelope::{Operation, Queue, QueueMessage as Envelope, CONTRACT_VERSION};
use pipeline_core::lease::LeaseRecord;
use pipeline_core::slug::{article_id, disambiguate_slug, slugify, strip_date_prefix};
use pipeline_core::topic::TopicMetadata;
use pipeline_llm::{rewrite_article, LlmProvider, RewriteInput};
use pipeline_queue::{QueueConsumer, QueueMessage as TransportMessage};
use pipeline_ratelimit::RateLimiter;
use pipeline_store::{StoreClient, StoreError};
use pipeline_worker::{Disposition, MessageHandler};

use crate::error::ProcessorError;
use crate::quality::{quality_score, word_count};

pub struct ProcessorHandler {
    store: Arc<StoreClient>,
    /// Producer bound to Q3 (generate-markdown); distinct from the Q2
    /// consumer the worker binary polls, since this handler both consumes
    /// and fans out.
    downstream: Arc<dyn QueueConsumer>,
    limiter: Arc<RateLimiter>,
    provider: Arc<dyn LlmProvider>,
    replica_id: String,
    region: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    lease_ttl_secs: i64,
}

impl ProcessorHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<StoreClient>,
        downstream: Arc<dyn QueueConsumer>,
        limiter: Arc<RateLimiter>,
        provider: Arc<dyn LlmProvider>,
        replica_id: impl Into<String>,
        region: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
        lease_ttl_secs: i64,
    ) -> Self {
        Self {
            store,
            downstream,
            limiter,
            provider,
            replica_id: replica_id.into(),
            region: region.into(),
            model: model.into(),
            temperature,
            max_tokens,
            lease_ttl_secs,
        }
    }

    fn lease_path(topic_id: &str) -> String {
        format!("{topic_id}.lease")
    }

    fn processed_marker_path(topic_id: &str) -> String {
        format!("{topic_id}.json")
    }

    fn article_path(slug: &str) -> String {
        format!("{slug}.json")
    }

    /// Step 1: acquire the at-most-one-processor-per-topic lease.
    ///
    /// Returns `Ok(true)` if the lease was acquired, `Ok(false)` if another
    /// replica holds a live lease (caller should treat this as a successful
    /// no-op, per SPEC_FULL §4.4 failure semantics).
    async fn acquire_lease(&self, topic_id: &str) -> Result<bool, ProcessorError> {
        let path = Self::lease_path(topic_id);
        let lease = LeaseRecord::new(topic_id, &self.replica_id, self.lease_ttl_secs);

        match self.store.upload_json("leases", &path, &lease, true).await {
            Ok(()) => Ok(true),
            Err(StoreError::Conflict(_)) => {
                let existing: Option<LeaseRecord> = self.store.download_json("leases", &path).await?;
                match existing {
                    Some(existing) if existing.is_expired() => {
                        self.store.delete("leases", &path).await?;
                        match self.store.upload_json("leases", &path, &lease, true).await {
                            Ok(()) => Ok(true),
                            Err(StoreError::Conflict(_)) => Ok(false),
                            Err(e) => Err(e.into()),
                        }
                    }
                    _ => Ok(false),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn release_lease(&self, topic_id: &str) {
        if let Err(e) = self.store.delete("leases", &Self::lease_path(topic_id)).await {
            warn!(topic_id, error = %e, "failed to release lease (will expire on its own)");
        }
    }

    /// Best-effort write of a diagnostic record for a permanent failure
    /// (SPEC_FULL §7 "Diagnostic prefix"). Never blocks message disposition
    /// on its own success.
    async fn write_failure_record(&self, topic_id: &str, error: &ProcessorError, dequeue_count: u32) {
        let now = chrono::Utc::now();
        let record = FailureRecord::new("permanent", error.to_string(), dequeue_count);
        if let Err(e) = self
            .store
            .upload_json("processed", &FailureRecord::path(topic_id, now), &record, false)
            .await
        {
            warn!(topic_id, error = %e, "failed to write diagnostic failure record");
        }
    }

    /// Step 2: idempotent short-circuit keyed by topic_id.
    async fn already_processed(&self, topic_id: &str) -> Result<Option<ProcessedArticle>, ProcessorError> {
        let article = self
            .store
            .download_json("processed", &Self::processed_marker_path(topic_id))
            .await?;
        Ok(article)
    }

    /// Steps 4-5: clean or rewrite the title, then derive a deterministic,
    /// collision-free slug.
    async fn resolve_slug(
        &self,
        title: &str,
        topic_id: &str,
    ) -> Result<String, ProcessorError> {
        let base_slug = slugify(strip_date_prefix(title));
        let existing: Option<ProcessedArticle> =
            self.store.download_json("articles", &Self::article_path(&base_slug)).await?;

        match existing {
            Some(other) if other.original_topic_id != topic_id => Ok(disambiguate_slug(&base_slug, topic_id)),
            _ => Ok(base_slug),
        }
    }

    /// The full algorithm from SPEC_FULL §4.4, steps 1-9.
    async fn handle_process_topic(&self, topic: TopicMetadata) -> Result<Disposition, ProcessorError> {
        let topic_id = topic.topic_id.clone();

        if !self.acquire_lease(&topic_id).await? {
            info!(topic_id, "lease held by another replica; treating as success");
            return Ok(Disposition::Ack);
        }

        if let Some(_existing) = self.already_processed(&topic_id).await? {
            info!(topic_id, "topic already processed; idempotent short-circuit");
            self.release_lease(&topic_id).await;
            return Ok(Disposition::Ack);
        }

        let rewrite_started = Instant::now();
        let outcome = rewrite_article(
            self.provider.as_ref(),
            self.limiter.as_ref(),
            &self.region,
            RewriteInput {
                title: &topic.original_title,
                source: topic.source.as_str(),
                content: &topic.content,
            },
            self.temperature,
            self.max_tokens,
        )
        .await?;
        let processing_time_seconds = rewrite_started.elapsed().as_secs_f64();

        let slug = self.resolve_slug(&outcome.title, &topic_id).await?;
        let quality = quality_score(&outcome.content, topic.priority_score);
        let word_count = word_count(&outcome.content);
        let processed_at = Utc::now();

        let costs = ArticleCosts {
            prompt_tokens: outcome.prompt_tokens,
            completion_tokens: outcome.completion_tokens,
            estimated_cost_usd: pipeline_llm::rewrite::estimate_cost_usd(
                &self.model,
                outcome.prompt_tokens,
                outcome.completion_tokens,
            ),
            model: self.model.clone(),
            processing_time_seconds,
        };

        let provenance = vec![
            ProvenanceRecord {
                stage: ProvenanceStage::Collected,
                timestamp: topic.collected_at,
                actor: topic.source.as_str().to_string(),
            },
            ProvenanceRecord {
                stage: ProvenanceStage::LlmRewritten,
                timestamp: processed_at,
                actor: self.replica_id.clone(),
            },
        ];

        let article = ProcessedArticle {
            article_id: article_id(processed_at),
            original_topic_id: topic_id.clone(),
            slug: slug.clone(),
            title: outcome.title.clone(),
            seo_title: outcome.title,
            content: outcome.content,
            word_count,
            source: topic.source,
            source_url: topic.source_url.clone(),
            publish_date: topic.collected_at.date_naive(),
            quality_score: quality,
            content_hash: topic.content_hash.clone(),
            processor_id: self.replica_id.clone(),
            provenance,
            costs,
            processed_at,
            contract_version: CONTRACT_VERSION.to_string(),
            tags: vec![topic.source.as_str().to_string()],
            cover: None,
        };

        self.store
            .upload_json("articles", &Self::article_path(&slug), &article, false)
            .await?;
        self.store
            .upload_json("processed", &Self::processed_marker_path(&topic_id), &article, false)
            .await?;

        let envelope = Envelope::new(
            "processor",
            Operation::GenerateMarkdown,
            Uuid::new_v4(),
            serde_json::json!({
                "content_type": "json",
                "blob_path": article.object_key(),
                "article_id": article.article_id,
                "batch_id": topic.collection_id,
                "contract_version": CONTRACT_VERSION,
            }),
        );
        let body = serde_json::to_string(&envelope).map_err(|e| ProcessorError::Validation(e.to_string()))?;
        self.downstream.enqueue(&body, &topic_id, &envelope.message_id.to_string()).await?;

        self.release_lease(&topic_id).await;
        info!(topic_id, slug = %article.slug, quality = article.quality_score, "topic processed");
        Ok(Disposition::Ack)
    }
}

#[async_trait]
impl MessageHandler for ProcessorHandler {
    async fn handle(&self, message: TransportMessage) -> Result<Disposition, anyhow::Error> {
        let envelope: Envelope = match serde_json::from_str(&message.body) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "malformed envelope, nacking");
                return Ok(Disposition::Nack);
            }
        };

        if let Err(e) = envelope.operation(Queue::ProcessTopic) {
            warn!(error = %e, "unknown operation, nacking for eventual DLQ redrive");
            return Ok(Disposition::Nack);
        }

        let topic: TopicMetadata = match envelope.payload_as() {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "malformed TopicMetadata payload, nacking for eventual DLQ redrive");
                return Ok(Disposition::Nack);
            }
        };
        let topic_id = topic.topic_id.clone();

        match self.handle_process_topic(topic).await {
            Ok(disposition) => Ok(disposition),
            Err(e) if e.is_permanent() => {
                warn!(error = %e, "permanent processor failure, leaving for DLQ redrive");
                self.write_failure_record(&topic_id, &e, message.attempt_count).await;
                Ok(Disposition::Nack)
            }
            Err(e) => {
                warn!(error = %e, "transient processor failure, nacking for retry");
                Ok(Disposition::Nack)
            }
        }
    }
}
