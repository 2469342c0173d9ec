//! The Collector's streaming pipeline (SPEC_FULL §4.5):
//! `source-reader → standardise → quality-gate → dedup → fan-out`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use pipeline_core::collection::{Collection, CollectionStats};
use pipeline_core::config::CollectorConfig;
use pipeline_core::envelope::{Operation, QueueMessage as Envelope, CONTRACT_VERSION};
use pipeline_core::seen::SeenRecord;
use pipeline_core::topic::{TopicMetadata, TopicStatus};
use pipeline_queue::QueueConsumer;
use pipeline_ratelimit::RateLimiter;
use pipeline_store::StoreClient;

use crate::dedup::SeenSet;
use crate::error::CollectorError;
use crate::priority::priority_score;
use crate::quality::quality_gate;
use crate::sources::build_reader;
use crate::standardise::standardise;
use crate::template::SourceTemplate;

#[derive(Clone)]
pub struct CollectorPipeline {
    store: Arc<StoreClient>,
    downstream: Arc<dyn QueueConsumer>,
    limiter: Arc<RateLimiter>,
    region: String,
    config: CollectorConfig,
}

impl CollectorPipeline {
    pub fn new(
        store: Arc<StoreClient>,
        downstream: Arc<dyn QueueConsumer>,
        limiter: Arc<RateLimiter>,
        region: impl Into<String>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            store,
            downstream,
            limiter,
            region: region.into(),
            config,
        }
    }

    fn collection_blob_path(collection_id: &str, started_at: chrono::DateTime<Utc>) -> (String, String) {
        let date = started_at.date_naive();
        (
            "collected-content".to_string(),
            format!(
                "collections/{}/{}.json",
                date.format("%Y/%m/%d"),
                collection_id
            ),
        )
    }

    /// Run the pipeline once against `templates`, capped at
    /// `config.run_cap_secs` wall clock (SPEC_FULL §5).
    ///
    /// `min_score_override` replaces `config.min_score_threshold` for this
    /// run only — the HTTP trigger's optional `min_score` body field
    /// (SPEC_FULL §6) flows through here; a cron wake-up passes `None`.
    pub async fn run(
        &self,
        templates: Vec<SourceTemplate>,
        min_score_override: Option<f64>,
    ) -> Result<(String, CollectionStats), CollectorError> {
        let cap = Duration::from_secs(self.config.run_cap_secs);
        match tokio::time::timeout(cap, self.run_inner(templates, min_score_override)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(cap_secs = cap.as_secs(), "collector run hit its wall-clock cap");
                Err(CollectorError::Source("run exceeded wall clock cap".into()))
            }
        }
    }

    async fn run_inner(
        &self,
        templates: Vec<SourceTemplate>,
        min_score_override: Option<f64>,
    ) -> Result<(String, CollectionStats), CollectorError> {
        let min_score = min_score_override.unwrap_or(self.config.min_score_threshold);
        let min_content_length = self.config.min_content_length;
        let collection_id = format!("col-{}", Uuid::new_v4());
        let source_configs: Vec<String> = templates.iter().map(|t| t.source_spec.clone()).collect();
        let collection = Arc::new(Mutex::new(Collection::new(collection_id.clone(), source_configs)));
        let (blob_container, blob_path) =
            Self::collection_blob_path(&collection_id, collection.lock().await.started_at);

        let seen = Arc::new(Mutex::new(SeenSet::load(&self.store, self.config.dedup_window_days).await));
        info!(collection_id = %collection_id, seen_count = seen.lock().await.len(), "dedup window loaded");

        let mut handles = Vec::with_capacity(templates.len());
        for template in templates {
            let store = self.store.clone();
            let downstream = self.downstream.clone();
            let limiter = self.limiter.clone();
            let region = self.region.clone();
            let collection = collection.clone();
            let seen = seen.clone();
            let collection_blob = format!("{blob_container}/{blob_path}");
            let collection_id = collection_id.clone();

            handles.push(tokio::spawn(async move {
                run_one_source(
                    template,
                    store,
                    downstream,
                    limiter,
                    region,
                    collection,
                    seen,
                    collection_id,
                    collection_blob,
                    min_score,
                    min_content_length,
                )
                .await
            }));
        }

        let mut stats = CollectionStats::default();
        for handle in handles {
            match handle.await {
                Ok(Ok(partial)) => stats = merge_stats(stats, partial),
                Ok(Err(e)) => warn!(error = %e, "a source reader failed; continuing with remaining sources"),
                Err(e) => warn!(error = %e, "a source task panicked; continuing with remaining sources"),
            }
        }

        let mut collection = Arc::try_unwrap(collection)
            .expect("every source task has completed and dropped its Arc clone")
            .into_inner();
        collection.finish();
        collection.stats = stats.clone();

        if let Err(e) = self.store.upload_json(&blob_container, &blob_path, &collection, false).await {
            warn!(error = %e, "best-effort Collection audit write failed");
        }

        info!(
            collection_id = %collection_id,
            collected = stats.collected,
            published = stats.published,
            rejected_quality = stats.rejected_quality,
            rejected_dedup = stats.rejected_dedup,
            "collector run complete"
        );

        Ok((collection_id, stats))
    }
}

fn merge_stats(mut a: CollectionStats, b: CollectionStats) -> CollectionStats {
    a.collected += b.collected;
    a.published += b.published;
    a.rejected_quality += b.rejected_quality;
    a.rejected_dedup += b.rejected_dedup;
    a
}

#[allow(clippy::too_many_arguments)]
async fn run_one_source(
    template: SourceTemplate,
    store: Arc<StoreClient>,
    downstream: Arc<dyn QueueConsumer>,
    limiter: Arc<RateLimiter>,
    region: String,
    collection: Arc<Mutex<Collection>>,
    seen: Arc<Mutex<SeenSet>>,
    collection_id: String,
    collection_blob: String,
    min_score: f64,
    min_content_length: u32,
) -> Result<CollectionStats, CollectorError> {
    let reader = build_reader(&template.source_spec)?;
    let source = reader.source();
    let raw_items = reader.fetch(&limiter, &region, template.max_items).await?;

    let mut stats = CollectionStats::default();

    for raw in raw_items {
        stats.collected += 1;
        let item = standardise(source, raw);

        let engagement = item.upvotes.or(item.boosts).unwrap_or(0) as f64;
        if engagement < min_score {
            stats.rejected_quality += 1;
            tracing::debug!(topic_id = %item.topic_id(), engagement, min_score, "item below engagement floor");
            continue;
        }
        if (item.content.chars().count() as u32) < min_content_length {
            stats.rejected_quality += 1;
            tracing::debug!(topic_id = %item.topic_id(), "item below configured content-length floor");
            continue;
        }

        let (pass, reason) = quality_gate(&item, template.quality_mode.is_strict());
        if !pass {
            stats.rejected_quality += 1;
            tracing::debug!(topic_id = %item.topic_id(), reason, "item rejected by quality gate");
            continue;
        }

        {
            let mut seen_guard = seen.lock().await;
            if seen_guard.contains(&item.content_hash) {
                stats.rejected_dedup += 1;
                continue;
            }
            seen_guard.insert(item.content_hash.clone());
        }

        let topic = TopicMetadata {
            topic_id: item.topic_id(),
            source: item.source,
            source_url: item.source_url.clone(),
            original_title: item.title.clone(),
            content: item.content.clone(),
            content_hash: item.content_hash.clone(),
            status: TopicStatus::Collected,
            collected_at: item.collected_at,
            processed_at: None,
            article_slug: None,
            priority_score: priority_score(&item),
            attempt_count: 0,
            collection_id: collection_id.clone(),
            collection_blob: collection_blob.clone(),
        };

        let mut payload = serde_json::to_value(&topic).map_err(|e| CollectorError::Source(e.to_string()))?;
        if let serde_json::Value::Object(ref mut map) = payload {
            map.insert("contract_version".to_string(), json!(CONTRACT_VERSION));
        }
        let envelope = Envelope::new("collector", Operation::ProcessTopic, Uuid::new_v4(), payload);
        let body = serde_json::to_string(&envelope).map_err(|e| CollectorError::Source(e.to_string()))?;

        let seen_record = SeenRecord::new(item.content_hash.clone(), topic.topic_id.clone());

        let (enqueue_result, seen_write_result) = tokio::join!(
            downstream.enqueue(&body, &topic.topic_id, &envelope.message_id.to_string()),
            store.upload_json("seen", &seen_record.object_key(), &seen_record, false),
        );

        if let Err(e) = seen_write_result {
            warn!(topic_id = %topic.topic_id, error = %e, "best-effort seen/ write failed");
        }

        match enqueue_result {
            Ok(_) => {
                stats.published += 1;
                collection.lock().await.items.push(item);
            }
            Err(e) => {
                warn!(topic_id = %topic.topic_id, error = %e, "Q2 enqueue failed for a survivor; not counted as published");
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn merge_stats_sums_every_field() {
        let a = CollectionStats { collected: 10, published: 4, rejected_quality: 3, rejected_dedup: 3 };
        let b = CollectionStats { collected: 5, published: 1, rejected_quality: 1, rejected_dedup: 3 };
        let merged = merge_stats(a, b);
        assert_eq!(merged.collected, 15);
        assert_eq!(merged.published, 5);
        assert_eq!(merged.rejected_quality, 4);
        assert_eq!(merged.rejected_dedup, 6);
    }

    #[test]
    fn collection_blob_path_is_date_sharded_under_collected_content() {
        let started_at = Utc.with_ymd_and_hms(2024, 10, 8, 12, 0, 0).unwrap();
        let (container, path) = CollectorPipeline::collection_blob_path("col-1", started_at);
        assert_eq!(container, "collected-content");
        assert_eq!(path, "collections/2024/10/08/col-1.json");
    }
}
