//! Per-topic metadata written to object storage at `topics/{topic_id}.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::Source;

/// Processing status of a topic, tracked across the Processor's lifecycle
/// (SPEC_FULL §3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    Collected,
    Processing,
    Processed,
    Failed,
}

/// Durable record of a topic's collection and processing state.
///
/// One of these exists per distinct `topic_id`; it is the idempotence anchor
/// for the at-most-once processing guarantee (SPEC_FULL §4.4 step 1, §8 P1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicMetadata {
    pub topic_id: String,
    pub source: Source,
    pub source_url: String,
    pub original_title: String,
    /// Raw collected body text, carried in the Q2 payload so the Processor
    /// never has to re-fetch the collection blob to run the LLM rewrite.
    pub content: String,
    pub content_hash: String,
    pub status: TopicStatus,
    pub collected_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_slug: Option<String>,
    #[serde(default)]
    pub priority_score: f64,
    #[serde(default)]
    pub attempt_count: u32,
    /// Audit pointers back to the Collector run that produced this topic.
    pub collection_id: String,
    pub collection_blob: String,
}

impl TopicMetadata {
    pub fn object_key(&self) -> String {
        format!("topics/{}.json", self.topic_id)
    }

    pub fn mark_processing(&mut self) {
        self.status = TopicStatus::Processing;
        self.attempt_count += 1;
    }

    pub fn mark_processed(&mut self, slug: impl Into<String>) {
        self.status = TopicStatus::Processed;
        self.processed_at = Some(Utc::now());
        self.article_slug = Some(slug.into());
    }

    pub fn mark_failed(&mut self) {
        self.status = TopicStatus::Failed;
    }
}
