//! Source-neutral collection entities produced by the Collector (SPEC_FULL §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A content source the Collector can read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Reddit,
    Mastodon,
    Rss,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Reddit => "reddit",
            Source::Mastodon => "mastodon",
            Source::Rss => "rss",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single standardised item read from a source, prior to quality gating.
///
/// `content_hash` must be computed last by the standardisation function that
/// builds this (SPEC_FULL §4.5) — it is the dedup key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionItem {
    pub id: String,
    pub title: String,
    pub content: String,
    pub source: Source,
    pub source_url: String,
    pub collected_at: DateTime<Utc>,
    pub content_hash: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subreddit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upvotes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boosts: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favourites: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_utc: Option<i64>,
}

impl CollectionItem {
    /// A stable, source-scoped topic id: `{source}_{id}`.
    pub fn topic_id(&self) -> String {
        format!("{}_{}", self.source.as_str(), self.id)
    }
}

/// Per-run collection statistics (SPEC_FULL §4.5, §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    pub collected: u64,
    pub published: u64,
    pub rejected_quality: u64,
    pub rejected_dedup: u64,
}

/// Append-only audit record for one Collector run (SPEC_FULL §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub collection_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub source_configs: Vec<String>,
    pub items: Vec<CollectionItem>,
    pub stats: CollectionStats,
}

impl Collection {
    pub fn new(collection_id: impl Into<String>, source_configs: Vec<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            started_at: Utc::now(),
            ended_at: None,
            source_configs,
            items: Vec::new(),
            stats: CollectionStats::default(),
        }
    }

    pub fn finish(&mut self) {
        self.ended_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> CollectionItem {
        CollectionItem {
            id: "abc123".into(),
            title: "A Big Idea".into(),
            content: "Body text long enough to pass readability.".into(),
            source: Source::Reddit,
            source_url: "https://reddit.com/r/rust/abc123".into(),
            collected_at: Utc::now(),
            content_hash: crate::hash::content_hash("A Big Idea", "Body text"),
            subreddit: Some("rust".into()),
            upvotes: Some(500),
            comments: Some(80),
            boosts: None,
            favourites: None,
            created_utc: Some(1728385800),
        }
    }

    #[test]
    fn topic_id_is_source_scoped() {
        assert_eq!(sample_item().topic_id(), "reddit_abc123");
    }

    #[test]
    fn optional_fields_are_omitted_when_absent() {
        let mut item = sample_item();
        item.boosts = None;
        item.favourites = None;
        let json = serde_json::to_value(&item).unwrap();
        assert!(!json.as_object().unwrap().contains_key("boosts"));
        assert!(!json.as_object().unwrap().contains_key("favourites"));
    }

    #[test]
    fn collection_round_trips() {
        let mut collection = Collection::new("col-1", vec!["reddit:rust".into()]);
        collection.items.push(sample_item());
        collection.stats.collected = 1;
        collection.finish();

        let encoded = serde_json::to_string(&collection).unwrap();
        let decoded: Collection = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.items.len(), 1);
        assert!(decoded.ended_at.is_some());
    }
}
