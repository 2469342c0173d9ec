//! Dedup witnesses written at `seen/{yyyy}/{mm}/{dd}/{content_hash}.json`
//! (SPEC_FULL §4.5, §6, §8 P3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(test)]
use chrono::TimeZone;

/// A record proving a given `content_hash` has already been collected.
///
/// Collector consults this before fanning a fresh item out; a hit short-
/// circuits the item as `rejected_dedup` without enqueueing or re-writing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeenRecord {
    pub content_hash: String,
    pub topic_id: String,
    pub first_seen_at: DateTime<Utc>,
}

impl SeenRecord {
    pub fn new(content_hash: impl Into<String>, topic_id: impl Into<String>) -> Self {
        Self {
            content_hash: content_hash.into(),
            topic_id: topic_id.into(),
            first_seen_at: Utc::now(),
        }
    }

    /// `{yyyy}/{mm}/{dd}/{content_hash}.json`, date-sharded so the Collector
    /// can enumerate a 14-day dedup window by listing day prefixes instead of
    /// downloading every witness ever written (SPEC_FULL §4.5, §6).
    pub fn object_key(&self) -> String {
        format!(
            "{}/{}.json",
            self.first_seen_at.format("%Y/%m/%d"),
            self.content_hash
        )
    }

    /// The `{yyyy}/{mm}/{dd}/` prefix a given day's witnesses are written under.
    pub fn day_prefix(date: DateTime<Utc>) -> String {
        format!("{}/", date.format("%Y/%m/%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_is_date_and_hash_scoped() {
        let mut record = SeenRecord::new("deadbeef", "reddit_abc123");
        record.first_seen_at = Utc.with_ymd_and_hms(2024, 10, 8, 12, 0, 0).unwrap();
        assert_eq!(record.object_key(), "2024/10/08/deadbeef.json");
    }

    #[test]
    fn round_trips_through_json() {
        let record = SeenRecord::new("deadbeef", "reddit_abc123");
        let encoded = serde_json::to_string(&record).unwrap();
        let decoded: SeenRecord = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.content_hash, "deadbeef");
        assert_eq!(decoded.topic_id, "reddit_abc123");
    }
}
