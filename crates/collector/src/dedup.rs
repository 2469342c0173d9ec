//! Cross-run dedup via the `seen/` prefix (SPEC_FULL §4.5, §8 P3).

use std::collections::HashSet;

use chrono::{Duration, Utc};
use tracing::warn;

use pipeline_core::seen::SeenRecord;
use pipeline_store::StoreClient;

/// In-memory set of content hashes already seen within the dedup window,
/// reconstructed once per Collector run and extended as the run progresses.
pub struct SeenSet {
    hashes: HashSet<String>,
}

impl SeenSet {
    /// Enumerate `seen/` blobs under the last `window_days` day-prefixes.
    ///
    /// Defensive: a day whose listing fails is skipped rather than aborting
    /// the whole load; if the store is unreachable entirely the set comes
    /// back empty ("fail open" — SPEC_FULL §4.5 — duplicates are preferable
    /// to dropping a whole run's worth of content).
    pub async fn load(store: &StoreClient, window_days: i64) -> Self {
        let mut hashes = HashSet::new();
        let today = Utc::now();

        for offset in 0..window_days.max(1) {
            let day = today - Duration::days(offset);
            let prefix = SeenRecord::day_prefix(day);
            match store.list("seen", &prefix).await {
                Ok(keys) => {
                    for key in keys {
                        if let Some(hash) = basename_without_json(&key) {
                            hashes.insert(hash.to_string());
                        }
                    }
                }
                Err(e) => {
                    warn!(prefix = %prefix, error = %e, "seen/ listing failed for one day, continuing");
                }
            }
        }

        Self { hashes }
    }

    pub fn contains(&self, content_hash: &str) -> bool {
        self.hashes.contains(content_hash)
    }

    pub fn insert(&mut self, content_hash: impl Into<String>) {
        self.hashes.insert(content_hash.into());
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

fn basename_without_json(key: &str) -> Option<&str> {
    key.rsplit('/').next().and_then(|f| f.strip_suffix(".json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_store::{LocalBackend, StorageBackend};

    async fn store_with_seen(hashes: &[(&str, chrono::DateTime<Utc>)]) -> (tempfile::TempDir, StoreClient) {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(tmp.path()).unwrap();
        let client = StoreClient::new(StorageBackend::Local(backend));
        for (hash, at) in hashes {
            let mut record = SeenRecord::new(*hash, "reddit_x");
            record.first_seen_at = *at;
            client
                .upload_json("seen", &record.object_key(), &record, false)
                .await
                .unwrap();
        }
        (tmp, client)
    }

    #[tokio::test]
    async fn loads_hashes_within_window() {
        let now = Utc::now();
        let (_tmp, store) = store_with_seen(&[("deadbeef", now)]).await;
        let set = SeenSet::load(&store, 14).await;
        assert!(set.contains("deadbeef"));
    }

    #[tokio::test]
    async fn ignores_hashes_outside_window() {
        let now = Utc::now();
        let old = now - Duration::days(30);
        let (_tmp, store) = store_with_seen(&[("stale", old)]).await;
        let set = SeenSet::load(&store, 14).await;
        assert!(!set.contains("stale"));
    }

    #[tokio::test]
    async fn unreachable_store_fails_open_to_empty_set() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(tmp.path()).unwrap();
        let store = StoreClient::new(StorageBackend::Local(backend));
        let set = SeenSet::load(&store, 14).await;
        assert!(set.is_empty());
    }

    #[test]
    fn insert_and_contains_round_trip() {
        let mut set = SeenSet { hashes: HashSet::new() };
        assert!(!set.contains("abc"));
        set.insert("abc");
        assert!(set.contains("abc"));
    }
}
