//! Conditional-create lock blob backing the at-most-one-publish-trigger-per-
//! batch guarantee (SPEC_FULL §4.6, §8 P5).
//!
//! Distinct from [`crate::lease::LeaseRecord`]: a lease coordinates repeated
//! work on the same `topic_id` and is released by its holder; a publish lock
//! coordinates a one-time event (the Q4 trigger) and is never released by
//! the winner — only reaped, by SitePublisher on success or by MarkdownGen's
//! stale-lock fallback (SPEC_FULL §9).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishLock {
    pub batch_id: String,
    pub holder: String,
    pub created_at: DateTime<Utc>,
}

impl PublishLock {
    pub fn new(batch_id: impl Into<String>, holder: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            holder: holder.into(),
            created_at: Utc::now(),
        }
    }

    pub fn object_key(batch_id: &str) -> String {
        format!("site-publish-{batch_id}.lock")
    }

    /// Conservative fallback reap rule (SPEC_FULL §9 Open Question
    /// resolution): a lock older than `max_age_days` with no matching
    /// SitePublisher completion is assumed abandoned.
    pub fn is_stale(&self, max_age_days: i64) -> bool {
        Utc::now() > self.created_at + Duration::days(max_age_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_is_scoped_to_batch() {
        assert_eq!(PublishLock::object_key("20251012-164657"), "site-publish-20251012-164657.lock");
    }

    #[test]
    fn fresh_lock_is_not_stale() {
        let lock = PublishLock::new("batch-1", "markdowngen-1");
        assert!(!lock.is_stale(7));
    }

    #[test]
    fn backdated_lock_is_stale() {
        let mut lock = PublishLock::new("batch-1", "markdowngen-1");
        lock.created_at = Utc::now() - Duration::days(8);
        assert!(lock.is_stale(7));
    }
}
