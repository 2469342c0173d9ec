//! Conditional-create lease records for at-most-one-processor-per-topic
//! (SPEC_FULL §4.4 step 1, §8 P1).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A lease blob written at `leases/{topic_id}.lease` via conditional create.
/// Not to be confused with the `locks/` container, which holds
/// [`crate::publish_lock::PublishLock`] instead — the two have separate
/// lifecycles and are never read across each other's namespace.
///
/// `pipeline-store`'s conditional-create put treats `AlreadyExists` as a
/// non-error `Conflict`, which the caller interprets as "someone else holds
/// the lease" unless [`LeaseRecord::is_expired`] says otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub topic_id: String,
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
    pub ttl_seconds: i64,
}

impl LeaseRecord {
    pub fn new(topic_id: impl Into<String>, holder: impl Into<String>, ttl_seconds: i64) -> Self {
        Self {
            topic_id: topic_id.into(),
            holder: holder.into(),
            acquired_at: Utc::now(),
            ttl_seconds,
        }
    }

    pub fn object_key(&self) -> String {
        format!("leases/{}.lease", self.topic_id)
    }

    /// Stale leases (e.g. left behind by a crashed worker) may be reclaimed
    /// by a fresh holder after `ttl_seconds` have elapsed (SPEC_FULL §9: lock
    /// retention policy).
    pub fn is_expired(&self) -> bool {
        let expires_at = self.acquired_at + Duration::seconds(self.ttl_seconds);
        Utc::now() > expires_at
    }
}
