//! Write-only diagnostic trail for permanent failures (SPEC_FULL §7).
//!
//! Never read by the pipeline itself — an audit record for out-of-band
//! inspection, mirroring the Collection record's best-effort-write
//! discipline (SPEC_FULL §4.5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub error_kind: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
    pub dequeue_count: u32,
}

impl FailureRecord {
    pub fn new(error_kind: impl Into<String>, message: impl Into<String>, dequeue_count: u32) -> Self {
        Self {
            error_kind: error_kind.into(),
            message: message.into(),
            occurred_at: Utc::now(),
            dequeue_count,
        }
    }

    /// `failures/{yyyy}/{mm}/{dd}/{id}.json`, relative to whatever container
    /// the caller writes under (e.g. `processed`, `markdown`, `web`).
    pub fn path(id: &str, now: DateTime<Utc>) -> String {
        format!("failures/{}/{id}.json", now.format("%Y/%m/%d"))
    }
}
