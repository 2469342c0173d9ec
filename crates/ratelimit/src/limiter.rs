use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::bucket::{BucketParams, BucketState};

/// Token bucket per `(region, source)`, keyed state guarded by a single
/// `Mutex` — the per-key lock granularity isn't worth the complexity at this
/// request volume.
pub struct RateLimiter {
    presets: HashMap<String, BucketParams>,
    default_params: BucketParams,
    buckets: Mutex<HashMap<(String, String), BucketState>>,
}

impl RateLimiter {
    pub fn new(default_params: BucketParams) -> Self {
        Self {
            presets: HashMap::new(),
            default_params,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Register a preset for a named source (e.g. "reddit", "openai"); a
    /// source without a registered preset falls back to `default_params`.
    pub fn with_preset(mut self, source: impl Into<String>, params: BucketParams) -> Self {
        self.presets.insert(source.into(), params);
        self
    }

    fn params_for(&self, source: &str) -> BucketParams {
        self.presets.get(source).copied().unwrap_or(self.default_params)
    }

    /// Suspend until a token is available and any active backoff has
    /// elapsed for `(region, source)`.
    pub async fn acquire(&self, region: &str, source: &str) {
        loop {
            let wait = {
                let mut buckets = self.buckets.lock().await;
                let key = (region.to_string(), source.to_string());
                let params = self.params_for(source);
                let bucket = buckets.entry(key).or_insert_with(|| BucketState::new(params));
                let now = Instant::now();
                let wait = bucket.wait_duration(now);
                if wait.is_zero() {
                    bucket.consume(now);
                }
                wait
            };

            if wait.is_zero() {
                return;
            }
            trace!(region, source, wait_ms = wait.as_millis() as u64, "rate limit: waiting for token");
            tokio::time::sleep(wait).await;
        }
    }

    /// Record a throttling response (HTTP 429 or provider-specific signal).
    pub async fn note_throttled(&self, region: &str, source: &str, retry_after: Option<Duration>) {
        let mut buckets = self.buckets.lock().await;
        let key = (region.to_string(), source.to_string());
        let params = self.params_for(source);
        let bucket = buckets.entry(key).or_insert_with(|| BucketState::new(params));
        bucket.note_throttled(Instant::now(), retry_after);
        debug!(region, source, backoff_ms = bucket.current_backoff().as_millis() as u64, "rate limit: throttled");
    }

    /// Record a successful call, resetting backoff for `(region, source)`.
    pub async fn note_success(&self, region: &str, source: &str) {
        let mut buckets = self.buckets.lock().await;
        if let Some(bucket) = buckets.get_mut(&(region.to_string(), source.to_string())) {
            bucket.note_success();
        }
    }
}
