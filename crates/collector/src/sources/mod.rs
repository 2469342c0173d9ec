//! Per-source reader contract (SPEC_FULL §4.5): an async lazy sequence of
//! raw records, rate-limited and backoff-aware. No web scraping — every
//! reader talks to a documented JSON or feed API.

pub mod mastodon;
pub mod reddit;
pub mod rss;

use async_trait::async_trait;

use pipeline_core::collection::Source;
use pipeline_ratelimit::RateLimiter;

use crate::error::CollectorError;

/// A single raw record as a source hands it back, before standardisation.
///
/// Fields absent for a given source (e.g. `favourites` for Reddit) are left
/// `None` — standardisation never invents a value for them.
#[derive(Debug, Clone)]
pub struct RawItem {
    pub id: String,
    pub title: String,
    pub content: String,
    pub source_url: String,
    pub subreddit: Option<String>,
    pub upvotes: Option<u64>,
    pub comments: Option<u64>,
    pub boosts: Option<u64>,
    pub favourites: Option<u64>,
    pub created_utc: Option<i64>,
}

/// One configured reader instance — e.g. a single subreddit, a single
/// Mastodon instance's public timeline, or a single RSS feed URL.
#[async_trait]
pub trait SourceReader: Send + Sync {
    fn source(&self) -> Source;

    /// A single fetch call, capped at `max_items`, that respects `limiter`
    /// for `(region, self.source())` and advances its backoff on throttling.
    /// Implementations page internally where the upstream API supports it;
    /// a Collector run issues one `fetch` per configured source, not one per
    /// page, since `max_items` already bounds the call.
    async fn fetch(
        &self,
        limiter: &RateLimiter,
        region: &str,
        max_items: usize,
    ) -> Result<Vec<RawItem>, CollectorError>;
}

/// Build the reader for one `"{source_type}:{parameter}"` source config
/// string (SPEC_FULL's `CollectorConfig::sources` shape, e.g.
/// `"reddit:rust"`, `"mastodon:fosstodon.org"`, `"rss:https://example.com/feed.xml"`).
pub fn build_reader(spec: &str) -> Result<Box<dyn SourceReader>, CollectorError> {
    let (kind, param) = spec
        .split_once(':')
        .ok_or_else(|| CollectorError::Source(format!("malformed source spec: {spec:?}")))?;
    match kind {
        "reddit" => Ok(Box::new(reddit::RedditReader::new(param))),
        "mastodon" => Ok(Box::new(mastodon::MastodonReader::new(param))),
        "rss" => Ok(Box::new(rss::RssReader::new(param))),
        other => Err(CollectorError::Source(format!("unknown source type: {other:?}"))),
    }
}
