//! RSS/Atom feed reader built on `feed-rs` (SPEC_FULL §4.5).

use async_trait::async_trait;
use tracing::debug;

use pipeline_core::collection::Source;
use pipeline_ratelimit::RateLimiter;

use crate::error::CollectorError;

use super::{RawItem, SourceReader};

pub struct RssReader {
    client: reqwest::Client,
    feed_url: String,
}

impl RssReader {
    pub fn new(feed_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            feed_url: feed_url.into(),
        }
    }
}

#[async_trait]
impl SourceReader for RssReader {
    fn source(&self) -> Source {
        Source::Rss
    }

    async fn fetch(
        &self,
        limiter: &RateLimiter,
        region: &str,
        max_items: usize,
    ) -> Result<Vec<RawItem>, CollectorError> {
        limiter.acquire(region, "rss").await;

        debug!(url = %self.feed_url, "fetching rss/atom feed");

        let response = self.client.get(&self.feed_url).send().await?;
        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(std::time::Duration::from_secs);
            limiter.note_throttled(region, "rss", retry_after).await;
            return Err(CollectorError::Throttled("rss".into()));
        }
        if status != 200 {
            return Err(CollectorError::Source(format!("rss HTTP {status}")));
        }

        let bytes = response.bytes().await?;
        limiter.note_success(region, "rss").await;

        let feed = feed_rs::parser::parse(&bytes[..])
            .map_err(|e| CollectorError::FeedParse(e.to_string()))?;

        let items = feed
            .entries
            .into_iter()
            .take(max_items)
            .map(|entry| {
                let title = entry.title.map(|t| t.content).unwrap_or_default();
                let content = entry
                    .content
                    .and_then(|c| c.body)
                    .or_else(|| entry.summary.map(|s| s.content))
                    .unwrap_or_default();
                let source_url = entry
                    .links
                    .first()
                    .map(|l| l.href.clone())
                    .unwrap_or_default();
                let created_utc = entry
                    .published
                    .or(entry.updated)
                    .map(|dt| dt.timestamp());

                RawItem {
                    id: entry.id,
                    title,
                    content,
                    source_url,
                    subreddit: None,
                    upvotes: None,
                    comments: None,
                    boosts: None,
                    favourites: None,
                    created_utc,
                }
            })
            .collect();

        Ok(items)
    }
}
