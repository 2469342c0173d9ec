//! Reddit JSON listing reader (SPEC_FULL §4.5).

use async_trait::async_trait;
use tracing::debug;

use pipeline_core::collection::Source;
use pipeline_ratelimit::RateLimiter;

use crate::error::CollectorError;

use super::{RawItem, SourceReader};

pub struct RedditReader {
    client: reqwest::Client,
    subreddit: String,
}

impl RedditReader {
    pub fn new(subreddit: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            subreddit: subreddit.into(),
        }
    }
}

#[async_trait]
impl SourceReader for RedditReader {
    fn source(&self) -> Source {
        Source::Reddit
    }

    async fn fetch(
        &self,
        limiter: &RateLimiter,
        region: &str,
        max_items: usize,
    ) -> Result<Vec<RawItem>, CollectorError> {
        limiter.acquire(region, "reddit").await;

        let limit = max_items.clamp(1, 100);
        let url = format!(
            "https://www.reddit.com/r/{}/top.json?limit={}&t=day",
            self.subreddit, limit
        );
        debug!(url = %url, "fetching reddit listing");

        let response = self
            .client
            .get(&url)
            .header("User-Agent", "content-pipeline/0.1 (+collector)")
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(std::time::Duration::from_secs);
            limiter.note_throttled(region, "reddit", retry_after).await;
            return Err(CollectorError::Throttled("reddit".into()));
        }
        if status != 200 {
            return Err(CollectorError::Source(format!("reddit HTTP {status}")));
        }

        let body: serde_json::Value = response.json().await?;
        limiter.note_success(region, "reddit").await;

        let children = body["data"]["children"].as_array().cloned().unwrap_or_default();
        let items = children
            .into_iter()
            .filter_map(|child| {
                let d = &child["data"];
                let id = d["id"].as_str()?.to_string();
                let permalink = d["permalink"].as_str().unwrap_or_default();
                Some(RawItem {
                    id,
                    title: d["title"].as_str().unwrap_or_default().to_string(),
                    content: d["selftext"].as_str().unwrap_or_default().to_string(),
                    source_url: format!("https://reddit.com{permalink}"),
                    subreddit: Some(self.subreddit.clone()),
                    upvotes: d["ups"].as_u64(),
                    comments: d["num_comments"].as_u64(),
                    boosts: None,
                    favourites: None,
                    created_utc: d["created_utc"].as_f64().map(|f| f as i64),
                })
            })
            .collect();

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_targets_configured_subreddit() {
        let reader = RedditReader::new("rust");
        assert_eq!(reader.subreddit, "rust");
        assert_eq!(reader.source(), Source::Reddit);
    }
}
