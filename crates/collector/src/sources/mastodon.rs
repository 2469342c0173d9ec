//! Mastodon public-timeline JSON reader (SPEC_FULL §4.5).

use async_trait::async_trait;
use tracing::debug;

use pipeline_core::collection::Source;
use pipeline_ratelimit::RateLimiter;

use crate::error::CollectorError;

use super::{RawItem, SourceReader};

pub struct MastodonReader {
    client: reqwest::Client,
    instance: String,
}

impl MastodonReader {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            instance: instance.into(),
        }
    }
}

/// Strip HTML tags from a Mastodon status body — the API returns sanitized
/// HTML, not plain text, and the pipeline's quality gate and LLM rewrite
/// both expect prose.
fn strip_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl SourceReader for MastodonReader {
    fn source(&self) -> Source {
        Source::Mastodon
    }

    async fn fetch(
        &self,
        limiter: &RateLimiter,
        region: &str,
        max_items: usize,
    ) -> Result<Vec<RawItem>, CollectorError> {
        limiter.acquire(region, "mastodon").await;

        let limit = max_items.clamp(1, 40);
        let url = format!(
            "https://{}/api/v1/timelines/public?limit={}&local=true",
            self.instance, limit
        );
        debug!(url = %url, "fetching mastodon public timeline");

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
            limiter.note_throttled(region, "mastodon", retry_after).await;
            return Err(CollectorError::Throttled("mastodon".into()));
        }
        if status != 200 {
            return Err(CollectorError::Source(format!("mastodon HTTP {status}")));
        }

        let statuses: Vec<serde_json::Value> = response.json().await?;
        limiter.note_success(region, "mastodon").await;

        let items = statuses
            .into_iter()
            .filter_map(|status| {
                let id = status["id"].as_str()?.to_string();
                let content_html = status["content"].as_str().unwrap_or_default();
                let content = strip_html(content_html);
                let url = status["url"].as_str().unwrap_or_default().to_string();
                let spoiler = status["spoiler_text"].as_str().unwrap_or_default();
                let title = if spoiler.is_empty() {
                    content.chars().take(80).collect()
                } else {
                    spoiler.to_string()
                };
                Some(RawItem {
                    id,
                    title,
                    content,
                    source_url: url,
                    subreddit: None,
                    upvotes: None,
                    comments: status["replies_count"].as_u64(),
                    boosts: status["reblogs_count"].as_u64(),
                    favourites: status["favourites_count"].as_u64(),
                    created_utc: status["created_at"]
                        .as_str()
                        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                        .map(|dt| dt.timestamp()),
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
    fn strips_tags_and_collapses_whitespace() {
        assert_eq!(strip_html("<p>Hello   <b>world</b></p>"), "Hello world");
    }

    #[test]
    fn reader_targets_configured_instance() {
        let reader = MastodonReader::new("fosstodon.org");
        assert_eq!(reader.instance, "fosstodon.org");
        assert_eq!(reader.source(), Source::Mastodon);
    }
}
