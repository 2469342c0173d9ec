//! The processed article entity handed from Processor to MarkdownGen.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::Source;

/// Which pipeline stage produced a [`ProvenanceRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceStage {
    Collected,
    LlmRewritten,
}

/// One entry in an article's `provenance` trail: which stage touched it,
/// when, and which actor (collector source tag or processor replica id) did
/// it (SPEC_FULL §3, §4.4 step 7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub stage: ProvenanceStage,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
}

/// Token/cost accounting for one LLM invocation, accumulated per article.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleCosts {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub estimated_cost_usd: f64,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub processing_time_seconds: f64,
}

/// Result of an (optional) stock image lookup for the frontmatter `cover`
/// field. The lookup itself is an external collaborator (SPEC_FULL §1); the
/// Processor leaves this `None` unless a lookup stage is wired in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverImage {
    pub image: String,
    pub caption: String,
}

impl ArticleCosts {
    /// Sums token counts and cost; `model` is kept from whichever side is
    /// non-empty (callers accumulate within a single model's invocations, so
    /// in practice the two never disagree) and wall time is summed.
    pub fn add(&mut self, other: ArticleCosts) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.estimated_cost_usd += other.estimated_cost_usd;
        self.processing_time_seconds += other.processing_time_seconds;
        if self.model.is_empty() {
            self.model = other.model;
        }
    }
}

/// A fully processed article, ready for markdown rendering.
///
/// Written to `articles/{slug}.json` and referenced by a `generate_markdown`
/// envelope carrying its `article_id` (SPEC_FULL §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedArticle {
    pub article_id: String,
    pub original_topic_id: String,
    pub slug: String,
    pub title: String,
    pub seo_title: String,
    pub content: String,
    pub word_count: usize,
    pub source: Source,
    pub source_url: String,
    pub publish_date: NaiveDate,
    pub quality_score: f64,
    pub content_hash: String,
    pub processor_id: String,
    /// Ordered stage trail: collection first, then each processing step
    /// that touched the article (SPEC_FULL §4.4 step 7).
    pub provenance: Vec<ProvenanceRecord>,
    pub costs: ArticleCosts,
    pub processed_at: DateTime<Utc>,
    pub contract_version: String,
    /// Frontmatter tags (SPEC_FULL §4.6 rendering rules).
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<CoverImage>,
}

impl ProcessedArticle {
    pub fn object_key(&self) -> String {
        format!("articles/{}.json", self.slug)
    }

    pub fn url(&self) -> String {
        crate::slug::article_url(self.publish_date, &self.slug)
    }

    pub fn filename(&self) -> String {
        crate::slug::filename(self.publish_date, &self.slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProcessedArticle {
        ProcessedArticle {
            article_id: "article_20241008_164657_deadbeef".into(),
            original_topic_id: "reddit_abc123".into(),
            slug: "a-big-idea".into(),
            title: "A Big Idea".into(),
            seo_title: "A Big Idea".into(),
            content: "Body text.".into(),
            word_count: 2,
            source: Source::Reddit,
            source_url: "https://reddit.com/r/rust/abc123".into(),
            publish_date: NaiveDate::from_ymd_opt(2024, 10, 8).unwrap(),
            quality_score: 0.7,
            content_hash: "deadbeef".into(),
            processor_id: "processor-1".into(),
            provenance: vec![
                ProvenanceRecord {
                    stage: ProvenanceStage::Collected,
                    timestamp: Utc::now(),
                    actor: "reddit".into(),
                },
                ProvenanceRecord {
                    stage: ProvenanceStage::LlmRewritten,
                    timestamp: Utc::now(),
                    actor: "processor-1".into(),
                },
            ],
            costs: ArticleCosts::default(),
            processed_at: Utc::now(),
            contract_version: crate::envelope::CONTRACT_VERSION.to_string(),
            tags: vec!["reddit".into()],
            cover: None,
        }
    }

    #[test]
    fn derived_paths_match_slug_helpers() {
        let article = sample();
        assert_eq!(article.object_key(), "articles/a-big-idea.json");
        assert_eq!(article.url(), "/2024/10/a-big-idea");
        assert_eq!(article.filename(), "20241008-a-big-idea.md");
    }

    #[test]
    fn costs_accumulate_across_calls() {
        let mut costs = ArticleCosts {
            prompt_tokens: 100,
            completion_tokens: 50,
            estimated_cost_usd: 0.01,
            model: "gpt-4o-mini".into(),
            processing_time_seconds: 1.5,
        };
        costs.add(ArticleCosts {
            prompt_tokens: 20,
            completion_tokens: 10,
            estimated_cost_usd: 0.002,
            model: String::new(),
            processing_time_seconds: 0.5,
        });
        assert_eq!(costs.prompt_tokens, 120);
        assert_eq!(costs.completion_tokens, 60);
        assert!((costs.estimated_cost_usd - 0.012).abs() < 1e-9);
        assert_eq!(costs.model, "gpt-4o-mini");
        assert!((costs.processing_time_seconds - 2.0).abs() < 1e-9);
    }
}
