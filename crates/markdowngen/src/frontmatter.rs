//! Hand-built YAML frontmatter writer (SPEC_FULL §4.6, §6).
//!
//! A templating engine would make the whitespace guarantee ("an optional
//! field that is omitted MUST still leave the surrounding newlines intact")
//! harder to audit than a fixed field order with one `push_str` per line, so
//! this renders the frontmatter by hand rather than through `minijinja`.

use pipeline_core::article::ProcessedArticle;

/// Escape a string for a double-quoted YAML scalar.
fn yaml_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn render_tags(tags: &[String]) -> String {
    let joined = tags.iter().map(|t| t.replace(['[', ']', ','], "")).collect::<Vec<_>>().join(", ");
    format!("[{joined}]")
}

/// Render the `--- ... ---` frontmatter block, one field per line, in the
/// exact order SPEC_FULL §6 specifies: title, date, source, source_url,
/// slug, tags, cover.
///
/// Every line ends with `\n` explicitly rather than via `Vec<String>::join`,
/// so an omitted optional field (`cover`) cannot accidentally merge two
/// adjacent fields onto one line.
pub fn render_frontmatter(article: &ProcessedArticle) -> String {
    let mut out = String::new();
    out.push_str("---\n");
    out.push_str("title: ");
    out.push_str(&yaml_quote(&article.title));
    out.push('\n');
    out.push_str("date: ");
    out.push_str(&article.processed_at.format("%Y-%m-%dT%H:%M:%SZ").to_string());
    out.push('\n');
    out.push_str("source: ");
    out.push_str(article.source.as_str());
    out.push('\n');
    out.push_str("source_url: ");
    out.push_str(&article.source_url);
    out.push('\n');
    out.push_str("slug: ");
    out.push_str(&article.slug);
    out.push('\n');
    out.push_str("tags: ");
    out.push_str(&render_tags(&article.tags));
    out.push('\n');
    if let Some(cover) = &article.cover {
        out.push_str("cover:\n");
        out.push_str("  image: ");
        out.push_str(&cover.image);
        out.push('\n');
        out.push_str("  caption: ");
        out.push_str(&yaml_quote(&cover.caption));
        out.push('\n');
    }
    out.push_str("---\n");
    out
}

/// Full document: frontmatter followed by the article body verbatim.
pub fn render_markdown(article: &ProcessedArticle) -> String {
    let mut out = render_frontmatter(article);
    out.push('\n');
    out.push_str(&article.content);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use pipeline_core::article::{ArticleCosts, CoverImage, ProvenanceRecord, ProvenanceStage};
    use pipeline_core::collection::Source;

    fn sample() -> ProcessedArticle {
        ProcessedArticle {
            article_id: "article_20241008_164657_deadbeef".into(),
            original_topic_id: "reddit_abc123".into(),
            slug: "a-big-idea".into(),
            title: "A Big Idea".into(),
            seo_title: "A Big Idea".into(),
            content: "## Body\n\nSome article text.".into(),
            word_count: 4,
            source: Source::Reddit,
            source_url: "https://reddit.com/r/rust/abc123".into(),
            publish_date: NaiveDate::from_ymd_opt(2024, 10, 8).unwrap(),
            quality_score: 0.7,
            content_hash: "deadbeef".into(),
            processor_id: "processor-1".into(),
            provenance: vec![ProvenanceRecord {
                stage: ProvenanceStage::LlmRewritten,
                timestamp: Utc.with_ymd_and_hms(2024, 10, 8, 16, 46, 57).unwrap(),
                actor: "processor-1".into(),
            }],
            costs: ArticleCosts::default(),
            processed_at: Utc.with_ymd_and_hms(2024, 10, 8, 16, 46, 57).unwrap(),
            contract_version: "1.0.0".into(),
            tags: vec!["reddit".into(), "rust".into()],
            cover: None,
        }
    }

    #[test]
    fn every_field_ends_its_own_line() {
        let fm = render_frontmatter(&sample());
        let lines: Vec<&str> = fm.lines().collect();
        assert_eq!(lines[0], "---");
        assert_eq!(lines[1], "title: \"A Big Idea\"");
        assert_eq!(lines[2], "date: 2024-10-08T16:46:57Z");
        assert_eq!(lines[3], "source: reddit");
        assert_eq!(lines[4], "source_url: https://reddit.com/r/rust/abc123");
        assert_eq!(lines[5], "slug: a-big-idea");
        assert_eq!(lines[6], "tags: [reddit, rust]");
        assert_eq!(lines[7], "---");
    }

    #[test]
    fn omitted_cover_does_not_merge_adjacent_lines() {
        let fm = render_frontmatter(&sample());
        // tags line must be followed immediately by the closing fence, not by
        // a `cover:` key concatenated onto the same line.
        assert!(fm.contains("tags: [reddit, rust]\n---\n"));
    }

    #[test]
    fn present_cover_renders_nested_fields_on_their_own_lines() {
        let mut article = sample();
        article.cover = Some(CoverImage {
            image: "https://example.com/cover.jpg".into(),
            caption: "A \"scenic\" view".into(),
        });
        let fm = render_frontmatter(&article);
        assert!(fm.contains("cover:\n  image: https://example.com/cover.jpg\n  caption: \"A \\\"scenic\\\" view\"\n---\n"));
    }

    #[test]
    fn rendering_twice_is_byte_identical() {
        let article = sample();
        assert_eq!(render_markdown(&article), render_markdown(&article));
    }

    #[test]
    fn frontmatter_parses_as_valid_yaml_with_no_shared_lines() {
        let fm = render_frontmatter(&sample());
        let body = fm.trim_start_matches("---\n").trim_end_matches("---\n");
        let value: serde_yaml::Value = serde_yaml::from_str(body).unwrap();
        let map = value.as_mapping().unwrap();
        for key in ["title", "date", "source", "source_url", "slug", "tags"] {
            assert!(map.contains_key(key), "missing key {key}");
        }
    }

    #[test]
    fn body_is_separated_from_frontmatter_by_a_blank_line() {
        let rendered = render_markdown(&sample());
        assert!(rendered.starts_with("---\n"));
        assert!(rendered.contains("---\n\n## Body"));
    }

    #[test]
    fn empty_tags_render_as_empty_list() {
        let mut article = sample();
        article.tags = Vec::new();
        let fm = render_frontmatter(&article);
        assert!(fm.contains("tags: []\n"));
    }
}
