//! Pure, deterministic slug and filename derivation (SPEC_FULL §4.4 steps 4-5).

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// Strip leading date-parenthesis markers like `"(15 Oct) "` from a title.
pub fn strip_date_prefix(title: &str) -> &str {
    let trimmed = title.trim_start();
    if !trimmed.starts_with('(') {
        return trimmed;
    }
    match trimmed.find(')') {
        Some(close) if close > 0 => trimmed[close + 1..].trim_start(),
        _ => trimmed,
    }
}

/// Markers that indicate the title is a generation placeholder, not real copy.
const PLACEHOLDER_MARKERS: &[&str] = &["[untitled]", "{title}", "TODO", "lorem ipsum"];

/// Whether a title is "already clean" and does not need an LLM rewrite.
///
/// Per SPEC_FULL §4.4 step 4 / §9: `len ≤ 80 ∧ no placeholder markers ∧ no
/// leading date-parenthesis pattern`.
pub fn title_is_clean(title: &str) -> bool {
    let stripped = strip_date_prefix(title);
    if stripped != title.trim_start() {
        // A date-parenthesis prefix was present — needs cleaning.
        return false;
    }
    if title.chars().count() > 80 {
        return false;
    }
    let lower = title.to_lowercase();
    !PLACEHOLDER_MARKERS
        .iter()
        .any(|marker| lower.contains(&marker.to_lowercase()))
}

/// Lowercase, hyphenate, and strip non-alphanumerics from a title.
///
/// Runs of non-alphanumeric characters collapse to a single hyphen; leading
/// and trailing hyphens are trimmed. Same title ⇒ same slug, always.
pub fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_was_hyphen = true; // suppress a leading hyphen
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            out.push('-');
            last_was_hyphen = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// `/YYYY/MM/{slug}` article URL.
pub fn article_url(date: NaiveDate, slug: &str) -> String {
    format!("/{:04}/{:02}/{}", date.format("%Y"), date.format("%m"), slug)
}

/// `YYYYMMDD-{slug}.md` markdown filename.
pub fn filename(date: NaiveDate, slug: &str) -> String {
    format!("{}-{}.md", date.format("%Y%m%d"), slug)
}

/// `article_{yyyymmdd}_{hhmmss}_{shortuuid}` identifier (SPEC_FULL §3).
///
/// The short-uuid component is the first 8 hex characters of a fresh v4 UUID
/// — enough to disambiguate two articles processed in the same second.
pub fn article_id(now: DateTime<Utc>) -> String {
    let short = Uuid::new_v4().simple().to_string();
    format!("article_{}_{}_{}", now.format("%Y%m%d"), now.format("%H%M%S"), &short[..8])
}

/// Append an 8-character hash suffix to a slug, for collision resolution
/// (SPEC_FULL §4.4 step 5 / scenario S2). `disambiguator` is typically the
/// `topic_id` of the colliding article.
pub fn disambiguate_slug(slug: &str, disambiguator: &str) -> String {
    let hash = crate::hash::content_hash(slug, disambiguator);
    format!("{}-{}", slug, &hash[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_title_same_slug() {
        assert_eq!(slugify("A Big Idea"), slugify("A Big Idea"));
    }

    #[test]
    fn collapses_runs_of_punctuation() {
        assert_eq!(slugify("Python 3.12 Released!!"), "python-312-released");
    }

    #[test]
    fn trims_leading_and_trailing_hyphens() {
        assert_eq!(slugify("  --Hello World--  "), "hello-world");
    }

    #[test]
    fn strips_date_prefix() {
        assert_eq!(strip_date_prefix("(15 Oct) A Big Idea"), "A Big Idea");
        assert_eq!(strip_date_prefix("No prefix here"), "No prefix here");
    }

    #[test]
    fn clean_short_title_is_clean() {
        assert!(title_is_clean("A Big Idea"));
    }

    #[test]
    fn dated_title_is_not_clean() {
        assert!(!title_is_clean("(15 Oct) A Big Idea"));
    }

    #[test]
    fn overlong_title_is_not_clean() {
        let long = "x".repeat(81);
        assert!(!title_is_clean(&long));
    }

    #[test]
    fn placeholder_title_is_not_clean() {
        assert!(!title_is_clean("[untitled] draft post"));
    }

    #[test]
    fn filename_and_url_are_deterministic() {
        let date = NaiveDate::from_ymd_opt(2024, 10, 8).unwrap();
        let slug = slugify("A Big Idea");
        assert_eq!(filename(date, &slug), "20241008-a-big-idea.md");
        assert_eq!(article_url(date, &slug), "/2024/10/a-big-idea");
    }

    #[test]
    fn article_id_embeds_the_timestamp_and_is_unique_per_call() {
        let now = chrono::DateTime::parse_from_rfc3339("2024-10-08T16:46:57Z").unwrap().with_timezone(&Utc);
        let a = article_id(now);
        let b = article_id(now);
        assert!(a.starts_with("article_20241008_164657_"));
        assert_ne!(a, b);
    }

    #[test]
    fn disambiguated_slugs_differ_by_topic() {
        let a = disambiguate_slug("python-312-released", "reddit_t1");
        let b = disambiguate_slug("python-312-released", "reddit_t2");
        assert_ne!(a, b);
        assert!(a.starts_with("python-312-released-"));
    }
}
