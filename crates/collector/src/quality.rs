//! Pure, stateless quality gate (SPEC_FULL §4.5).

use pipeline_core::collection::CollectionItem;

/// Curated technical keyword set for `check_technical_relevance`'s strict mode.
const TECH_KEYWORDS: &[&str] = &[
    "rust", "python", "javascript", "typescript", "golang", "kubernetes", "docker",
    "api", "database", "algorithm", "framework", "open source", "open-source", "linux",
    "security", "cloud", "machine learning", "artificial intelligence", " ai ", "compiler",
    "programming", "software", "devops", "infrastructure", "microservice", "container",
    "encryption", "vulnerability", "performance", "benchmark", "protocol", "networking",
];

/// Required fields present and typed correctly. Source readers already
/// guarantee typing (everything is already a `CollectionItem`), so this
/// checks only the fields that standardisation cannot itself guarantee are
/// non-empty.
pub fn validate_item(item: &CollectionItem) -> Result<(), &'static str> {
    if item.id.trim().is_empty() {
        return Err("missing_id");
    }
    if item.title.trim().is_empty() {
        return Err("missing_title");
    }
    if item.source_url.trim().is_empty() {
        return Err("missing_source_url");
    }
    Ok(())
}

/// Title length ≥ 10 chars, body length ≥ 100 chars.
pub fn check_readability(item: &CollectionItem) -> bool {
    item.title.chars().count() >= 10 && item.content.chars().count() >= 100
}

/// In strict mode, require one of the curated keywords in title+content; in
/// permissive mode, always pass.
pub fn check_technical_relevance(item: &CollectionItem, strict_mode: bool) -> bool {
    if !strict_mode {
        return true;
    }
    let haystack = format!(" {} {} ", item.title, item.content).to_lowercase();
    TECH_KEYWORDS.iter().any(|kw| haystack.contains(kw))
}

/// Run the full gate in order, short-circuiting on the first failure.
/// Returns `(pass, reason)` — `reason` is `None` iff `pass` is `true`.
pub fn quality_gate(item: &CollectionItem, strict_mode: bool) -> (bool, Option<&'static str>) {
    if let Err(reason) = validate_item(item) {
        return (false, Some(reason));
    }
    if !check_readability(item) {
        return (false, Some("failed_readability"));
    }
    if !check_technical_relevance(item, strict_mode) {
        return (false, Some("failed_technical_relevance"));
    }
    (true, None)
}
