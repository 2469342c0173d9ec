//! Pure quality-score computation (SPEC_FULL §4.4 step 6).

const TARGET_MIN_WORDS: usize = 600;
const TARGET_MAX_WORDS: usize = 2000;

/// Word-count contribution: 0 below/above a generous band around the target
/// range, 1.0 inside `[TARGET_MIN_WORDS, TARGET_MAX_WORDS]`, linearly ramped
/// on either side.
fn word_count_score(word_count: usize) -> f64 {
    if word_count >= TARGET_MIN_WORDS && word_count <= TARGET_MAX_WORDS {
        return 1.0;
    }
    if word_count < TARGET_MIN_WORDS {
        return (word_count as f64 / TARGET_MIN_WORDS as f64).clamp(0.0, 1.0);
    }
    // Above target: decay back to 0 by 2x the target max.
    let overshoot = word_count - TARGET_MAX_WORDS;
    let span = TARGET_MAX_WORDS as f64;
    (1.0 - overshoot as f64 / span).clamp(0.0, 1.0)
}

/// Whether the body shows structural markers: headings and multiple paragraphs.
fn has_structure(content: &str) -> bool {
    let has_heading = content.lines().any(|l| l.trim_start().starts_with('#'));
    let paragraph_count = content.split("\n\n").filter(|p| !p.trim().is_empty()).count();
    has_heading && paragraph_count >= 2
}

/// Raw word count, exposed separately so the Processor can persist it on
/// `ProcessedArticle::word_count` without recomputing it ad hoc elsewhere.
pub fn word_count(content: &str) -> usize {
    content.split_whitespace().count()
}

/// Blend word count, structure, and source signal into `[0, 1]`.
///
/// `source_signal` is the topic's already-normalized engagement blend
/// (`TopicMetadata::priority_score`, §9) — the Processor never re-derives
/// engagement from raw counts, the Collector already did that once.
pub fn quality_score(content: &str, source_signal: f64) -> f64 {
    let structure_score = if has_structure(content) { 1.0 } else { 0.4 };
    let blend = 0.5 * word_count_score(word_count(content))
        + 0.3 * structure_score
        + 0.2 * source_signal.clamp(0.0, 1.0);
    blend.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_band_word_count_scores_maximally() {
        let content = "word ".repeat(1000);
        assert_eq!(word_count_score(content.split_whitespace().count()), 1.0);
    }

    #[test]
    fn short_content_scores_below_one() {
        let short = "too short";
        let full = format!("# Heading\n\n{short}\n\nMore text here.");
        let score = quality_score(&full, 0.5);
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn structured_content_outscores_flat_content() {
        let body = "word ".repeat(900);
        let structured = format!("# Title\n\n{body}\n\nConclusion paragraph.");
        let flat = body.clone();
        assert!(quality_score(&structured, 0.5) > quality_score(&flat, 0.5));
    }

    #[test]
    fn higher_engagement_raises_score() {
        let body = "word ".repeat(900);
        let content = format!("# Title\n\n{body}\n\nConclusion paragraph.");
        assert!(quality_score(&content, 1.0) > quality_score(&content, 0.0));
    }

    #[test]
    fn score_is_always_in_unit_range() {
        assert!((0.0..=1.0).contains(&quality_score("", 0.5)));
        let huge = "word ".repeat(10_000);
        assert!((0.0..=1.0).contains(&quality_score(&huge, 1.0)));
    }
}
