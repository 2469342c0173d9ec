//! Priority-score heuristic (SPEC_FULL §9 resolved Open Question):
//! `0.5 × engagement + 0.3 × recency + 0.2 × source_signal`, each sub-score
//! clamped to `[0, 1]` before blending, final result clamped to `[0, 1]`.

use chrono::{DateTime, Utc};

use pipeline_core::collection::{CollectionItem, Source};

/// Combined upvotes/boosts + comments/favourites beyond this saturates
/// engagement to 1.0. A tuning constant, not derived from any source API.
const ENGAGEMENT_SATURATION: f64 = 500.0;

/// Half-life for the exponential recency decay.
const RECENCY_HALF_LIFE_HOURS: f64 = 24.0;

fn engagement_normalized(item: &CollectionItem) -> f64 {
    let primary = item.upvotes.or(item.boosts).unwrap_or(0) as f64;
    let secondary = item.comments.or(item.favourites).unwrap_or(0) as f64;
    ((primary + secondary) / ENGAGEMENT_SATURATION).clamp(0.0, 1.0)
}

fn recency_normalized(item: &CollectionItem, now: DateTime<Utc>) -> f64 {
    let created = item
        .created_utc
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .unwrap_or(item.collected_at);
    let age_hours = (now - created).num_seconds().max(0) as f64 / 3600.0;
    0.5f64.powf(age_hours / RECENCY_HALF_LIFE_HOURS).clamp(0.0, 1.0)
}

/// A coarse per-source trust prior — distinct sources are not directly
/// comparable in engagement scale, so this nudges the blend rather than
/// dominating it (weight 0.2).
fn source_signal_normalized(source: Source) -> f64 {
    match source {
        Source::Reddit => 0.7,
        Source::Mastodon => 0.6,
        Source::Rss => 0.5,
    }
}

pub fn priority_score(item: &CollectionItem) -> f64 {
    priority_score_at(item, Utc::now())
}

fn priority_score_at(item: &CollectionItem, now: DateTime<Utc>) -> f64 {
    let blend = 0.5 * engagement_normalized(item)
        + 0.3 * recency_normalized(item, now)
        + 0.2 * source_signal_normalized(item.source);
    blend.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(upvotes: Option<u64>, comments: Option<u64>, created_utc: Option<i64>) -> CollectionItem {
        CollectionItem {
            id: "abc123".into(),
            title: "A Big Idea".into(),
            content: "Body text.".into(),
            source: Source::Reddit,
            source_url: "https://reddit.com/r/rust/abc123".into(),
            collected_at: Utc::now(),
            content_hash: "deadbeef".into(),
            subreddit: None,
            upvotes,
            comments,
            boosts: None,
            favourites: None,
            created_utc,
        }
    }

    #[test]
    fn score_is_always_in_unit_range() {
        let huge = item(Some(1_000_000), Some(1_000_000), Some(0));
        assert!((0.0..=1.0).contains(&priority_score(&huge)));
        let empty = item(None, None, None);
        assert!((0.0..=1.0).contains(&priority_score(&empty)));
    }

    #[test]
    fn higher_engagement_scores_higher() {
        let now = Utc::now();
        let low = item(Some(1), Some(0), Some(now.timestamp()));
        let high = item(Some(500), Some(100), Some(now.timestamp()));
        assert!(priority_score_at(&high, now) > priority_score_at(&low, now));
    }

    #[test]
    fn older_items_score_lower_at_equal_engagement() {
        let now = Utc::now();
        let fresh = item(Some(100), Some(10), Some(now.timestamp()));
        let stale_ts = (now - Duration::hours(72)).timestamp();
        let stale = item(Some(100), Some(10), Some(stale_ts));
        assert!(priority_score_at(&fresh, now) > priority_score_at(&stale, now));
    }

    #[test]
    fn missing_created_utc_falls_back_to_collected_at() {
        let mut recent = item(Some(10), Some(1), None);
        recent.collected_at = Utc::now();
        assert!(priority_score(&recent) > 0.0);
    }
}
