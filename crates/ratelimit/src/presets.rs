use std::time::Duration;

use crate::bucket::BucketParams;

/// Reddit: 30 req/min, 2.5x backoff multiplier, 600s cap (SPEC_FULL §4.3).
pub fn reddit() -> BucketParams {
    BucketParams {
        rate_per_sec: 30.0 / 60.0,
        burst: 5.0,
        backoff_multiplier: 2.5,
        initial_backoff: Duration::from_millis(500),
        max_backoff: Duration::from_secs(600),
    }
}

/// Mastodon: 60 req/min, 2.0x backoff multiplier, 300s cap.
pub fn mastodon() -> BucketParams {
    BucketParams {
        rate_per_sec: 60.0 / 60.0,
        burst: 10.0,
        backoff_multiplier: 2.0,
        initial_backoff: Duration::from_millis(500),
        max_backoff: Duration::from_secs(300),
    }
}

/// OpenAI per region: 60 req/60s, 2.0x backoff multiplier.
pub fn openai() -> BucketParams {
    BucketParams {
        rate_per_sec: 60.0 / 60.0,
        burst: 5.0,
        backoff_multiplier: 2.0,
        initial_backoff: Duration::from_millis(1000),
        max_backoff: Duration::from_secs(120),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_match_spec_rates() {
        assert!((reddit().rate_per_sec - 0.5).abs() < 1e-9);
        assert!((mastodon().rate_per_sec - 1.0).abs() < 1e-9);
        assert!((openai().rate_per_sec - 1.0).abs() < 1e-9);
        assert_eq!(reddit().max_backoff, Duration::from_secs(600));
        assert_eq!(mastodon().max_backoff, Duration::from_secs(300));
    }
}
