use std::time::{Duration, Instant};

/// Static parameters for one token bucket (SPEC_FULL §4.3).
#[derive(Debug, Clone, Copy)]
pub struct BucketParams {
    pub rate_per_sec: f64,
    pub burst: f64,
    pub backoff_multiplier: f64,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

/// Mutable per-bucket state: current token count and any active backoff.
/// Tracks elapsed time via `Instant` with capped exponential growth on
/// repeated throttling, rather than pulling in a third-party rate-limiting
/// crate for what's a small, fully-owned state machine.
pub struct BucketState {
    params: BucketParams,
    tokens: f64,
    last_refill: Instant,
    backoff: Duration,
    backoff_until: Option<Instant>,
}

impl BucketState {
    pub fn new(params: BucketParams) -> Self {
        Self {
            tokens: params.burst,
            last_refill: Instant::now(),
            backoff: Duration::ZERO,
            backoff_until: None,
            params,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.params.rate_per_sec).min(self.params.burst);
        self.last_refill = now;
    }

    /// How long the caller must wait before a token is available and any
    /// active backoff has elapsed. Zero means "acquire now".
    pub fn wait_duration(&mut self, now: Instant) -> Duration {
        self.refill(now);

        let backoff_wait = match self.backoff_until {
            Some(until) if until > now => until - now,
            _ => Duration::ZERO,
        };

        let token_wait = if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            let deficit = 1.0 - self.tokens;
            Duration::from_secs_f64(deficit / self.params.rate_per_sec)
        };

        backoff_wait.max(token_wait)
    }

    /// Consume a token. Caller must have already waited out `wait_duration`.
    pub fn consume(&mut self, now: Instant) {
        self.refill(now);
        self.tokens = (self.tokens - 1.0).max(0.0);
    }

    /// Grow the backoff after a throttling response, per §4.3:
    /// `backoff *= multiplier`, capped at `max_backoff`; if the response
    /// advertised a `retry_after`, use `max(new_backoff, retry_after)`.
    pub fn note_throttled(&mut self, now: Instant, retry_after: Option<Duration>) {
        let grown = if self.backoff.is_zero() {
            self.params.initial_backoff
        } else {
            self.backoff.mul_f64(self.params.backoff_multiplier)
        };
        let capped = grown.min(self.params.max_backoff);
        self.backoff = match retry_after {
            Some(ra) => capped.max(ra),
            None => capped,
        };
        self.backoff_until = Some(now + self.backoff);
    }

    /// Reset backoff to zero after a successful call.
    pub fn note_success(&mut self) {
        self.backoff = Duration::ZERO;
        self.backoff_until = None;
    }

    pub fn current_backoff(&self) -> Duration {
        self.backoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BucketParams {
        BucketParams {
            rate_per_sec: 1.0,
            burst: 2.0,
            backoff_multiplier: 2.0,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }

    #[test]
    fn burst_tokens_are_immediately_available() {
        let mut bucket = BucketState::new(params());
        let now = Instant::now();
        assert_eq!(bucket.wait_duration(now), Duration::ZERO);
        bucket.consume(now);
        assert_eq!(bucket.wait_duration(now), Duration::ZERO);
        bucket.consume(now);
        // Burst exhausted — third token requires waiting for refill.
        assert!(bucket.wait_duration(now) > Duration::ZERO);
    }

    #[test]
    fn throttle_grows_backoff_multiplicatively() {
        let mut bucket = BucketState::new(params());
        let now = Instant::now();
        bucket.note_throttled(now, None);
        assert_eq!(bucket.current_backoff(), Duration::from_millis(500));
        bucket.note_throttled(now, None);
        assert_eq!(bucket.current_backoff(), Duration::from_millis(1000));
    }

    #[test]
    fn throttle_respects_retry_after_floor() {
        let mut bucket = BucketState::new(params());
        let now = Instant::now();
        bucket.note_throttled(now, Some(Duration::from_secs(5)));
        assert_eq!(bucket.current_backoff(), Duration::from_secs(5));
    }

    #[test]
    fn backoff_is_capped_at_max() {
        let mut bucket = BucketState::new(params());
        let now = Instant::now();
        for _ in 0..20 {
            bucket.note_throttled(now, None);
        }
        assert_eq!(bucket.current_backoff(), Duration::from_secs(30));
    }

    #[test]
    fn success_resets_backoff() {
        let mut bucket = BucketState::new(params());
        let now = Instant::now();
        bucket.note_throttled(now, None);
        assert!(bucket.current_backoff() > Duration::ZERO);
        bucket.note_success();
        assert_eq!(bucket.current_backoff(), Duration::ZERO);
        assert_eq!(bucket.wait_duration(now), Duration::ZERO);
    }
}
