use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_f64(profile: &str, key: &str, default: f64) -> f64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub store: StoreConfig,
    pub aws: AwsConfig,
    pub queue: QueueConfig,
    pub llm: LlmConfig,
    pub collector: CollectorConfig,
    pub rate_limit: RateLimitConfig,
    pub limits: LimitsConfig,
    pub site: SitePublisherConfig,
}

/// Well-known env keys that identify a profile when prefixed.
const PROFILE_MARKER_KEYS: &[&str] = &[
    "AWS_ACCESS_KEY_ID",
    "S3_BUCKET",
    "OPENAI_API_KEY",
    "SQS_QUEUE_PREFIX",
];

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `PIPELINE_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env::var("PIPELINE_PROFILE").unwrap_or_default().to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            store: StoreConfig::from_env_profiled(p),
            aws: AwsConfig::from_env_profiled(p),
            queue: QueueConfig::from_env_profiled(p),
            llm: LlmConfig::from_env_profiled(p),
            collector: CollectorConfig::from_env_profiled(p),
            rate_limit: RateLimitConfig::from_env_profiled(p),
            limits: LimitsConfig::from_env_profiled(p),
            site: SitePublisherConfig::from_env_profiled(p),
        }
    }

    /// Discover available profiles by scanning env vars for `{PREFIX}_{MARKER_KEY}` patterns.
    /// Always includes "default" (the unprefixed config).
    pub fn available_profiles() -> Vec<String> {
        let mut profiles = std::collections::BTreeSet::new();
        profiles.insert("default".to_string());

        for (key, _) in env::vars() {
            for marker in PROFILE_MARKER_KEYS {
                if let Some(prefix) = key.strip_suffix(&format!("_{}", marker)) {
                    if !prefix.is_empty()
                        && prefix.chars().all(|c| c.is_ascii_uppercase() || c == '_')
                    {
                        profiles.insert(prefix.to_string());
                    }
                }
            }
        }

        profiles.into_iter().collect()
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  store:       backend={}, bucket={}", self.store.backend, self.store.bucket.as_deref().unwrap_or("(local)"));
        tracing::info!("  aws:         region={}", self.aws.region);
        tracing::info!("  queue:       prefix={}", self.queue.queue_prefix);
        tracing::info!("  llm:         provider={}", self.llm.provider);
        tracing::info!("  collector:   sources={:?}", self.collector.sources);
        tracing::info!("  site:        generator={}, theme_dir={}", self.site.generator_bin, self.site.theme_dir);
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "store": {
                "backend": self.store.backend,
                "bucket": self.store.bucket,
                "configured": self.store.is_configured(),
            },
            "aws": {
                "region": self.aws.region,
                "configured": self.aws.is_configured(),
            },
            "queue": {
                "queue_prefix": self.queue.queue_prefix,
                "visibility_timeout_secs": self.queue.visibility_timeout_secs,
                "max_receive_count": self.queue.max_receive_count,
            },
            "llm": {
                "provider": self.llm.provider,
                "configured": self.llm.is_configured(),
            },
            "collector": { "sources": self.collector.sources, "poll_interval_secs": self.collector.poll_interval_secs },
            "rate_limit": { "requests_per_minute": self.rate_limit.requests_per_minute },
        })
    }
}

// ── Object store ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "local" or "s3"
    pub backend: String,
    pub local_root: String,
    pub bucket: Option<String>,
    pub prefix: Option<String>,
}

impl StoreConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            backend: profiled_env_or(p, "STORE_BACKEND", "local"),
            local_root: profiled_env_or(p, "STORE_LOCAL_ROOT", "data/store"),
            bucket: profiled_env_opt(p, "S3_BUCKET"),
            prefix: profiled_env_opt(p, "S3_PREFIX"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.backend != "s3" || self.bucket.is_some()
    }
}

// ── AWS ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub endpoint_url: Option<String>,
}

impl AwsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            region: profiled_env_or(p, "AWS_REGION", "us-east-1"),
            access_key_id: profiled_env_opt(p, "AWS_ACCESS_KEY_ID"),
            secret_access_key: profiled_env_opt(p, "AWS_SECRET_ACCESS_KEY"),
            session_token: profiled_env_opt(p, "AWS_SESSION_TOKEN"),
            endpoint_url: profiled_env_opt(p, "AWS_ENDPOINT_URL"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.access_key_id.is_some()
    }
}

// ── Queue (SQS FIFO) ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub queue_prefix: String,
    pub visibility_timeout_secs: u32,
    pub max_receive_count: u32,
    pub wait_time_secs: u32,
    pub dlq_suffix: String,
}

impl QueueConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            queue_prefix: profiled_env_or(p, "SQS_QUEUE_PREFIX", "content-pipeline"),
            visibility_timeout_secs: profiled_env_u32(p, "QUEUE_VISIBILITY_TIMEOUT_SECS", 120),
            max_receive_count: profiled_env_u32(p, "QUEUE_MAX_RECEIVE_COUNT", 5),
            wait_time_secs: profiled_env_u32(p, "QUEUE_WAIT_TIME_SECS", 20),
            dlq_suffix: profiled_env_or(p, "QUEUE_DLQ_SUFFIX", "-dlq"),
        }
    }

    pub fn queue_url_name(&self, queue: crate::envelope::Queue) -> String {
        format!("{}-{}.fifo", self.queue_prefix, queue.as_str())
    }
}

// ── LLM ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai" or "anthropic"/"claude".
    pub provider: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    /// Key used alongside source when bucketing the rate limiter (SPEC_FULL §4.3).
    pub region: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl LlmConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            provider: profiled_env_or(p, "LLM_PROVIDER", "openai"),
            openai_api_key: profiled_env_opt(p, "OPENAI_API_KEY"),
            openai_model: profiled_env_or(p, "OPENAI_MODEL", "gpt-4o-mini"),
            openai_base_url: profiled_env_opt(p, "OPENAI_BASE_URL"),
            anthropic_api_key: profiled_env_opt(p, "ANTHROPIC_API_KEY"),
            anthropic_model: profiled_env_or(p, "ANTHROPIC_MODEL", "claude-3-5-haiku-latest"),
            region: profiled_env_or(p, "LLM_REGION", "default"),
            temperature: profiled_env_or(p, "LLM_TEMPERATURE", "0.3")
                .parse()
                .unwrap_or(0.3),
            max_tokens: profiled_env_u32(p, "LLM_MAX_TOKENS", 1024),
            request_timeout_secs: profiled_env_u64(p, "LLM_REQUEST_TIMEOUT_SECS", 30),
        }
    }

    pub fn is_configured(&self) -> bool {
        match self.provider.as_str() {
            "openai" => self.openai_api_key.is_some(),
            "anthropic" | "claude" => self.anthropic_api_key.is_some(),
            _ => false,
        }
    }

    /// Fixture for unit tests in dependent crates that need a filled-in config.
    pub fn default_for_test() -> Self {
        Self {
            provider: "openai".to_string(),
            openai_api_key: Some("test-key".to_string()),
            openai_model: "gpt-4o-mini".to_string(),
            openai_base_url: None,
            anthropic_api_key: Some("test-key".to_string()),
            anthropic_model: "claude-3-5-haiku-latest".to_string(),
            region: "default".to_string(),
            temperature: 0.3,
            max_tokens: 1024,
            request_timeout_secs: 30,
        }
    }
}

// ── Collector ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Comma-separated source configs, e.g. "reddit:rust,mastodon:fosstodon.org".
    pub sources: Vec<String>,
    pub poll_interval_secs: u64,
    pub min_content_length: u32,
    pub min_score_threshold: f64,
    /// Per-run wall clock cap in seconds (SPEC_FULL §5).
    pub run_cap_secs: u64,
    /// Max items fanned out per configured source per run, absent an
    /// explicit `max_items` in the triggering template/request.
    pub default_max_items: usize,
    /// Dedup window in days (SPEC_FULL §4.5).
    pub dedup_window_days: i64,
    /// Static API key required on the manual `POST /collect` trigger
    /// (SPEC_FULL §6); unset disables the endpoint's auth check entirely,
    /// which is only appropriate for local testing.
    pub api_key: Option<String>,
    pub http_port: u16,
}

impl CollectorConfig {
    fn from_env_profiled(p: &str) -> Self {
        let raw = profiled_env_or(p, "COLLECTOR_SOURCES", "reddit:rust");
        Self {
            sources: raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            poll_interval_secs: profiled_env_u64(p, "COLLECTOR_POLL_INTERVAL_SECS", 300),
            min_content_length: profiled_env_u32(p, "COLLECTOR_MIN_CONTENT_LENGTH", 200),
            min_score_threshold: profiled_env_f64(p, "COLLECTOR_MIN_SCORE_THRESHOLD", 0.3),
            run_cap_secs: profiled_env_u64(p, "COLLECTOR_RUN_CAP_SECS", 1800),
            default_max_items: profiled_env_u32(p, "COLLECTOR_DEFAULT_MAX_ITEMS", 50) as usize,
            dedup_window_days: profiled_env_u64(p, "COLLECTOR_DEDUP_WINDOW_DAYS", 14) as i64,
            api_key: profiled_env_opt(p, "COLLECTOR_API_KEY"),
            http_port: profiled_env_u32(p, "COLLECTOR_HTTP_PORT", 8081) as u16,
        }
    }
}

// ── Rate limiting ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl RateLimitConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            requests_per_minute: profiled_env_u32(p, "RATE_LIMIT_RPM", 60),
            burst: profiled_env_u32(p, "RATE_LIMIT_BURST", 5),
            initial_backoff_ms: profiled_env_u64(p, "RATE_LIMIT_INITIAL_BACKOFF_MS", 500),
            max_backoff_ms: profiled_env_u64(p, "RATE_LIMIT_MAX_BACKOFF_MS", 30_000),
        }
    }
}

// ── Processing limits ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub lease_ttl_secs: i64,
    pub max_attempt_count: u32,
    pub max_articles_per_publish: u32,
}

impl LimitsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            lease_ttl_secs: profiled_env_u64(p, "LEASE_TTL_SECS", 900) as i64,
            max_attempt_count: profiled_env_u32(p, "MAX_ATTEMPT_COUNT", 3),
            max_articles_per_publish: profiled_env_u32(p, "MAX_ARTICLES_PER_PUBLISH", 50),
        }
    }
}

// ── Site build ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitePublisherConfig {
    /// Static-site-generator binary invoked as a subprocess (SPEC_FULL §4.7).
    pub generator_bin: String,
    /// Directory holding the Hugo-compatible theme and config baked into
    /// the deployment container, copied into each build's staging dir.
    pub theme_dir: String,
    pub build_timeout_secs: u64,
}

impl SitePublisherConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            generator_bin: profiled_env_or(p, "SITE_GENERATOR_BIN", "hugo"),
            theme_dir: profiled_env_or(p, "SITE_THEME_DIR", "site-theme"),
            build_timeout_secs: profiled_env_u64(p, "SITE_BUILD_TIMEOUT_SECS", 300),
        }
    }
}
