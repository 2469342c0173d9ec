use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A chat message for the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A completed chat response with the token usage the provider billed for.
///
/// `prompt_tokens`/`completion_tokens` feed directly into
/// [`pipeline_core::article::ArticleCosts`] — the Processor never estimates
/// tokens itself, it only accumulates what the provider reports.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Trait for LLM providers — each backend implements this.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request and return the assistant's response
    /// along with the token usage billed for the call.
    ///
    /// Implementations MUST return [`LlmError::RateLimited`] for HTTP 429 /
    /// provider-throttling responses specifically (not folded into
    /// `ApiError`) so callers can route it to the rate limiter's
    /// `note_throttled` without string-matching a status code.
    async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Completion, LlmError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("rate limited (retry_after={retry_after_secs:?}): {body}")]
    RateLimited {
        retry_after_secs: Option<u64>,
        body: String,
    },
    #[error("API error: {status} — {body}")]
    ApiError { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    ParseError(String),
    #[error("provider not configured: {0}")]
    NotConfigured(String),
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl LlmError {
    /// Whether a retry is worth attempting (§7: Throttling and Transient I/O
    /// are retried; NotConfigured/ParseError/non-429 4xx are not).
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } => true,
            LlmError::HttpError(e) => e.is_timeout() || e.is_connect(),
            LlmError::Timeout(_) => true,
            LlmError::ApiError { status, .. } => *status >= 500,
            LlmError::ParseError(_) | LlmError::NotConfigured(_) => false,
        }
    }
}
