//! Rewrite prompt construction and retry/backoff wrapper used by the
//! Processor (SPEC_FULL §4.4 steps 3-4).

use std::time::Duration;

use pipeline_core::slug::{strip_date_prefix, title_is_clean};
use pipeline_ratelimit::RateLimiter;

use crate::provider::{Completion, LlmError, LlmProvider, Message, Role};

/// What the Processor already knows about a topic before rewriting it.
pub struct RewriteInput<'a> {
    pub title: &'a str,
    pub source: &'a str,
    pub content: &'a str,
}

/// The rewritten body plus the (possibly untouched) title, with cost split
/// out per step so the Processor can attribute zero cost to a title it kept
/// as-is.
#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    pub title: String,
    pub title_was_rewritten: bool,
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

const MAX_THROTTLE_RETRIES: u32 = 3;
const MAX_TRANSIENT_RETRIES: u32 = 2;
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

fn rewrite_prompt(input: &RewriteInput) -> Vec<Message> {
    vec![
        Message {
            role: Role::System,
            content: "You rewrite short-form posts into well-structured technical articles. \
                      Keep the author's meaning and factual claims; do not invent details. \
                      Respond with the article body only, no preamble."
                .to_string(),
        },
        Message {
            role: Role::User,
            content: format!(
                "Source: {}\nOriginal title: {}\n\nOriginal content:\n{}\n\n\
                 Rewrite this into a clear, well-organized article body.",
                input.source, input.title, input.content
            ),
        },
    ]
}

fn title_prompt(title: &str) -> Vec<Message> {
    vec![
        Message {
            role: Role::System,
            content: "You write short, clean article titles. Respond with the title only, \
                      no quotes, no trailing punctuation beyond what the title needs."
                .to_string(),
        },
        Message {
            role: Role::User,
            content: format!("Clean up this title for publication: {}", title),
        },
    ]
}

/// Call `provider.complete` under `limiter`, honoring SPEC_FULL §4.4 step 3's
/// retry policy: throttling retries under the limiter's own backoff, other
/// transient errors retry with a short jittered sleep, everything else is
/// surfaced immediately.
async fn complete_with_retry(
    provider: &dyn LlmProvider,
    limiter: &RateLimiter,
    region: &str,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
) -> Result<Completion, LlmError> {
    let mut throttle_attempts = 0u32;
    let mut transient_attempts = 0u32;

    loop {
        limiter.acquire(region, "openai").await;

        let call = tokio::time::timeout(
            DEFAULT_CALL_TIMEOUT,
            provider.complete(messages.clone(), temperature, max_tokens),
        )
        .await;

        let result = match call {
            Ok(inner) => inner,
            Err(_) => Err(LlmError::Timeout(DEFAULT_CALL_TIMEOUT)),
        };

        match result {
            Ok(completion) => {
                limiter.note_success(region, "openai").await;
                return Ok(completion);
            }
            Err(LlmError::RateLimited { retry_after_secs, body }) => {
                throttle_attempts += 1;
                limiter
                    .note_throttled(region, "openai", retry_after_secs.map(Duration::from_secs))
                    .await;
                if throttle_attempts >= MAX_THROTTLE_RETRIES {
                    return Err(LlmError::RateLimited { retry_after_secs, body });
                }
            }
            Err(err) if err.is_retryable() => {
                transient_attempts += 1;
                if transient_attempts >= MAX_TRANSIENT_RETRIES {
                    return Err(err);
                }
                let jitter_ms = 250 * (transient_attempts as u64 + 1);
                tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Rewrite a topic's content and, if needed, its title. Title cleaning is a
/// pure short-circuit (SPEC_FULL §4.4 step 4 / §9): a title that is already
/// short and placeholder-free keeps its zero-cost path.
pub async fn rewrite_article(
    provider: &dyn LlmProvider,
    limiter: &RateLimiter,
    region: &str,
    input: RewriteInput<'_>,
    temperature: f32,
    max_tokens: u32,
) -> Result<RewriteOutcome, LlmError> {
    let body = complete_with_retry(
        provider,
        limiter,
        region,
        rewrite_prompt(&input),
        temperature,
        max_tokens,
    )
    .await?;

    let stripped = strip_date_prefix(input.title);
    let (title, title_was_rewritten, title_prompt_tokens, title_completion_tokens) =
        if title_is_clean(input.title) {
            (input.title.to_string(), false, 0, 0)
        } else {
            let rewritten = complete_with_retry(
                provider,
                limiter,
                region,
                title_prompt(stripped),
                temperature,
                64,
            )
            .await?;
            (
                rewritten.content.trim().to_string(),
                true,
                rewritten.prompt_tokens,
                rewritten.completion_tokens,
            )
        };

    Ok(RewriteOutcome {
        title,
        title_was_rewritten,
        content: body.content,
        prompt_tokens: body.prompt_tokens + title_prompt_tokens,
        completion_tokens: body.completion_tokens + title_completion_tokens,
    })
}

/// Per-model USD pricing, $/1K tokens, used to populate
/// [`pipeline_core::article::ArticleCosts::estimated_cost_usd`]. Unknown
/// models fall back to the `gpt-4o-mini` rate as a conservative estimate.
pub fn estimate_cost_usd(model: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
    let (prompt_rate, completion_rate) = match model {
        "gpt-4o" => (0.0025, 0.010),
        "gpt-4o-mini" => (0.00015, 0.0006),
        "claude-3-5-sonnet-latest" => (0.003, 0.015),
        "claude-3-5-haiku-latest" => (0.0008, 0.004),
        _ => (0.00015, 0.0006),
    };
    (prompt_tokens as f64 / 1000.0) * prompt_rate + (completion_tokens as f64 / 1000.0) * completion_rate
}
