pub mod provider;
pub mod providers;
pub mod rewrite;

pub use provider::{Completion, LlmError, LlmProvider, Message, Role};
pub use providers::create_provider;
pub use rewrite::{rewrite_article, RewriteInput, RewriteOutcome};
