/// Error kinds MarkdownGen distinguishes when deciding message disposition
/// (SPEC_FULL §7, narrowed to what `handle_generate_markdown` can produce).
#[derive(Debug, thiserror::Error)]
pub enum MarkdownGenError {
    #[error("malformed payload: {0}")]
    Validation(String),
    #[error("referenced article blob is missing: {0}")]
    MissingArticle(String),
    #[error("unsupported content_type for markdown rendering: {0}")]
    UnsupportedContentType(String),
    #[error("store error: {0}")]
    Store(#[from] pipeline_store::StoreError),
    #[error("queue error: {0}")]
    Queue(#[from] pipeline_queue::QueueError),
    #[error("core error: {0}")]
    Core(#[from] pipeline_core::CoreError),
}

impl MarkdownGenError {
    /// Missing articles and unsupported content types are poison: retrying
    /// won't make the Processor's output appear or change its shape.
    /// Everything else is a transient store/queue condition worth retrying.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            MarkdownGenError::Validation(_)
                | MarkdownGenError::MissingArticle(_)
                | MarkdownGenError::UnsupportedContentType(_)
        )
    }
}
