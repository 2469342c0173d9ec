/// Error kinds the Processor distinguishes when deciding message disposition
/// (SPEC_FULL §7 error taxonomy, narrowed to what `handle_process_topic` can
/// produce).
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("malformed payload: {0}")]
    Validation(String),
    #[error("store error: {0}")]
    Store(#[from] pipeline_store::StoreError),
    #[error("queue error: {0}")]
    Queue(#[from] pipeline_queue::QueueError),
    #[error("llm error: {0}")]
    Llm(#[from] pipeline_llm::LlmError),
    #[error("core error: {0}")]
    Core(#[from] pipeline_core::CoreError),
}

impl ProcessorError {
    /// Validation and permanent LLM failures are poison; everything else is
    /// a transient condition worth nacking for a prompt retry.
    pub fn is_permanent(&self) -> bool {
        match self {
            ProcessorError::Validation(_) => true,
            ProcessorError::Llm(e) => !e.is_retryable(),
            ProcessorError::Store(_) | ProcessorError::Queue(_) | ProcessorError::Core(_) => false,
        }
    }
}
