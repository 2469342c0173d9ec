/// Error kinds the Collector distinguishes (SPEC_FULL §7, narrowed to what
/// source reading and fan-out can produce). Quality-gate rejections are not
/// errors — they are counted outcomes handled entirely inside `quality.rs`.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("source '{0}' throttled")]
    Throttled(String),
    #[error("source read failed: {0}")]
    Source(String),
    #[error("feed parse failed: {0}")]
    FeedParse(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store error: {0}")]
    Store(#[from] pipeline_store::StoreError),
    #[error("queue error: {0}")]
    Queue(#[from] pipeline_queue::QueueError),
    #[error("core error: {0}")]
    Core(#[from] pipeline_core::CoreError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unknown source template: {0}")]
    UnknownTemplate(String),
}

impl CollectorError {
    /// Unknown templates and bad requests are poison — retrying a wake-up
    /// message won't fix a typo in its `template_name`. Everything else
    /// (network blips, store/queue hiccups) is worth a prompt retry.
    pub fn is_permanent(&self) -> bool {
        matches!(self, CollectorError::UnknownTemplate(_) | CollectorError::BadRequest(_))
    }
}
