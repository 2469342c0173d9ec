/// Error kinds SitePublisher distinguishes when deciding message disposition
/// (SPEC_FULL §7 error taxonomy, narrowed to what `handle_publish_site` can
/// produce).
#[derive(Debug, thiserror::Error)]
pub enum SitePublisherError {
    #[error("malformed payload: {0}")]
    Validation(String),
    #[error("store error: {0}")]
    Store(#[from] pipeline_store::StoreError),
    #[error("queue error: {0}")]
    Queue(#[from] pipeline_queue::QueueError),
    #[error("local staging i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("site generator exited with status {status}: {log}")]
    BuildFailed { status: String, log: String },
    #[error("site generator timed out after {0}s")]
    BuildTimedOut(u64),
}

impl SitePublisherError {
    /// A failed build or a staging I/O error is worth retrying on another
    /// replica (transient); a malformed payload is poison.
    pub fn is_permanent(&self) -> bool {
        matches!(self, SitePublisherError::Validation(_))
    }
}
