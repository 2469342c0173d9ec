use async_trait::async_trait;

use pipeline_queue::QueueMessage;

use crate::disposition::Disposition;

/// Per-message business logic for one worker. Implementors never see the
/// poll loop, ack/nack plumbing, or shutdown signal — only one message at a
/// time, which keeps the at-most-one-processor-per-topic guarantee local to
/// the handler's own lease logic rather than spread across this crate.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle one message. Errors are treated as [`Disposition::Nack`] by
    /// the runner unless the handler already classified the failure and
    /// returned an explicit `Ok(Disposition::Ack)` (permanent failure,
    /// already diagnosed and recorded).
    async fn handle(&self, message: QueueMessage) -> Result<Disposition, anyhow::Error>;
}
