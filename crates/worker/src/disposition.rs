/// What the poll loop should do with a message after a handler runs
/// (SPEC_FULL §7 error taxonomy mapped onto the queue loop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed successfully, or a lease/lock conflict (contention is not
    /// an error — the other replica owns the work). Delete the message.
    Ack,
    /// Transient failure. Return the message to the queue immediately
    /// (visibility timeout reset to 0) so it can be retried sooner.
    Nack,
    /// Shutdown signal arrived mid-handle. Leave the message untouched —
    /// it reappears once its visibility timeout naturally expires.
    Leave,
}
