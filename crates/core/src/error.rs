use thiserror::Error;

/// Errors raised by the shared domain model (parsing, validation, id derivation).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown operation {operation:?} on queue {queue:?}")]
    UnknownOperation { queue: String, operation: String },

    #[error("payload missing or malformed: {0}")]
    InvalidPayload(String),

    #[error("title cannot be slugified: {0:?}")]
    UnslugifiableTitle(String),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
