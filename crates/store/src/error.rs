use thiserror::Error;

/// The error taxonomy callers branch on (SPEC_FULL §4.1, §7). `Conflict` is
/// deliberately not an I/O error variant wrapper — it is the expected result
/// of a lost lease race and callers must be able to match it without string
/// inspection.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("conditional create lost the race: {0}")]
    Conflict(String),

    #[error("transient I/O error: {0}")]
    TransientIo(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("core error: {0}")]
    Core(#[from] pipeline_core::CoreError),
}

impl From<object_store::Error> for StoreError {
    fn from(err: object_store::Error) -> Self {
        match &err {
            object_store::Error::NotFound { path, .. } => StoreError::NotFound(path.clone()),
            object_store::Error::AlreadyExists { path, .. } => StoreError::Conflict(path.clone()),
            object_store::Error::PermissionDenied { path, .. } => {
                StoreError::PermissionDenied(path.clone())
            }
            object_store::Error::NotImplemented => {
                StoreError::TransientIo("operation not implemented by backend".into())
            }
            other => StoreError::TransientIo(other.to_string()),
        }
    }
}
