pub mod backend;
pub mod client;
pub mod error;

pub use backend::{LocalBackend, S3Backend, StorageBackend};
pub use client::StoreClient;
pub use error::StoreError;
