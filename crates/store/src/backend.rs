use std::path::PathBuf;
use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::ObjectStore;
use tracing::info;

use pipeline_core::config::{AwsConfig, StoreConfig};

use crate::error::StoreError;

/// Unified storage backend wrapping object_store.
pub enum StorageBackend {
    Local(LocalBackend),
    S3(S3Backend),
}

impl StorageBackend {
    /// Build a backend from config: S3 when the backend is configured for it
    /// and AWS credentials are present, local filesystem otherwise.
    pub fn from_config(store: &StoreConfig, aws: &AwsConfig) -> Result<Self, StoreError> {
        if store.backend == "s3" {
            return Ok(StorageBackend::S3(S3Backend::new(store, aws)?));
        }
        Ok(StorageBackend::Local(LocalBackend::new(&PathBuf::from(
            &store.local_root,
        ))?))
    }

    pub fn store(&self) -> &dyn ObjectStore {
        match self {
            StorageBackend::Local(b) => b.store.as_ref(),
            StorageBackend::S3(b) => b.store.as_ref(),
        }
    }

    pub fn store_arc(&self) -> Arc<dyn ObjectStore> {
        match self {
            StorageBackend::Local(b) => b.store.clone(),
            StorageBackend::S3(b) => b.store.clone(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, StorageBackend::S3(_))
    }

    /// Key prefix applied ahead of every path (e.g. "production/").
    pub fn prefix(&self) -> &str {
        match self {
            StorageBackend::Local(_) => "",
            StorageBackend::S3(b) => &b.prefix,
        }
    }
}

pub struct LocalBackend {
    pub store: Arc<dyn ObjectStore>,
    pub data_dir: PathBuf,
}

impl LocalBackend {
    pub fn new(data_dir: &std::path::Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| StoreError::TransientIo(format!("creating data dir: {e}")))?;
        let canonical = std::fs::canonicalize(data_dir).unwrap_or_else(|_| data_dir.to_path_buf());
        let store = LocalFileSystem::new_with_prefix(&canonical)
            .map_err(|e| StoreError::TransientIo(format!("local filesystem error: {e}")))?;
        info!("store: local backend at {}", canonical.display());
        Ok(Self {
            store: Arc::new(store),
            data_dir: canonical,
        })
    }
}

pub struct S3Backend {
    pub store: Arc<dyn ObjectStore>,
    pub bucket: String,
    pub prefix: String,
}

impl S3Backend {
    pub fn new(store_cfg: &StoreConfig, aws: &AwsConfig) -> Result<Self, StoreError> {
        let bucket = store_cfg
            .bucket
            .as_deref()
            .ok_or_else(|| StoreError::NotConfigured("S3_BUCKET not set".into()))?;

        let mut builder = AmazonS3Builder::new().with_region(&aws.region);

        if let Some(ref key) = aws.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(ref secret) = aws.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        if let Some(ref token) = aws.session_token {
            builder = builder.with_token(token);
        }

        if let Some(ref endpoint) = aws.endpoint_url {
            if !endpoint.is_empty() {
                let endpoint_url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
                    endpoint.clone()
                } else {
                    format!("https://{}", endpoint)
                };
                builder = builder
                    .with_bucket_name(bucket)
                    .with_endpoint(&endpoint_url)
                    .with_allow_http(endpoint_url.starts_with("http://"));
            }
        } else {
            let url = format!("s3://{}", bucket);
            builder = builder.with_url(&url);
        }

        let store = builder
            .build()
            .map_err(|e| StoreError::TransientIo(format!("building S3 client: {e}")))?;

        let prefix = store_cfg
            .prefix
            .as_deref()
            .unwrap_or("")
            .trim_end_matches('/')
            .to_string();

        info!("store: S3 backend s3://{}/{} (region: {})", bucket, prefix, aws.region);

        Ok(Self {
            store: Arc::new(store),
            bucket: bucket.to_string(),
            prefix,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_backend_creates() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(tmp.path()).unwrap();
        assert!(!StorageBackend::Local(backend).is_remote());
    }

    #[test]
    fn from_config_defaults_to_local() {
        let store_cfg = StoreConfig {
            backend: "local".into(),
            local_root: tempfile::tempdir().unwrap().path().to_string_lossy().into_owned(),
            bucket: None,
            prefix: None,
        };
        let aws = AwsConfig {
            region: "us-east-1".into(),
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            endpoint_url: None,
        };
        let backend = StorageBackend::from_config(&store_cfg, &aws).unwrap();
        assert!(!backend.is_remote());
    }
}
