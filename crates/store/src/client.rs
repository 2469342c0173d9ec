use bytes::Bytes;
use futures::StreamExt;
use object_store::{
    path::Path as ObjectPath, Attribute, AttributeValue, Attributes, PutMode, PutOptions, PutPayload,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::backend::StorageBackend;
use crate::error::StoreError;

/// A "container" is a logical namespace (e.g. `"topics"`, `"articles"`,
/// `"locks"`) joined with the backend's key prefix and the caller-supplied
/// path to form the final object key (SPEC_FULL §4.1).
pub struct StoreClient {
    backend: StorageBackend,
}

impl StoreClient {
    pub fn new(backend: StorageBackend) -> Self {
        Self { backend }
    }

    fn full_path(&self, container: &str, path: &str) -> ObjectPath {
        let prefix = self.backend.prefix();
        if prefix.is_empty() {
            ObjectPath::from(format!("{container}/{path}"))
        } else {
            ObjectPath::from(format!("{prefix}/{container}/{path}"))
        }
    }

    /// Whether `upload_json` should fail with [`StoreError::Conflict`] instead
    /// of overwriting an existing object under the same key.
    pub async fn upload_json<T: Serialize>(
        &self,
        container: &str,
        path: &str,
        data: &T,
        if_none_match: bool,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_vec(data)?;
        self.put_bytes(container, path, body, "application/json", if_none_match)
            .await
    }

    pub async fn upload_text(
        &self,
        container: &str,
        path: &str,
        text: &str,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.put_bytes(container, path, text.as_bytes().to_vec(), content_type, false)
            .await
    }

    pub async fn upload_binary(
        &self,
        container: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.put_bytes(container, path, bytes, content_type, false).await
    }

    async fn put_bytes(
        &self,
        container: &str,
        path: &str,
        body: Vec<u8>,
        content_type: &str,
        if_none_match: bool,
    ) -> Result<(), StoreError> {
        let key = self.full_path(container, path);
        let payload = PutPayload::from(body);
        let mode = if if_none_match {
            PutMode::Create
        } else {
            PutMode::Overwrite
        };
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, AttributeValue::from(content_type.to_string()));
        let opts = PutOptions {
            mode,
            attributes,
            ..Default::default()
        };
        match self.backend.store().put_opts(&key, payload, opts).await {
            Ok(_) => Ok(()),
            Err(object_store::Error::AlreadyExists { path, .. }) => {
                Err(StoreError::Conflict(path))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns `Ok(None)` when the object is absent rather than erroring.
    pub async fn download_json<T: DeserializeOwned>(
        &self,
        container: &str,
        path: &str,
    ) -> Result<Option<T>, StoreError> {
        match self.download_bytes(container, path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn download_text(
        &self,
        container: &str,
        path: &str,
    ) -> Result<Option<String>, StoreError> {
        match self.download_bytes(container, path).await? {
            Some(bytes) => Ok(Some(
                String::from_utf8(bytes.to_vec())
                    .map_err(|e| StoreError::TransientIo(format!("non-utf8 object: {e}")))?,
            )),
            None => Ok(None),
        }
    }

    /// Raw-bytes download, for callers materializing arbitrary binary blobs
    /// (e.g. SitePublisher's `web/` snapshot and build-output upload).
    pub async fn download_binary(&self, container: &str, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.download_bytes(container, path).await?.map(|b| b.to_vec()))
    }

    async fn download_bytes(&self, container: &str, path: &str) -> Result<Option<Bytes>, StoreError> {
        let key = self.full_path(container, path);
        match self.backend.store().get(&key).await {
            Ok(result) => {
                let bytes = result
                    .bytes()
                    .await
                    .map_err(|e| StoreError::TransientIo(e.to_string()))?;
                Ok(Some(bytes))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Lazily lists every key under `container/prefix`, newest metadata first
    /// is not guaranteed — callers that need ordering sort client-side.
    pub async fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        let key_prefix = self.full_path(container, prefix);
        let mut stream = self.backend.store().list(Some(&key_prefix));
        let mut out = Vec::new();
        while let Some(meta) = stream.next().await {
            let meta = meta.map_err(StoreError::from)?;
            out.push(meta.location.to_string());
        }
        Ok(out)
    }

    /// Like [`Self::list`], but returns paths relative to `container/`
    /// instead of the full backend key — what callers that materialize or
    /// mirror a whole prefix (SitePublisher's `web/` snapshot and build
    /// upload) actually want, since they re-join it against a different
    /// container or a local directory.
    pub async fn list_relative(&self, container: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        let container_root = self.full_path(container, "").to_string();
        let keys = self.list(container, prefix).await?;
        Ok(keys
            .into_iter()
            .map(|k| k.strip_prefix(&container_root).unwrap_or(&k).trim_start_matches('/').to_string())
            .collect())
    }

    /// Idempotent: deleting an absent key is not an error.
    pub async fn delete(&self, container: &str, path: &str) -> Result<(), StoreError> {
        let key = self.full_path(container, path);
        match self.backend.store().delete(&key).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        value: u32,
    }

    fn client() -> (tempfile::TempDir, StoreClient) {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(tmp.path()).unwrap();
        (tmp, StoreClient::new(StorageBackend::Local(backend)))
    }

    #[tokio::test]
    async fn upload_then_download_json_round_trips() {
        let (_tmp, client) = client();
        let payload = Payload { value: 7 };
        client
            .upload_json("topics", "reddit_abc123.json", &payload, false)
            .await
            .unwrap();

        let loaded: Option<Payload> = client.download_json("topics", "reddit_abc123.json").await.unwrap();
        assert_eq!(loaded, Some(payload));
    }

    #[tokio::test]
    async fn download_of_missing_key_is_none() {
        let (_tmp, client) = client();
        let loaded: Option<Payload> = client.download_json("topics", "does-not-exist.json").await.unwrap();
        assert_eq!(loaded, None);
    }

    #[tokio::test]
    async fn conditional_create_conflicts_on_second_write() {
        let (_tmp, client) = client();
        let lease = Payload { value: 1 };
        client.upload_json("locks", "reddit_abc123.json", &lease, true).await.unwrap();

        let err = client
            .upload_json("locks", "reddit_abc123.json", &lease, true)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn overwrite_put_does_not_conflict() {
        let (_tmp, client) = client();
        let first = Payload { value: 1 };
        let second = Payload { value: 2 };
        client.upload_json("articles", "a.json", &first, false).await.unwrap();
        client.upload_json("articles", "a.json", &second, false).await.unwrap();

        let loaded: Option<Payload> = client.download_json("articles", "a.json").await.unwrap();
        assert_eq!(loaded, Some(second));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_tmp, client) = client();
        client.delete("topics", "missing.json").await.unwrap();
        client.delete("topics", "missing.json").await.unwrap();
    }

    #[tokio::test]
    async fn list_returns_keys_under_prefix() {
        let (_tmp, client) = client();
        client
            .upload_json("topics", "reddit_a.json", &Payload { value: 1 }, false)
            .await
            .unwrap();
        client
            .upload_json("topics", "reddit_b.json", &Payload { value: 2 }, false)
            .await
            .unwrap();

        let keys = client.list("topics", "").await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().any(|k| k.ends_with("reddit_a.json")));
    }

    #[tokio::test]
    async fn list_relative_strips_the_container_prefix() {
        let (_tmp, client) = client();
        client
            .upload_json("web", "2024/10/a-big-idea/index.html", &Payload { value: 1 }, false)
            .await
            .unwrap();

        let keys = client.list_relative("web", "").await.unwrap();
        assert_eq!(keys, vec!["2024/10/a-big-idea/index.html".to_string()]);
    }
}
