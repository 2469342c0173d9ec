//! `handle_publish_site`: snapshot, build, and atomically swap the live web
//! root (SPEC_FULL §4.7).

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use pipeline_core::diagnostics::FailureRecord;
use pipeline_core::envelope::{Queue, QueueMessage as Envelope};
use pipeline_core::publish_lock::PublishLock;
use pipeline_queue::QueueMessage as TransportMessage;
use pipeline_store::StoreClient;
use pipeline_worker::{Disposition, MessageHandler};

use crate::error::SitePublisherError;

#[derive(Debug, Clone, Deserialize)]
pub struct PublishSitePayload {
    pub batch_id: String,
    #[allow(dead_code)]
    pub markdown_count: u64,
    #[serde(default = "default_markdown_container")]
    pub markdown_container: String,
    #[allow(dead_code)]
    #[serde(default)]
    pub trigger: Option<String>,
}

fn default_markdown_container() -> String {
    "markdown".to_string()
}

/// Maps a file extension to a MIME content-type for the `web/` upload
/// (SPEC_FULL §6, §4.7 step 6). Unknown extensions fall back to a generic
/// binary type rather than failing the publish.
fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase().as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

pub struct SitePublisherHandler {
    store: Arc<StoreClient>,
    generator_bin: String,
    theme_dir: PathBuf,
    build_timeout: Duration,
}

impl SitePublisherHandler {
    pub fn new(
        store: Arc<StoreClient>,
        generator_bin: impl Into<String>,
        theme_dir: impl Into<PathBuf>,
        build_timeout: Duration,
    ) -> Self {
        Self {
            store,
            generator_bin: generator_bin.into(),
            theme_dir: theme_dir.into(),
            build_timeout,
        }
    }

    /// Step 2: copy every `web/` object into `web-backup/{timestamp}/` so the
    /// prior site is always recoverable even though this build overwrites
    /// `web/` in place.
    async fn snapshot_web(&self, timestamp: &str) -> Result<(), SitePublisherError> {
        let keys = self.store.list_relative("web", "").await?;
        for key in keys {
            let Some(bytes) = self.store.download_binary("web", &key).await? else {
                continue;
            };
            let content_type = content_type_for(Path::new(&key));
            let backup_path = format!("{timestamp}/{key}");
            self.store.upload_binary("web-backup", &backup_path, bytes, content_type).await?;
        }
        Ok(())
    }

    /// Step 3: materialize `markdown_container/articles/**` blobs and the
    /// baked-in theme directory into a fresh local staging directory shaped
    /// the way the generator expects its source tree.
    async fn stage_build_root(&self, markdown_container: &str, build_root: &Path) -> Result<(), SitePublisherError> {
        let content_root = build_root.join("content");
        let keys = self.store.list_relative(markdown_container, "").await?;
        for key in keys {
            let Some(text) = self.store.download_text(markdown_container, &key).await? else {
                continue;
            };
            let dest = content_root.join(&key);
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&dest, text).await?;
        }

        copy_dir_recursive(&self.theme_dir, build_root)?;
        Ok(())
    }

    /// Step 4: invoke the static-site-generator binary, capturing
    /// stdout/stderr, exit status, and wall time.
    async fn run_generator(&self, build_root: &Path, output_dir: &Path) -> Result<(), SitePublisherError> {
        let start = Instant::now();
        let mut command = tokio::process::Command::new(&self.generator_bin);
        command
            .arg("--source")
            .arg(build_root)
            .arg("--destination")
            .arg(output_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let run = tokio::time::timeout(self.build_timeout, command.output());
        let output = match run.await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(SitePublisherError::Io(e)),
            Err(_) => return Err(SitePublisherError::BuildTimedOut(self.build_timeout.as_secs())),
        };
        let elapsed = start.elapsed();

        if !output.status.success() {
            let log = format!(
                "stdout:\n{}\nstderr:\n{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
            return Err(SitePublisherError::BuildFailed { status: output.status.to_string(), log });
        }

        info!(elapsed_ms = elapsed.as_millis(), "site build completed");
        Ok(())
    }

    /// Step 6: upload every file under the build output directory to `web/`,
    /// preserving its relative path and setting content-type by extension.
    async fn upload_build_output(&self, output_dir: &Path) -> Result<u64, SitePublisherError> {
        let mut uploaded = 0u64;
        for entry in WalkDir::new(output_dir).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(output_dir).unwrap_or(entry.path());
            let bytes = tokio::fs::read(entry.path()).await?;
            let content_type = content_type_for(relative);
            let key = relative.to_string_lossy().replace('\\', "/");
            self.store.upload_binary("web", &key, bytes, content_type).await?;
            uploaded += 1;
        }
        Ok(uploaded)
    }

    async fn handle_publish_site(&self, payload: PublishSitePayload) -> Result<(), SitePublisherError> {
        let timestamp = Utc::now().format("%Y%m%d-%H%M%S").to_string();

        self.snapshot_web(&timestamp).await?;

        let staging = tempfile::tempdir()?;
        let build_root = staging.path().join("build");
        let output_dir = staging.path().join("public");
        tokio::fs::create_dir_all(&build_root).await?;

        self.stage_build_root(&payload.markdown_container, &build_root).await?;
        self.run_generator(&build_root, &output_dir).await?;
        let uploaded = self.upload_build_output(&output_dir).await?;

        info!(batch_id = %payload.batch_id, files_uploaded = uploaded, "site published");

        if let Err(e) = self.store.delete("locks", &PublishLock::object_key(&payload.batch_id)).await {
            warn!(batch_id = %payload.batch_id, error = %e, "failed to delete publish lock after successful publish");
        }

        Ok(())
    }

    /// Best-effort write of a diagnostic record for a permanent failure
    /// (SPEC_FULL §7 "Diagnostic prefix").
    async fn write_failure_record(&self, batch_id: &str, error: &SitePublisherError, dequeue_count: u32) {
        let now = Utc::now();
        let record = FailureRecord::new("permanent", error.to_string(), dequeue_count);
        if let Err(e) = self
            .store
            .upload_json("web", &FailureRecord::path(batch_id, now), &record, false)
            .await
        {
            warn!(batch_id, error = %e, "failed to write diagnostic failure record");
        }
    }
}

/// Copies `src`'s contents into `dest`, overlaying any files already staged
/// there (the theme's config files sit alongside the generated `content/`
/// directory at the build root).
fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<(), SitePublisherError> {
    if !src.exists() {
        return Ok(());
    }
    for entry in WalkDir::new(src).into_iter().filter_map(|e| e.ok()) {
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[async_trait]
impl MessageHandler for SitePublisherHandler {
    async fn handle(&self, message: TransportMessage) -> Result<Disposition, anyhow::Error> {
        let envelope: Envelope = match serde_json::from_str(&message.body) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "malformed envelope, nacking");
                return Ok(Disposition::Nack);
            }
        };

        if let Err(e) = envelope.operation(Queue::PublishSite) {
            warn!(error = %e, "unknown operation, nacking for eventual DLQ redrive");
            return Ok(Disposition::Nack);
        }

        let payload: PublishSitePayload = match envelope.payload_as() {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "malformed PublishSite payload, nacking for eventual DLQ redrive");
                return Ok(Disposition::Nack);
            }
        };
        let batch_id = payload.batch_id.clone();

        match self.handle_publish_site(payload).await {
            Ok(()) => Ok(Disposition::Ack),
            Err(e) if e.is_permanent() => {
                warn!(error = %e, "permanent site-publish failure, leaving for DLQ redrive");
                self.write_failure_record(&batch_id, &e, message.attempt_count).await;
                Ok(Disposition::Nack)
            }
            Err(e) => {
                warn!(error = %e, "site build failed, web/ left untouched, nacking for retry");
                Ok(Disposition::Nack)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_core::envelope::Operation;
    use pipeline_store::{LocalBackend, StorageBackend};
    use uuid::Uuid;

    fn store() -> (tempfile::TempDir, Arc<StoreClient>) {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(tmp.path()).unwrap();
        (tmp, Arc::new(StoreClient::new(StorageBackend::Local(backend))))
    }

    fn fake_generator_script(dir: &Path) -> PathBuf {
        let script = dir.join("fake-hugo.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             while [ \"$#\" -gt 0 ]; do\n\
             case \"$1\" in\n\
             --destination) dest=\"$2\"; shift 2 ;;\n\
             --source) src=\"$2\"; shift 2 ;;\n\
             *) shift ;;\n\
             esac\n\
             done\n\
             mkdir -p \"$dest\"\n\
             echo '<html>built</html>' > \"$dest/index.html\"\n\
             exit 0\n",
        )
        .unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&script).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&script, perms).unwrap();
        }
        script
    }

    #[tokio::test]
    async fn successful_build_uploads_output_and_clears_lock() {
        let (tmp, store) = store();
        store.upload_text("markdown", "articles/2024/10/a.md", "# A", "text/markdown").await.unwrap();
        store
            .upload_json("locks", &PublishLock::object_key("batch-1"), &PublishLock::new("batch-1", "markdowngen-1"), true)
            .await
            .unwrap();

        let theme_dir = tmp.path().join("theme");
        std::fs::create_dir_all(&theme_dir).unwrap();
        std::fs::write(theme_dir.join("config.toml"), "baseURL = \"https://example.com\"\n").unwrap();

        let generator = fake_generator_script(tmp.path());
        let handler = SitePublisherHandler::new(store.clone(), generator.to_string_lossy().to_string(), theme_dir, Duration::from_secs(5));

        let envelope = Envelope::new(
            "markdowngen",
            Operation::PublishSiteRequest,
            Uuid::new_v4(),
            serde_json::json!({
                "batch_id": "batch-1",
                "markdown_count": 1,
                "markdown_container": "markdown",
                "trigger": "queue_drained",
            }),
        );
        let message = TransportMessage {
            id: "m1".into(),
            body: serde_json::to_string(&envelope).unwrap(),
            receipt_handle: "r1".into(),
            timestamp: chrono::Utc::now(),
            attempt_count: 1,
        };

        let disposition = handler.handle(message).await.unwrap();
        assert!(matches!(disposition, Disposition::Ack));

        let published = store.download_text("web", "index.html").await.unwrap();
        assert_eq!(published.unwrap(), "<html>built</html>\n");

        let lock: Option<PublishLock> = store.download_json("locks", &PublishLock::object_key("batch-1")).await.unwrap();
        assert!(lock.is_none());
    }

    #[tokio::test]
    async fn failed_build_leaves_web_untouched_and_nacks() {
        let (tmp, store) = store();
        store.upload_text("web", "index.html", "<html>old</html>", "text/html").await.unwrap();

        let script = tmp.path().join("failing.sh");
        std::fs::write(&script, "#!/bin/sh\necho 'boom' 1>&2\nexit 1\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&script).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&script, perms).unwrap();
        }

        let theme_dir = tmp.path().join("theme");
        std::fs::create_dir_all(&theme_dir).unwrap();
        let handler = SitePublisherHandler::new(store.clone(), script.to_string_lossy().to_string(), theme_dir, Duration::from_secs(5));

        let envelope = Envelope::new(
            "markdowngen",
            Operation::PublishSiteRequest,
            Uuid::new_v4(),
            serde_json::json!({
                "batch_id": "batch-2",
                "markdown_count": 0,
                "markdown_container": "markdown",
                "trigger": "queue_drained",
            }),
        );
        let message = TransportMessage {
            id: "m2".into(),
            body: serde_json::to_string(&envelope).unwrap(),
            receipt_handle: "r2".into(),
            timestamp: chrono::Utc::now(),
            attempt_count: 1,
        };

        let disposition = handler.handle(message).await.unwrap();
        assert!(matches!(disposition, Disposition::Nack));

        let untouched = store.download_text("web", "index.html").await.unwrap();
        assert_eq!(untouched.unwrap(), "<html>old</html>");
    }

    #[test]
    fn content_type_maps_known_extensions() {
        assert_eq!(content_type_for(Path::new("index.html")), "text/html; charset=utf-8");
        assert_eq!(content_type_for(Path::new("style.css")), "text/css");
        assert_eq!(content_type_for(Path::new("photo.webp")), "image/webp");
        assert_eq!(content_type_for(Path::new("data.bin")), "application/octet-stream");
    }
}
