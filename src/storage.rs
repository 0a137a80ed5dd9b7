//! Document persistence: local filesystem and remote object store
//!
//! The [`DocumentSink`] owns the storage policy for a run. Three modes:
//!
//! - `Local`: filesystem only.
//! - `Remote`: object store first; on upload failure the document falls back
//!   to a local write so no successfully retrieved document is ever lost.
//! - `Both`: both backends, unconditionally, for every document. Failures in
//!   one backend do not skip the other; only when every backend fails does
//!   the document count as failed.
//!
//! The object store is behind [`ObjectStore`] so tests can substitute a
//! recording or failing implementation without a network.

use crate::config::{Config, RemoteStorageConfig, StorageMode};
use crate::error::{PersistenceError, Result};
use crate::filename::sanitize_component;
use crate::types::{PersistenceResult, ResolvedDocument, UploadStatistics};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Remote object storage backend
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key` with the given content type and metadata
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<()>;
}

/// S3-compatible object store speaking plain HTTP PUT
///
/// Targets buckets that accept unauthenticated writes from within a trusted
/// network (or behind a signing proxy). Metadata is carried as
/// `x-amz-meta-*` headers.
pub struct S3HttpStore {
    client: reqwest::Client,
    endpoint: String,
}

impl S3HttpStore {
    /// Build a store for the configured bucket using the virtual-hosted
    /// endpoint `https://{bucket}.s3.{region}.amazonaws.com`
    pub fn new(remote: &RemoteStorageConfig) -> Result<Self> {
        let endpoint = format!("https://{}.s3.{}.amazonaws.com", remote.bucket, remote.region);
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            endpoint,
        })
    }

    /// Build a store against an explicit endpoint (S3-compatible services,
    /// local test servers)
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ObjectStore for S3HttpStore {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<()> {
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), key);
        let mut request = self
            .client
            .put(&url)
            .header("content-type", content_type)
            .body(bytes.to_vec());
        for (name, value) in metadata {
            request = request.header(format!("x-amz-meta-{}", name), value);
        }

        let response = request.send().await.map_err(|e| {
            PersistenceError::RemoteUploadFailed {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })?;
        if !response.status().is_success() {
            return Err(PersistenceError::RemoteUploadFailed {
                key: key.to_string(),
                reason: format!("upload returned status {}", response.status()),
            }
            .into());
        }
        Ok(())
    }
}

/// Persistence sink applying the configured storage mode
pub struct DocumentSink {
    mode: StorageMode,
    download_dir: PathBuf,
    remote: RemoteStorageConfig,
    store: Option<Arc<dyn ObjectStore>>,
    stats: UploadStatistics,
}

impl DocumentSink {
    /// Build a sink from configuration.
    ///
    /// The object store client is only constructed when the mode needs one.
    pub fn new(config: &Config) -> Result<Self> {
        let store: Option<Arc<dyn ObjectStore>> = match config.storage.mode {
            StorageMode::Local => None,
            StorageMode::Remote | StorageMode::Both => {
                Some(Arc::new(S3HttpStore::new(&config.remote)?))
            }
        };
        Ok(Self {
            mode: config.storage.mode,
            download_dir: config.storage.download_dir.clone(),
            remote: config.remote.clone(),
            store,
            stats: UploadStatistics::default(),
        })
    }

    /// Build a sink with an externally supplied object store
    pub fn with_store(config: &Config, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            mode: config.storage.mode,
            download_dir: config.storage.download_dir.clone(),
            remote: config.remote.clone(),
            store: Some(store),
            stats: UploadStatistics::default(),
        }
    }

    /// Snapshot of the upload accounting so far
    pub fn statistics(&self) -> UploadStatistics {
        self.stats
    }

    /// Persist one resolved document per the configured mode
    pub async fn store(
        &mut self,
        application_id: &str,
        document: &ResolvedDocument,
    ) -> Result<PersistenceResult> {
        match self.mode {
            StorageMode::Local => {
                self.store_locally(application_id, document).await?;
                Ok(PersistenceResult {
                    stored_locally: true,
                    stored_remotely: false,
                    remote_location: None,
                })
            }
            StorageMode::Remote => match self.store_remotely(application_id, document).await {
                Ok(location) => Ok(PersistenceResult {
                    stored_locally: false,
                    stored_remotely: true,
                    remote_location: Some(location),
                }),
                Err(e) => {
                    tracing::warn!(
                        filename = %document.filename,
                        error = %e,
                        "remote upload failed, falling back to local storage"
                    );
                    self.store_locally(application_id, document).await?;
                    Ok(PersistenceResult {
                        stored_locally: true,
                        stored_remotely: false,
                        remote_location: None,
                    })
                }
            },
            StorageMode::Both => {
                let local = self.store_locally(application_id, document).await;
                let remote = self.store_remotely(application_id, document).await;
                if let Err(e) = &local {
                    tracing::warn!(filename = %document.filename, error = %e, "local write failed");
                }
                match (&local, &remote) {
                    (Err(_), Err(e)) => {
                        tracing::warn!(filename = %document.filename, error = %e, "remote upload failed");
                        Err(PersistenceError::AllBackendsFailed {
                            filename: document.filename.clone(),
                        }
                        .into())
                    }
                    _ => Ok(PersistenceResult {
                        stored_locally: local.is_ok(),
                        stored_remotely: remote.is_ok(),
                        remote_location: remote.ok(),
                    }),
                }
            }
        }
    }

    async fn store_locally(
        &self,
        application_id: &str,
        document: &ResolvedDocument,
    ) -> Result<PathBuf> {
        let dir = self.download_dir.join(sanitize_component(application_id));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| PersistenceError::LocalWriteFailed {
                path: dir.clone(),
                reason: e.to_string(),
            })?;
        let path = dir.join(&document.filename);
        tokio::fs::write(&path, &document.bytes)
            .await
            .map_err(|e| PersistenceError::LocalWriteFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        tracing::info!(
            path = %path.display(),
            bytes = document.bytes.len(),
            "stored document locally"
        );
        Ok(path)
    }

    async fn store_remotely(
        &mut self,
        application_id: &str,
        document: &ResolvedDocument,
    ) -> Result<String> {
        let Some(store) = self.store.clone() else {
            return Err(PersistenceError::RemoteUploadFailed {
                key: document.filename.clone(),
                reason: "no object store configured".to_string(),
            }
            .into());
        };

        let key = self.remote.object_key(application_id, &document.filename);
        let metadata = self.object_metadata(application_id, document);
        let content_type = content_type_for(&document.filename);

        match store.put(&key, &document.bytes, content_type, &metadata).await {
            Ok(()) => {
                self.stats.record_success(document.bytes.len() as u64);
                let uri = self.s3_uri(&key);
                tracing::info!(
                    uri = %uri,
                    bytes = document.bytes.len(),
                    "uploaded document to object store"
                );
                Ok(uri)
            }
            Err(e) => {
                self.stats.record_failure();
                Err(e)
            }
        }
    }

    fn object_metadata(
        &self,
        application_id: &str,
        document: &ResolvedDocument,
    ) -> HashMap<String, String> {
        HashMap::from([
            ("application-id".to_string(), application_id.to_string()),
            (
                "uploaded-at".to_string(),
                chrono::Utc::now().to_rfc3339(),
            ),
            ("source".to_string(), self.remote.source_tag.clone()),
            (
                "content-length".to_string(),
                document.bytes.len().to_string(),
            ),
        ])
    }

    /// Logical address of an uploaded object
    fn s3_uri(&self, key: &str) -> String {
        format!("s3://{}/{}", self.remote.bucket, key)
    }

    /// Public HTTPS address of an uploaded object
    pub fn public_url(&self, application_id: &str, filename: &str) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.remote.bucket,
            self.remote.region,
            self.remote.object_key(application_id, filename)
        )
    }
}

/// Content type by filename extension, for upload headers
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "djvu" => "image/vnd.djvu",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::Mutex;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn document(filename: &str, bytes: &[u8]) -> ResolvedDocument {
        ResolvedDocument {
            filename: filename.to_string(),
            bytes: bytes.to_vec(),
            content_type: "application/pdf".to_string(),
            standard_signature: true,
        }
    }

    fn local_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.storage.download_dir = dir.to_path_buf();
        config
    }

    /// Upload recorder for asserting keys, metadata, and content types
    #[derive(Default)]
    struct RecordingStore {
        puts: Mutex<Vec<(String, usize, String, HashMap<String, String>)>>,
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn put(
            &self,
            key: &str,
            bytes: &[u8],
            content_type: &str,
            metadata: &HashMap<String, String>,
        ) -> Result<()> {
            self.puts.lock().unwrap().push((
                key.to_string(),
                bytes.len(),
                content_type.to_string(),
                metadata.clone(),
            ));
            Ok(())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl ObjectStore for FailingStore {
        async fn put(
            &self,
            key: &str,
            _bytes: &[u8],
            _content_type: &str,
            _metadata: &HashMap<String, String>,
        ) -> Result<()> {
            Err(PersistenceError::RemoteUploadFailed {
                key: key.to_string(),
                reason: "simulated outage".to_string(),
            }
            .into())
        }
    }

    #[tokio::test]
    async fn local_mode_writes_under_sanitized_application_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut sink = DocumentSink::new(&local_config(tmp.path())).unwrap();

        let result = sink
            .store("24/01234/FUL", &document("101_Site_Plan.pdf", b"%PDF-1.4 x"))
            .await
            .unwrap();

        assert!(result.stored_locally);
        assert!(!result.stored_remotely);
        let written = tmp.path().join("24_01234_FUL").join("101_Site_Plan.pdf");
        assert_eq!(std::fs::read(written).unwrap(), b"%PDF-1.4 x");
    }

    #[tokio::test]
    async fn remote_mode_records_metadata_and_content_type() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = local_config(tmp.path());
        config.storage.mode = StorageMode::Remote;
        let store = Arc::new(RecordingStore::default());
        let mut sink = DocumentSink::with_store(&config, store.clone());

        let result = sink
            .store("APP42", &document("7_notice.pdf", b"%PDF-1.4 body"))
            .await
            .unwrap();

        assert!(result.stored_remotely);
        assert_eq!(
            result.remote_location.as_deref(),
            Some("s3://planning-documents/applications/APP42/7_notice.pdf")
        );
        let puts = store.puts.lock().unwrap();
        let (key, len, content_type, metadata) = &puts[0];
        assert_eq!(key, "applications/APP42/7_notice.pdf");
        assert_eq!(*len, b"%PDF-1.4 body".len());
        assert_eq!(content_type, "application/pdf");
        assert_eq!(metadata.get("application-id").unwrap(), "APP42");
        assert_eq!(metadata.get("source").unwrap(), "portal-dl");
        assert_eq!(metadata.get("content-length").unwrap(), "13");
        assert!(metadata.contains_key("uploaded-at"));
        assert_eq!(sink.statistics().succeeded, 1);
        assert_eq!(sink.statistics().total_bytes, 13);
    }

    #[tokio::test]
    async fn remote_failure_falls_back_to_local() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = local_config(tmp.path());
        config.storage.mode = StorageMode::Remote;
        let mut sink = DocumentSink::with_store(&config, Arc::new(FailingStore));

        let result = sink
            .store("APP1", &document("9_plan.pdf", b"%PDF-1.4 y"))
            .await
            .unwrap();

        assert!(result.stored_locally);
        assert!(!result.stored_remotely);
        assert!(result.remote_location.is_none());
        assert_eq!(sink.statistics().failed, 1);
        assert!(tmp.path().join("APP1").join("9_plan.pdf").exists());
    }

    #[tokio::test]
    async fn both_mode_writes_both_backends() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = local_config(tmp.path());
        config.storage.mode = StorageMode::Both;
        let store = Arc::new(RecordingStore::default());
        let mut sink = DocumentSink::with_store(&config, store.clone());

        let result = sink
            .store("APP2", &document("3_plan.pdf", b"%PDF-1.4 z"))
            .await
            .unwrap();

        assert!(result.stored_locally);
        assert!(result.stored_remotely);
        assert!(tmp.path().join("APP2").join("3_plan.pdf").exists());
        assert_eq!(store.puts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn both_mode_tolerates_single_backend_failure() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = local_config(tmp.path());
        config.storage.mode = StorageMode::Both;
        let mut sink = DocumentSink::with_store(&config, Arc::new(FailingStore));

        let result = sink
            .store("APP3", &document("4_plan.pdf", b"%PDF-1.4 w"))
            .await
            .unwrap();

        assert!(result.stored_locally);
        assert!(!result.stored_remotely);
        assert_eq!(sink.statistics().failed, 1);
    }

    #[tokio::test]
    async fn s3_http_store_puts_with_metadata_headers() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/applications/APP9/1_plan.pdf"))
            .and(header("content-type", "application/pdf"))
            .and(header("x-amz-meta-application-id", "APP9"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = S3HttpStore::with_endpoint(server.uri()).unwrap();
        let metadata = HashMap::from([("application-id".to_string(), "APP9".to_string())]);
        store
            .put(
                "applications/APP9/1_plan.pdf",
                b"%PDF-1.4",
                "application/pdf",
                &metadata,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn s3_http_store_maps_error_status_to_upload_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let store = S3HttpStore::with_endpoint(server.uri()).unwrap();
        let err = store
            .put("k/doc.pdf", b"x", "application/pdf", &HashMap::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Persistence(PersistenceError::RemoteUploadFailed { .. })
        ));
    }

    #[test]
    fn content_types_cover_portal_document_formats() {
        assert_eq!(content_type_for("a.pdf"), "application/pdf");
        assert_eq!(content_type_for("a.PDF"), "application/pdf");
        assert_eq!(content_type_for("scan.djvu"), "image/vnd.djvu");
        assert_eq!(content_type_for("notes.txt"), "text/plain");
        assert_eq!(content_type_for("page.html"), "text/html");
        assert_eq!(content_type_for("photo.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("map.tiff"), "image/tiff");
        assert_eq!(content_type_for("unknown.xyz"), "application/octet-stream");
        assert_eq!(content_type_for("no_extension"), "application/octet-stream");
    }

    #[test]
    fn public_url_uses_virtual_hosted_addressing() {
        let config = Config::default();
        let sink = DocumentSink::with_store(&config, Arc::new(RecordingStore::default()));
        assert_eq!(
            sink.public_url("APP1", "2_plan.pdf"),
            "https://planning-documents.s3.eu-west-2.amazonaws.com/applications/APP1/2_plan.pdf"
        );
    }
}
