//! Best-effort diagnostic artifacts
//!
//! When resolution fails mid-pipeline, the page or payload that broke it is
//! kept on disk so the failure can be diagnosed offline without re-running
//! the portal session. Everything here is best-effort: a failure to write an
//! artifact is logged and swallowed, never propagated, since diagnostics
//! must not turn a recoverable per-document failure into a batch failure.

use crate::filename::sanitize_component;
use crate::types::DocumentReference;
use std::path::PathBuf;

/// Writes diagnostic artifacts under a configured directory
#[derive(Clone, Debug)]
pub struct Diagnostics {
    dir: PathBuf,
}

impl Diagnostics {
    /// Create a diagnostics writer rooted at `dir`.
    ///
    /// The directory is created lazily on first write, not here.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Save an HTML page that failed to yield a document URL
    pub async fn save_html(&self, name: &str, html: &str) {
        self.save_bytes(name, html.as_bytes()).await;
    }

    /// Save a raw payload that failed validation
    pub async fn save_bytes(&self, name: &str, bytes: &[u8]) {
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            tracing::warn!(dir = %self.dir.display(), error = %e, "cannot create diagnostics directory");
            return;
        }
        let path = self.dir.join(name);
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => tracing::debug!(path = %path.display(), "saved diagnostic artifact"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to save diagnostic artifact"),
        }
    }

    /// Record the discovered document references for an application.
    ///
    /// One line per reference. Useful for comparing what the portal listed
    /// against what actually landed on disk.
    pub async fn write_reference_list(
        &self,
        application_id: &str,
        references: &[DocumentReference],
    ) {
        let mut contents = String::new();
        for reference in references {
            contents.push_str(&format!(
                "{}\t{}\t{}\n",
                reference.docid, reference.title, reference.url
            ));
        }
        let name = format!("{}_documents.txt", sanitize_component(application_id));
        self.save_bytes(&name, contents.as_bytes()).await;
    }
}
