//! Core types for portal-dl

use serde::{Deserialize, Serialize};

/// One retrievable document discovered on the portal's file listing
///
/// Produced by the negotiator from a single table row. A reference is only
/// emitted when a numeric document id could be extracted from the row's
/// "view files" href; rows without one are dropped, not retried.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReference {
    /// Absolute URL of the view-files page for this document
    pub url: String,
    /// Human-readable title from the listing row (may be empty)
    pub title: String,
    /// Numeric document id extracted from the href
    pub docid: String,
}

/// A fully resolved binary document
///
/// Transient: held only for the duration of one persistence operation and
/// never cached across runs.
#[derive(Clone)]
pub struct ResolvedDocument {
    /// Derived filename (see [`crate::filename::derive_filename`])
    pub filename: String,
    /// The validated byte payload
    pub bytes: Vec<u8>,
    /// Content type the final fetch declared
    pub content_type: String,
    /// False when the payload lacked the `%PDF-` magic; such documents are
    /// accepted (some portals serve valid files with nonstandard headers)
    /// but a diagnostic copy is kept
    pub standard_signature: bool,
}

impl std::fmt::Debug for ResolvedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Elide the payload; dumping megabytes of PDF into logs helps nobody
        f.debug_struct("ResolvedDocument")
            .field("filename", &self.filename)
            .field("bytes", &format_args!("{} bytes", self.bytes.len()))
            .field("content_type", &self.content_type)
            .field("standard_signature", &self.standard_signature)
            .finish()
    }
}

/// Outcome of persisting one document, consumed only for reporting
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceResult {
    /// Whether a local copy was written
    pub stored_locally: bool,
    /// Whether the remote upload succeeded
    pub stored_remotely: bool,
    /// Logical remote address of the uploaded object, if any
    pub remote_location: Option<String>,
}

/// Process-lifetime upload accounting
///
/// Owned by the persistence sink, mutated on every remote upload attempt,
/// read only at end-of-run for the summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStatistics {
    /// Number of successful remote uploads
    pub succeeded: u64,
    /// Number of failed remote upload attempts
    pub failed: u64,
    /// Total bytes successfully uploaded
    pub total_bytes: u64,
}

impl UploadStatistics {
    /// Record one successful upload of `bytes` bytes
    pub fn record_success(&mut self, bytes: u64) {
        self.succeeded += 1;
        self.total_bytes += bytes;
    }

    /// Record one failed upload attempt
    pub fn record_failure(&mut self) {
        self.failed += 1;
    }
}

/// End-of-run batch summary
///
/// Always produced, even when some or all documents failed.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// Number of document references the negotiator discovered
    pub total: usize,
    /// Documents resolved and stored in at least one backend
    pub succeeded: usize,
    /// Documents that failed resolution or every storage backend
    pub failed: usize,
    /// Snapshot of the sink's upload accounting
    pub upload_stats: UploadStatistics,
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} successful, {} failed of {} documents ({} uploaded, {} upload failures, {} bytes)",
            self.succeeded,
            self.failed,
            self.total,
            self.upload_stats.succeeded,
            self.upload_stats.failed,
            self.upload_stats.total_bytes
        )
    }
}
