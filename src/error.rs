//! Error types for portal-dl
//!
//! This module provides the error taxonomy for the retrieval pipeline:
//! - Session/negotiation failures (fatal for the whole run)
//! - Per-document resolution failures (batch continues)
//! - Persistence failures (remote falls back to local; a document is lost
//!   only when every backend fails)
//! - Transport errors from reqwest, classified by where they occur

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for portal-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for portal-dl
///
/// Each variant carries enough context to diagnose the failing request or
/// file operation from a log line alone.
#[derive(Debug, Error)]
pub enum Error {
    /// Disclaimer/session negotiation failed; no documents can be listed
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// One document could not be turned into a binary payload
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Local write or remote upload failed
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Network error (connect, timeout, TLS, body read)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "base_url")
        key: Option<String>,
    },
}

/// Session negotiation errors
///
/// These abort the run: without an accepted disclaimer and valid postback
/// tokens the portal will not render the file listing.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The disclaimer form carried no action attribute to submit to
    #[error("disclaimer form at {url} has no action attribute")]
    FormActionMissing {
        /// The page whose form was missing an action
        url: String,
    },

    /// A required ASP.NET postback token was absent from the response page
    #[error("postback token {name} missing from {url}")]
    MissingPostbackToken {
        /// The token that was expected (e.g., "__VIEWSTATE")
        name: String,
        /// The page that should have carried it
        url: String,
    },
}

/// Per-document resolution errors
///
/// Non-fatal for the batch: the orchestrator logs the failure, leaves a
/// diagnostic artifact, and moves on to the next reference.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The view-files page contained neither a PDF iframe nor a PDF anchor
    #[error("no PDF url found on view-files page {url}")]
    NoPdfUrlFound {
        /// The view-files page that was searched
        url: String,
    },

    /// The intermediate pdf-viewer page yielded no usable document URL
    #[error("no real PDF url found on intermediate page {url}")]
    NoRealPdfUrlFound {
        /// The intermediate page that was searched
        url: String,
    },

    /// The final fetch returned an HTML error/login page instead of a document
    #[error("expected binary document from {url} but received an HTML page")]
    UnexpectedHtmlPayload {
        /// The URL that served HTML where binary was expected
        url: String,
    },
}

/// Persistence errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Writing the document to the local filesystem failed
    #[error("failed to write {path}: {reason}")]
    LocalWriteFailed {
        /// The destination path of the failed write
        path: PathBuf,
        /// The underlying I/O error text
        reason: String,
    },

    /// Uploading the document to the object store failed
    #[error("failed to upload object {key}: {reason}")]
    RemoteUploadFailed {
        /// The object key of the failed upload
        key: String,
        /// The underlying transport or server error text
        reason: String,
    },

    /// Every configured backend rejected the document; the bytes are lost
    #[error("document {filename} could not be stored in any backend")]
    AllBackendsFailed {
        /// The derived filename of the unstorable document
        filename: String,
    },
}

impl Error {
    /// Returns true if this error should abort the whole batch.
    ///
    /// Only session-level and configuration errors are batch-fatal; anything
    /// scoped to a single document (resolution, persistence, transport during
    /// a document fetch) is converted into a failure count by the
    /// orchestrator and the batch continues.
    pub fn is_batch_fatal(&self) -> bool {
        match self {
            Error::Session(_) => true,
            Error::Config { .. } => true,
            Error::Resolution(_) => false,
            Error::Persistence(_) => false,
            // Transport errors during negotiation abort by position, before
            // any per-document classification happens
            Error::Network(_) => false,
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_are_batch_fatal() {
        let err = Error::Session(SessionError::FormActionMissing {
            url: "https://portal.example/disclaimer".into(),
        });
        assert!(err.is_batch_fatal());

        let err = Error::Session(SessionError::MissingPostbackToken {
            name: "__VIEWSTATE".into(),
            url: "https://portal.example/docs".into(),
        });
        assert!(err.is_batch_fatal());
    }

    #[test]
    fn config_errors_are_batch_fatal() {
        let err = Error::Config {
            message: "base_url is not a valid URL".into(),
            key: Some("base_url".into()),
        };
        assert!(err.is_batch_fatal());
    }

    #[test]
    fn resolution_errors_are_per_document() {
        let variants = vec![
            ResolutionError::NoPdfUrlFound {
                url: "https://portal.example/view?id=1".into(),
            },
            ResolutionError::NoRealPdfUrlFound {
                url: "https://portal.example/pdfviewer?id=1".into(),
            },
            ResolutionError::UnexpectedHtmlPayload {
                url: "https://portal.example/files/1.pdf".into(),
            },
        ];
        for variant in variants {
            assert!(!Error::Resolution(variant).is_batch_fatal());
        }
    }

    #[test]
    fn persistence_errors_are_per_document() {
        let err = Error::Persistence(PersistenceError::LocalWriteFailed {
            path: PathBuf::from("/downloads/APP123/1_plan.pdf"),
            reason: "permission denied".into(),
        });
        assert!(!err.is_batch_fatal());

        let err = Error::Persistence(PersistenceError::AllBackendsFailed {
            filename: "1_plan.pdf".into(),
        });
        assert!(!err.is_batch_fatal());
    }

    #[test]
    fn display_messages_carry_context() {
        let err = Error::Resolution(ResolutionError::UnexpectedHtmlPayload {
            url: "https://portal.example/files/9.pdf".into(),
        });
        let msg = err.to_string();
        assert!(msg.contains("https://portal.example/files/9.pdf"));
        assert!(msg.contains("HTML"));

        let err = Error::Session(SessionError::MissingPostbackToken {
            name: "__EVENTVALIDATION".into(),
            url: "https://portal.example/docs".into(),
        });
        assert!(err.to_string().contains("__EVENTVALIDATION"));
    }

}
