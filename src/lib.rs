//! # portal-dl
//!
//! Backend library for retrieving public planning documents from council
//! portals built on legacy ASP.NET WebForms.
//!
//! ## Design Philosophy
//!
//! portal-dl is designed to be:
//! - **Session-faithful** - Negotiates the portal's disclaimer and postback
//!   workflow the way a browser would, on one cookie jar
//! - **Sensible defaults** - Works out of the box with zero configuration
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Polite** - Strictly sequential retrieval with a fixed delay between
//!   documents
//!
//! ## Quick Start
//!
//! ```no_run
//! use portal_dl::{Config, PortalDownloader, StorageMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.portal.base_url = "https://planning.borough.gov.uk".to_string();
//!     config.storage.mode = StorageMode::Local;
//!
//!     let mut downloader = PortalDownloader::new(config)?;
//!     let report = downloader.run("24/01234/FUL").await?;
//!     println!("{}", report);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Diagnostic artifact capture
pub mod diagnostics;
/// Error types
pub mod error;
/// Filename derivation and sanitization
pub mod filename;
/// ASP.NET disclaimer and postback negotiation
pub mod negotiator;
/// Batch orchestration
pub mod orchestrator;
/// Three-stage document resolution
pub mod resolver;
/// Cookie-bearing HTTP session
pub mod session;
/// Local and object-store persistence
pub mod storage;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::{BatchConfig, Config, PortalConfig, RemoteStorageConfig, StorageConfig, StorageMode};
pub use diagnostics::Diagnostics;
pub use error::{Error, PersistenceError, ResolutionError, Result, SessionError};
pub use orchestrator::PortalDownloader;
pub use resolver::DocumentResolver;
pub use session::SessionClient;
pub use storage::{DocumentSink, ObjectStore, S3HttpStore, content_type_for};
pub use types::{
    BatchReport, DocumentReference, PersistenceResult, ResolvedDocument, UploadStatistics,
};
