//! Sequential batch orchestration
//!
//! One [`PortalDownloader`] per run: negotiate the session once, then walk
//! the discovered references strictly in listing order with a fixed
//! politeness delay between documents. Per-document failures are counted
//! and the batch continues; session-level and configuration failures abort
//! the run, since every later document would fail the same way.

use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::negotiator;
use crate::resolver::DocumentResolver;
use crate::session::SessionClient;
use crate::storage::{DocumentSink, ObjectStore};
use crate::types::{BatchReport, DocumentReference};
use std::sync::Arc;

/// End-to-end retrieval pipeline for one portal
pub struct PortalDownloader {
    config: Config,
    session: SessionClient,
    resolver: DocumentResolver,
    sink: DocumentSink,
    diagnostics: Diagnostics,
}

impl PortalDownloader {
    /// Build a downloader from configuration
    pub fn new(config: Config) -> Result<Self> {
        let session = SessionClient::new(&config.portal)?;
        let diagnostics = Diagnostics::new(&config.storage.debug_dir);
        let resolver = DocumentResolver::new(&config.portal.base_url, diagnostics.clone());
        let sink = DocumentSink::new(&config)?;
        Ok(Self {
            config,
            session,
            resolver,
            sink,
            diagnostics,
        })
    }

    /// Build a downloader with an externally supplied object store
    pub fn with_object_store(config: Config, store: Arc<dyn ObjectStore>) -> Result<Self> {
        let session = SessionClient::new(&config.portal)?;
        let diagnostics = Diagnostics::new(&config.storage.debug_dir);
        let resolver = DocumentResolver::new(&config.portal.base_url, diagnostics.clone());
        let sink = DocumentSink::with_store(&config, store);
        Ok(Self {
            config,
            session,
            resolver,
            sink,
            diagnostics,
        })
    }

    /// Retrieve every document the portal lists for an application.
    ///
    /// Always returns a report when the session held; returns an error only
    /// for batch-fatal failures (session negotiation, configuration).
    pub async fn run(&mut self, application_id: &str) -> Result<BatchReport> {
        tracing::info!(application_id, "starting document retrieval");

        let references =
            negotiator::list_documents(&self.session, &self.config.portal, application_id).await?;
        self.diagnostics
            .write_reference_list(application_id, &references)
            .await;

        let mut report = BatchReport {
            total: references.len(),
            ..Default::default()
        };

        for (index, reference) in references.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.batch.politeness_delay).await;
            }
            tracing::info!(
                docid = %reference.docid,
                title = %reference.title,
                position = index + 1,
                total = report.total,
                "retrieving document"
            );

            match self.fetch_one(application_id, reference).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        docid = %reference.docid,
                        url = %reference.url,
                        error = %e,
                        "document retrieval failed"
                    );
                    if e.is_batch_fatal() {
                        return Err(e);
                    }
                }
            }
        }

        report.upload_stats = self.sink.statistics();
        tracing::info!(application_id, %report, "retrieval complete");
        Ok(report)
    }

    async fn fetch_one(
        &mut self,
        application_id: &str,
        reference: &DocumentReference,
    ) -> Result<()> {
        let document = self.resolver.resolve(&self.session, reference).await?;
        self.sink.store(application_id, &document).await?;
        Ok(())
    }
}
