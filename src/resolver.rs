//! Three-stage document resolution
//!
//! Given one [`DocumentReference`], turn its opaque "view files" URL into a
//! verified binary payload. The pipeline is three sequential stages with no
//! branching back:
//!
//! - **Stage 1**: the view-files page embeds (iframe) or links (anchor) a
//!   pdf-viewer URL. Relative paths like `.\files\doc1.pdf` are normalized
//!   against the portal base URL.
//! - **Stage 2**: the intermediate page either *is* the binary (non-HTML
//!   content type) or embeds/links/script-redirects to it. The inline-script
//!   matching is a best-effort regex heuristic over script text, not a
//!   JavaScript parser; portals that assemble the URL dynamically fall
//!   through to `NoRealPdfUrlFound` with a page artifact kept for offline
//!   inspection.
//! - **Stage 3**: fetch the final URL as raw bytes and validate. An HTML
//!   payload (error/login page) is rejected regardless of the declared
//!   content type; a payload without the `%PDF-` magic is accepted but
//!   flagged, with a diagnostic copy kept.

use crate::diagnostics::Diagnostics;
use crate::error::{Result, ResolutionError};
use crate::filename::derive_filename;
use crate::session::SessionClient;
use crate::types::{DocumentReference, ResolvedDocument};
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

#[allow(clippy::expect_used)] // pattern literal is valid
static WINDOW_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"window\.open\(\s*['"]([^'"]+)['"]"#).expect("valid regex"));
#[allow(clippy::expect_used)] // pattern literal is valid
static LOCATION_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"location\.href\s*=\s*['"]([^'"]+)['"]"#).expect("valid regex"));
#[allow(clippy::expect_used)] // pattern literal is valid
static SCRIPT_SRC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)src\s*=\s*["']([^"']*pdf[^"']*)["']"#).expect("valid regex"));

/// Resolves view-files references into binary documents
pub struct DocumentResolver {
    base_url: String,
    diagnostics: Diagnostics,
}

impl DocumentResolver {
    /// Create a resolver for one portal
    pub fn new(base_url: impl Into<String>, diagnostics: Diagnostics) -> Self {
        Self {
            base_url: base_url.into(),
            diagnostics,
        }
    }

    /// Resolve one reference to a verified binary document.
    ///
    /// Failures are per-document: the caller counts them and continues the
    /// batch. Each failure leaves a diagnostic artifact.
    pub async fn resolve(
        &self,
        session: &SessionClient,
        reference: &DocumentReference,
    ) -> Result<ResolvedDocument> {
        let filename = derive_filename(Some(&reference.docid), Some(&reference.title));

        // Stage 1: view-files page
        let view_page = session.get_html(&reference.url).await?;
        let Some(raw_viewer_url) = find_pdf_url_in_view_page(&view_page.body) else {
            self.diagnostics
                .save_html(&format!("viewfiles_{}.html", reference.docid), &view_page.body)
                .await;
            return Err(ResolutionError::NoPdfUrlFound {
                url: reference.url.clone(),
            }
            .into());
        };
        let viewer_url = normalize_portal_path(&self.base_url, &raw_viewer_url);
        tracing::debug!(docid = %reference.docid, url = %viewer_url, "stage 1 resolved viewer url");

        // Stage 2: intermediate page, or already the binary
        let probe = session.get_html(&viewer_url).await?;
        let final_url = if is_html_content_type(&probe.content_type) {
            let Some(raw_final) = find_pdf_url_in_intermediate_page(&probe.body) else {
                self.diagnostics
                    .save_html(&format!("pdfviewer_{}.html", reference.docid), &probe.body)
                    .await;
                return Err(ResolutionError::NoRealPdfUrlFound { url: viewer_url }.into());
            };
            strip_fragment(&normalize_portal_path(&self.base_url, &raw_final))
        } else {
            // The viewer URL serves the document directly; re-fetch below
            // with the binary timeout and no text decoding
            viewer_url.clone()
        };
        tracing::debug!(docid = %reference.docid, url = %final_url, "stage 2 resolved binary url");

        // Stage 3: binary fetch and validation
        let binary = session.get_binary(&final_url).await?;
        if looks_like_html(&binary.bytes) {
            self.diagnostics
                .save_bytes(&format!("payload_{}.bin", reference.docid), &binary.bytes)
                .await;
            return Err(ResolutionError::UnexpectedHtmlPayload { url: final_url }.into());
        }

        let standard_signature = binary.bytes.starts_with(b"%PDF-");
        if !standard_signature {
            tracing::warn!(
                docid = %reference.docid,
                url = %final_url,
                content_type = %binary.content_type,
                "payload lacks %PDF- signature, keeping a diagnostic copy"
            );
            self.diagnostics
                .save_bytes(&format!("nonstandard_{}", filename), &binary.bytes)
                .await;
        }

        let content_type = if binary.content_type.is_empty() {
            "application/pdf".to_string()
        } else {
            binary.content_type
        };

        Ok(ResolvedDocument {
            filename,
            bytes: binary.bytes,
            content_type,
            standard_signature,
        })
    }
}

fn has_pdf_marker(value: &str) -> bool {
    value.to_ascii_lowercase().contains("pdf")
}

/// Stage 1 search: a PDF iframe first, then a PDF anchor
#[allow(clippy::unwrap_used)] // selector literals are valid
pub(crate) fn find_pdf_url_in_view_page(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let iframe_sel = Selector::parse("iframe[src]").unwrap();
    let anchor_sel = Selector::parse("a[href]").unwrap();

    if let Some(src) = document
        .select(&iframe_sel)
        .filter_map(|e| e.value().attr("src"))
        .find(|src| has_pdf_marker(src))
    {
        return Some(src.to_string());
    }
    document
        .select(&anchor_sel)
        .filter_map(|e| e.value().attr("href"))
        .find(|href| has_pdf_marker(href))
        .map(str::to_string)
}

/// Stage 2 search, in priority order: embedded frame/object, anchor, inline
/// script heuristics. First match wins.
#[allow(clippy::unwrap_used)] // selector literals are valid
pub(crate) fn find_pdf_url_in_intermediate_page(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let embed_sel = Selector::parse("iframe[src], embed[src], object[data]").unwrap();
    let anchor_sel = Selector::parse("a[href]").unwrap();
    let script_sel = Selector::parse("script").unwrap();

    if let Some(url) = document
        .select(&embed_sel)
        .filter_map(|e| e.value().attr("src").or_else(|| e.value().attr("data")))
        .find(|v| has_pdf_marker(v))
    {
        return Some(url.to_string());
    }

    if let Some(href) = document
        .select(&anchor_sel)
        .filter_map(|e| e.value().attr("href"))
        .find(|href| has_pdf_marker(href) || href.contains("GetDocument"))
    {
        return Some(href.to_string());
    }

    for script in document.select(&script_sel) {
        let text: String = script.text().collect();
        if let Some(captures) = WINDOW_OPEN_RE.captures(&text) {
            return Some(captures[1].to_string());
        }
        if let Some(captures) = LOCATION_HREF_RE.captures(&text) {
            return Some(captures[1].to_string());
        }
        if let Some(captures) = SCRIPT_SRC_RE.captures(&text) {
            return Some(captures[1].to_string());
        }
    }
    None
}

/// Normalize a possibly-relative portal path against the portal base URL.
///
/// Portals emit Windows-flavored relative paths (`.\files\doc1.pdf`) as well
/// as `./files/...` and bare relative paths; all of them resolve against the
/// portal base, with backslashes treated as path separators.
pub(crate) fn normalize_portal_path(base_url: &str, raw: &str) -> String {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return raw.to_string();
    }
    let forward = raw.replace('\\', "/");
    let trimmed = forward
        .trim_start_matches("./")
        .trim_start_matches('/');
    format!("{}/{}", base_url.trim_end_matches('/'), trimmed)
}

/// Drop a fragment identifier; the server never sees it and some portals
/// append viewer-state fragments like `#toolbar=0`
pub(crate) fn strip_fragment(url: &str) -> String {
    match url.split_once('#') {
        Some((before, _)) => before.to_string(),
        None => url.to_string(),
    }
}

fn is_html_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    // An absent content type is treated as HTML: the safe direction, since
    // stage 3 re-validates the bytes themselves
    ct.is_empty() || ct.contains("text/html") || ct.contains("application/xhtml")
}

/// Sniff whether a payload is actually an HTML page.
///
/// Only the leading bytes are examined; the portal's error and login pages
/// all start with a doctype or an `<html` tag.
pub(crate) fn looks_like_html(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    let text = String::from_utf8_lossy(head).to_ascii_lowercase();
    let trimmed = text.trim_start();
    trimmed.starts_with("<!doctype") || trimmed.starts_with("<html") || text.contains("<html")
}
