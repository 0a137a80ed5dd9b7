//! ASP.NET disclaimer and postback negotiation
//!
//! Turns a disclaimer page into an authenticated session capable of listing
//! documents. The flow is three requests on one cookie jar:
//!
//! 1. GET the disclaimer page for an application id.
//! 2. POST the form back with every hidden field echoed verbatim (the portal
//!    hides anti-forgery tokens there) plus the agreement fields.
//! 3. POST a second body carrying only the ASP.NET postback state tokens and
//!    `__EVENTTARGET=btnViewFiles`, which makes the server render the file
//!    listing table.
//!
//! Rows whose link carries no numeric document id are skipped silently; the
//! portal renders header and spacer rows in the same table.

use crate::config::PortalConfig;
use crate::error::{Result, SessionError};
use crate::session::SessionClient;
use crate::types::DocumentReference;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

/// Postback state tokens the portal requires echoed back unmodified
const POSTBACK_TOKENS: [&str; 3] = ["__VIEWSTATE", "__VIEWSTATEGENERATOR", "__EVENTVALIDATION"];

#[allow(clippy::expect_used)] // pattern literal is valid
static DOCID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("docid pattern is valid"));

/// Accept the disclaimer and return the portal's document listing.
///
/// Session-level failures (missing form action, missing postback tokens,
/// transport errors) are fatal for the run: without them the portal will not
/// render the file list. Output order matches the table's row order, which
/// keeps download numbering reproducible across runs.
pub async fn list_documents(
    session: &SessionClient,
    portal: &PortalConfig,
    application_id: &str,
) -> Result<Vec<DocumentReference>> {
    let disclaimer_url = portal.disclaimer_url(application_id);
    tracing::debug!(url = %disclaimer_url, "fetching disclaimer page");
    let disclaimer = session.get_html(&disclaimer_url).await?;

    let form = parse_disclaimer_form(&disclaimer.body);
    let action = form.action.ok_or_else(|| SessionError::FormActionMissing {
        url: disclaimer.final_url.clone(),
    })?;
    let action_url = resolve_action(&disclaimer.final_url, &action);

    let mut agreement = form.hidden_fields;
    agreement.push(("chkAgree".to_string(), "on".to_string()));
    agreement.push(("btnAgree".to_string(), "I Agree".to_string()));

    tracing::debug!(url = %action_url, "submitting disclaimer agreement");
    let shell = session.post_form(&action_url, &agreement).await?;

    let mut postback = extract_postback_tokens(&shell.body, &shell.final_url)?;
    postback.push(("__EVENTTARGET".to_string(), "btnViewFiles".to_string()));
    postback.push(("__EVENTARGUMENT".to_string(), String::new()));

    tracing::debug!(url = %action_url, "requesting file listing postback");
    let listing = session.post_form(&action_url, &postback).await?;

    let references = parse_document_rows(
        &listing.body,
        &portal.view_files_marker,
        &portal.base_url,
    );
    tracing::info!(
        application_id,
        count = references.len(),
        "discovered document references"
    );
    Ok(references)
}

/// Hidden fields and action attribute of the disclaimer form
#[derive(Debug, Default)]
pub(crate) struct DisclaimerForm {
    /// Every hidden `(name, value)` pair in document order, echoed verbatim
    pub(crate) hidden_fields: Vec<(String, String)>,
    /// The form's `action` attribute, if present
    pub(crate) action: Option<String>,
}

#[allow(clippy::unwrap_used)] // selector literals are valid
pub(crate) fn parse_disclaimer_form(html: &str) -> DisclaimerForm {
    let document = Html::parse_document(html);
    let form_sel = Selector::parse("form").unwrap();
    let hidden_sel = Selector::parse(r#"input[type="hidden"]"#).unwrap();

    let action = document
        .select(&form_sel)
        .next()
        .and_then(|f| f.value().attr("action"))
        .map(str::to_string);

    let mut hidden_fields = Vec::new();
    for input in document.select(&hidden_sel) {
        if let Some(name) = input.value().attr("name") {
            let value = input.value().attr("value").unwrap_or("");
            hidden_fields.push((name.to_string(), value.to_string()));
        }
    }
    DisclaimerForm {
        hidden_fields,
        action,
    }
}

/// Resolve a form action attribute against the page it was served from
pub(crate) fn resolve_action(page_url: &str, action: &str) -> String {
    if action.starts_with("http://") || action.starts_with("https://") {
        return action.to_string();
    }
    match url::Url::parse(page_url).and_then(|base| base.join(action)) {
        Ok(resolved) => resolved.to_string(),
        // Unjoinable action; send it as-is and let the request fail loudly
        Err(_) => action.to_string(),
    }
}

#[allow(clippy::unwrap_used)] // selectors are built from known-valid token names
pub(crate) fn extract_postback_tokens(html: &str, page_url: &str) -> Result<Vec<(String, String)>> {
    let document = Html::parse_document(html);
    let mut tokens = Vec::with_capacity(POSTBACK_TOKENS.len());
    for name in POSTBACK_TOKENS {
        let selector = Selector::parse(&format!(r#"input[name="{}"]"#, name)).unwrap();
        let value = document
            .select(&selector)
            .next()
            .and_then(|input| input.value().attr("value"))
            .ok_or_else(|| SessionError::MissingPostbackToken {
                name: name.to_string(),
                url: page_url.to_string(),
            })?;
        tokens.push((name.to_string(), value.to_string()));
    }
    Ok(tokens)
}

/// Scrape the file-listing table into document references.
///
/// One reference per row whose link href contains the view-files marker and
/// a numeric document id; everything else (headers, spacers, malformed rows)
/// is dropped without error.
#[allow(clippy::unwrap_used)] // selector literals are valid
pub(crate) fn parse_document_rows(
    html: &str,
    view_files_marker: &str,
    base_url: &str,
) -> Vec<DocumentReference> {
    let document = Html::parse_document(html);
    let row_sel = Selector::parse("table tr").unwrap();
    let link_sel = Selector::parse("a[href]").unwrap();
    let cell_sel = Selector::parse("td").unwrap();

    let mut references = Vec::new();
    for row in document.select(&row_sel) {
        let Some(link) = row
            .select(&link_sel)
            .find(|a| a.value().attr("href").is_some_and(|h| h.contains(view_files_marker)))
        else {
            continue;
        };
        // attr checked by the find above
        let href = link.value().attr("href").unwrap_or_default();
        let Some(docid) = DOCID_RE.find(href).map(|m| m.as_str().to_string()) else {
            tracing::debug!(href, "skipping row without a numeric document id");
            continue;
        };

        let title = row
            .select(&cell_sel)
            .nth(1)
            .map(|cell| {
                cell.text()
                    .collect::<String>()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        references.push(DocumentReference {
            url: absolutize(base_url, href),
            title,
            docid,
        });
    }
    references
}

fn absolutize(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            href.trim_start_matches('/')
        )
    }
}
