//! Cookie-bearing HTTP session for the portal
//!
//! One [`SessionClient`] lives for the whole run. Every request carries the
//! cookies accumulated by previous responses (the portal's disclaimer and
//! postback workflow is stateful) plus a realistic browser identity, since
//! these portals reject obvious bots. Network and timeout errors propagate
//! to the caller; retries are not this layer's concern.

use crate::config::PortalConfig;
use crate::error::{Error, Result};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;

/// An HTML (or HTML-probe) response
#[derive(Debug)]
pub struct HtmlResponse {
    /// URL the response was ultimately served from (after redirects)
    pub final_url: String,
    /// Declared Content-Type header (empty string if absent)
    pub content_type: String,
    /// Response body decoded as text
    pub body: String,
}

/// A binary response
#[derive(Debug)]
pub struct BinaryResponse {
    /// Declared Content-Type header (empty string if absent)
    pub content_type: String,
    /// Raw response bytes, not text-decoded
    pub bytes: Vec<u8>,
}

/// Cookie-jar HTTP client scoped to one retrieval run
pub struct SessionClient {
    client: reqwest::Client,
    html_timeout: Duration,
    binary_timeout: Duration,
}

impl SessionClient {
    /// Build a session client from portal configuration.
    ///
    /// The underlying reqwest client keeps a cookie store for the lifetime
    /// of the session and sends the configured User-Agent and
    /// Accept-Language on every request.
    pub fn new(portal: &PortalConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&portal.user_agent).map_err(|e| Error::Config {
                message: format!("invalid user agent: {}", e),
                key: Some("user_agent".to_string()),
            })?,
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&portal.accept_language).map_err(|e| Error::Config {
                message: format!("invalid accept-language: {}", e),
                key: Some("accept_language".to_string()),
            })?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            html_timeout: portal.html_timeout,
            binary_timeout: portal.binary_timeout,
        })
    }

    /// GET a page as text with the HTML timeout
    pub async fn get_html(&self, url: &str) -> Result<HtmlResponse> {
        let response = self
            .client
            .get(url)
            .timeout(self.html_timeout)
            .send()
            .await?
            .error_for_status()?;

        let final_url = response.url().to_string();
        let content_type = declared_content_type(&response);
        let body = response.text().await?;

        Ok(HtmlResponse {
            final_url,
            content_type,
            body,
        })
    }

    /// POST a form-encoded body with the HTML timeout
    ///
    /// Pairs are sent in order; ASP.NET portals are sensitive to field
    /// ordering in postback bodies.
    pub async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<HtmlResponse> {
        let response = self
            .client
            .post(url)
            .timeout(self.html_timeout)
            .form(form)
            .send()
            .await?
            .error_for_status()?;

        let final_url = response.url().to_string();
        let content_type = declared_content_type(&response);
        let body = response.text().await?;

        Ok(HtmlResponse {
            final_url,
            content_type,
            body,
        })
    }

    /// GET a URL as raw bytes with the (longer) binary timeout
    pub async fn get_binary(&self, url: &str) -> Result<BinaryResponse> {
        let response = self
            .client
            .get(url)
            .timeout(self.binary_timeout)
            .send()
            .await?
            .error_for_status()?;

        let content_type = declared_content_type(&response);
        let bytes = response.bytes().await?.to_vec();

        Ok(BinaryResponse {
            content_type,
            bytes,
        })
    }
}

fn declared_content_type(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}
