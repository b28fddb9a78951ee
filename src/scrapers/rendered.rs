//! Rendered-page headline source.
//!
//! Pages that build their headline lists with JavaScript are rendered by a
//! Browserless instance. The `/content` endpoint loads the page, waits up to
//! the configured bound for the headline locator to appear, and returns the
//! rendered DOM, which is then queried exactly like a static page.

use super::{HeadlineSource, Locators, extract_headlines};
use crate::error::{FetchError, SourceError};
use crate::models::{RawHeadline, SourceDescriptor};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Slack on top of the selector wait for page load and transfer.
const RENDER_GRACE: Duration = Duration::from_secs(15);

/// HTTP client for a Browserless `/content` endpoint.
#[derive(Debug, Clone)]
pub struct Renderer {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    wait_timeout: Duration,
}

impl Renderer {
    /// Client for a headless-browser rendering service.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Service root; a trailing slash is dropped
    /// * `token` - Optional access token appended to each request
    /// * `wait_timeout` - How long the service waits for the headline locator
    ///
    /// # Returns
    ///
    /// The renderer, or the error from building its HTTP client.
    pub fn new(
        base_url: &str,
        token: Option<&str>,
        wait_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(wait_timeout + RENDER_GRACE)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            wait_timeout,
        })
    }

    /// Render `url` and return its HTML once `selector` is present.
    ///
    /// # Returns
    ///
    /// The rendered document, [`SourceError::RenderTimeout`] when the service
    /// gives up waiting, or [`SourceError::Fetch`] for transport and status failures.
    #[instrument(level = "info", skip(self))]
    pub async fn content(&self, url: &str, selector: &str) -> Result<String, SourceError> {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={}", urlencoding::encode(token)));
        }

        let timeout_ms = self.wait_timeout.as_millis() as u64;
        let body = serde_json::json!({
            "url": url,
            "waitForSelector": { "selector": selector, "timeout": timeout_ms },
        });

        let timed_out = || SourceError::RenderTimeout {
            url: url.to_string(),
            selector: selector.to_string(),
            timeout_ms,
        };

        let resp = match self.http.post(&endpoint).json(&body).send().await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => return Err(timed_out()),
            Err(e) => return Err(FetchError::from(e).into()),
        };

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            if status.as_u16() == 408 || message.to_ascii_lowercase().contains("timeout") {
                return Err(timed_out());
            }
            warn!(status = status.as_u16(), %message, "Renderer rejected request");
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }
            .into());
        }

        resp.text().await.map_err(|e| FetchError::from(e).into())
    }
}

#[derive(Debug)]
pub struct RenderedSource {
    descriptor: SourceDescriptor,
    locators: Locators,
    renderer: Renderer,
}

impl RenderedSource {
    pub fn new(descriptor: SourceDescriptor, locators: Locators, renderer: Renderer) -> Self {
        Self {
            descriptor,
            locators,
            renderer,
        }
    }
}

impl HeadlineSource for RenderedSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    #[instrument(level = "info", skip_all, fields(source = %self.descriptor.name))]
    async fn fetch_raw(&self) -> Result<Vec<RawHeadline>, SourceError> {
        let html = self
            .renderer
            .content(&self.descriptor.base_url, &self.descriptor.headline_locator)
            .await?;
        let headlines = extract_headlines(&html, &self.locators);
        info!(
            count = headlines.len(),
            url = %self.descriptor.base_url,
            "Indexed rendered headlines"
        );
        Ok(headlines)
    }
}
