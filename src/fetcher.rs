//! Full-article retrieval.
//!
//! [`ArticleFetcher`] downloads an article page, extracts its body text and a
//! representative image. A 403 is retried exactly once after a short backoff,
//! reusing the session's cookies; any other failure yields the
//! [`UNAVAILABLE`](crate::models::UNAVAILABLE) sentinel.
//!
//! # Image Resolution
//!
//! 1. `<meta property="og:image">`
//! 2. `<meta name="twitter:image">`
//! 3. first absolute `<img src>` inside `article`, `main` or `[role=main]`
//! 4. first absolute `<img src>` anywhere
//! 5. none

use crate::error::FetchError;
use crate::models::ArticleContent;
use crate::normalize::clean;
use crate::scrapers::browser_headers;
use once_cell::sync::Lazy;
use rand::{Rng, rng};
use reqwest::StatusCode;
use scraper::{Html, Selector};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

static OG_IMAGE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:image"], meta[name="og:image"]"#).unwrap()
});
static TWITTER_IMAGE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(concat!(
        r#"meta[name="twitter:image"], meta[property="twitter:image"], "#,
        r#"meta[name="twitter:image:src"]"#
    ))
    .unwrap()
});
static REGION_IMG: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"article img, main img, [role="main"] img"#).unwrap());
static ANY_IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
static REGION_P: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"article p, main p, [role="main"] p"#).unwrap());
static ANY_P: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

/// Anything that can turn a canonical link into article content.
pub trait ContentFetcher {
    /// Never fails: unusable pages come back as [`ArticleContent::unavailable`].
    async fn fetch(&self, link: &str) -> ArticleContent;
}

/// HTTP article fetcher with a cookie-keeping session.
#[derive(Debug, Clone)]
pub struct ArticleFetcher {
    http: reqwest::Client,
    retry_backoff: Duration,
}

impl ArticleFetcher {
    /// Browser-like client with a cookie jar.
    ///
    /// # Arguments
    ///
    /// * `retry_backoff` - Pause before the single retry of a 403 response
    pub fn new(retry_backoff: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .default_headers(browser_headers())
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            retry_backoff,
        })
    }

    async fn get_once(&self, link: &str) -> Result<reqwest::Response, FetchError> {
        Ok(self.http.get(link).send().await?)
    }

    /// GET the page, retrying once on 403.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_html(&self, link: &str) -> Result<String, FetchError> {
        let mut resp = self.get_once(link).await?;

        if resp.status() == StatusCode::FORBIDDEN {
            let jitter_ms: u64 = rng().random_range(0..=100);
            let delay = self.retry_backoff + Duration::from_millis(jitter_ms);
            warn!(%link, ?delay, "Access denied; retrying once");
            sleep(delay).await;
            resp = self.get_once(link).await?;
        }

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: link.to_string(),
            });
        }
        Ok(resp.text().await?)
    }
}

impl ContentFetcher for ArticleFetcher {
    #[instrument(level = "info", skip(self))]
    async fn fetch(&self, link: &str) -> ArticleContent {
        match self.fetch_html(link).await {
            Ok(html) => {
                let content = parse_article(&html);
                if content.is_unavailable() {
                    warn!(%link, "Article page had no body text");
                } else {
                    debug!(
                        %link,
                        bytes = content.body.len(),
                        image = ?content.image,
                        "Parsed article"
                    );
                }
                content
            }
            Err(e) => {
                warn!(%link, error = %e, "Article fetch failed");
                ArticleContent::unavailable()
            }
        }
    }
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .filter_map(|m| m.value().attr("content"))
        .map(str::trim)
        .find(|c| !c.is_empty())
        .map(String::from)
}

fn first_absolute_img(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .find(|src| src.starts_with("http://") || src.starts_with("https://"))
        .map(String::from)
}

/// Representative image following the resolution order in the module docs.
pub fn resolve_image(document: &Html) -> Option<String> {
    meta_content(document, &OG_IMAGE)
        .or_else(|| meta_content(document, &TWITTER_IMAGE))
        .or_else(|| first_absolute_img(document, &REGION_IMG))
        .or_else(|| first_absolute_img(document, &ANY_IMG))
}

fn paragraphs(document: &Html, selector: &Selector) -> String {
    document
        .select(selector)
        .map(|p| p.text().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract cleaned body text and image from an article page.
pub fn parse_article(html: &str) -> ArticleContent {
    let document = Html::parse_document(html);

    let mut body = paragraphs(&document, &REGION_P);
    if body.trim().is_empty() {
        body = paragraphs(&document, &ANY_P);
    }
    let body = clean(&body);
    if body.is_empty() {
        return ArticleContent::unavailable();
    }

    ArticleContent {
        body,
        image: resolve_image(&document),
    }
}
