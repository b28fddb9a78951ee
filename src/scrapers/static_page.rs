//! Static-page headline source.
//!
//! One GET of the source's base URL with the browser header set; the response
//! HTML is queried directly with the compiled locators.

use super::{HeadlineSource, Locators, extract_headlines};
use crate::error::{FetchError, SourceError};
use crate::models::{RawHeadline, SourceDescriptor};
use tracing::{info, instrument};

#[derive(Debug)]
pub struct StaticSource {
    descriptor: SourceDescriptor,
    locators: Locators,
    http: reqwest::Client,
}

impl StaticSource {
    pub fn new(descriptor: SourceDescriptor, locators: Locators, http: reqwest::Client) -> Self {
        Self {
            descriptor,
            locators,
            http,
        }
    }
}

impl HeadlineSource for StaticSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    #[instrument(level = "info", skip_all, fields(source = %self.descriptor.name))]
    async fn fetch_raw(&self) -> Result<Vec<RawHeadline>, SourceError> {
        let url = &self.descriptor.base_url;
        let resp = self
            .http
            .get(url)
            .headers(super::browser_headers())
            .send()
            .await
            .map_err(FetchError::from)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.clone(),
            }
            .into());
        }

        let html = resp.text().await.map_err(FetchError::from)?;
        let headlines = extract_headlines(&html, &self.locators);
        info!(count = headlines.len(), %url, "Indexed headlines");
        Ok(headlines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::serve;
    use axum::{
        Router,
        http::{HeaderMap, StatusCode, header},
        response::Html,
        routing::get,
    };

    fn descriptor(base_url: String) -> SourceDescriptor {
        SourceDescriptor {
            name: "fixture".into(),
            base_url,
            headline_locator: "a.headline".into(),
            link_locator: "".into(),
            is_dynamic: false,
        }
    }

    fn source(base_url: String) -> StaticSource {
        let d = descriptor(base_url);
        let locators = Locators::compile(&d).unwrap();
        StaticSource::new(d, locators, reqwest::Client::new())
    }

    async fn front_page(headers: HeaderMap) -> Html<String> {
        let ua = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let extra = if ua.contains("Mozilla/5.0") {
            r#"<a class="headline" href="/ua">Browser header was sent along</a>"#
        } else {
            ""
        };
        Html(format!(
            r#"<html><body>
                <a class="headline" href="/news/one">Harbour festival draws big crowds</a>
                <a class="headline" href="/video/two">Watch video of the harbour festival</a>
                <a class="headline" href="/news/three">Short one</a>
                {extra}
            </body></html>"#
        ))
    }

    #[tokio::test]
    async fn test_fetches_and_filters_headlines() {
        let base = serve(Router::new().route("/", get(front_page))).await;
        let src = source(format!("{}/", base));

        let raw = src.fetch_raw().await.unwrap();
        assert_eq!(raw.len(), 4);

        let kept = src.fetch_headlines().await.unwrap();
        let texts: Vec<&str> = kept.iter().map(|h| h.headline.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Harbour festival draws big crowds", "Browser header was sent along"]
        );
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_error() {
        let app = Router::new().route("/", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let base = serve(app).await;
        let err = source(format!("{}/", base)).fetch_headlines().await.unwrap_err();
        assert!(matches!(
            err,
            SourceError::Fetch(FetchError::Status { status: 503, .. })
        ));
    }
}
