//! Headline sources for the configured news sites.
//!
//! Every site is reached through the [`HeadlineSource`] capability. The variant
//! is chosen once, when the registry turns a [`SourceDescriptor`] into a [`Source`]:
//!
//! | Variant | Module | Method |
//! |---------|--------|--------|
//! | Static | [`static_page`] | One HTTP GET with browser headers, DOM query |
//! | Rendered | [`rendered`] | Headless render via Browserless, wait for locator, DOM query |
//!
//! Both variants share [`extract_headlines`] for locator evaluation and the
//! [`is_relevant`] filter applied before headlines leave the source.

pub mod rendered;
pub mod static_page;

use crate::error::{ConfigError, SourceError};
use crate::models::{RawHeadline, SourceDescriptor};
use crate::normalize::tokens;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

pub use rendered::{RenderedSource, Renderer};
pub use static_page::StaticSource;

/// Substrings that mark video, player and advertising entries.
const DENYLIST: &[&str] = &["video", "advertisement", "player/play/video"];

/// Whole tokens that mark advertising entries. Substring matching would hit "road", "leader".
const DENY_TOKENS: &[&str] = &["ad"];

const BROWSER_UA: &str = concat!(
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 ",
    "(KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36"
);

/// Fixed browser-identifying header set sent with every page request.
pub fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(REFERER, HeaderValue::from_static("https://www.google.com/"));
    headers
}

/// Compiled headline and link locators for one source.
#[derive(Debug, Clone)]
pub struct Locators {
    headline: Selector,
    /// `None` means the headline element or its nearest `<a>` ancestor carries the href.
    link: Option<Selector>,
}

impl Locators {
    pub fn compile(descriptor: &SourceDescriptor) -> Result<Self, ConfigError> {
        let headline = Selector::parse(&descriptor.headline_locator).map_err(|_| {
            ConfigError::InvalidSelector {
                source_name: descriptor.name.clone(),
                field: "headline_selector",
                selector: descriptor.headline_locator.clone(),
            }
        })?;

        let link_raw = descriptor.link_locator.trim();
        let link = if link_raw.is_empty() || link_raw == ":scope" {
            None
        } else {
            Some(
                Selector::parse(link_raw).map_err(|_| ConfigError::InvalidSelector {
                    source_name: descriptor.name.clone(),
                    field: "link_selector",
                    selector: descriptor.link_locator.clone(),
                })?,
            )
        };
        Ok(Self { headline, link })
    }
}

fn own_or_ancestor_href<'a>(el: ElementRef<'a>) -> Option<&'a str> {
    if let Some(href) = el.value().attr("href") {
        return Some(href);
    }
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "a")
        .and_then(|a| a.value().attr("href"))
}

/// Apply the locators to a page and return every `(headline, link)` pair found.
pub fn extract_headlines(html: &str, locators: &Locators) -> Vec<RawHeadline> {
    let document = Html::parse_document(html);
    let mut out = Vec::new();

    for el in document.select(&locators.headline) {
        let headline = el.text().collect::<Vec<_>>().join(" ");
        let headline = headline.split_whitespace().collect::<Vec<_>>().join(" ");
        if headline.is_empty() {
            continue;
        }

        let href = match &locators.link {
            Some(sel) => el
                .select(sel)
                .find_map(|a| a.value().attr("href"))
                .or_else(|| own_or_ancestor_href(el)),
            None => own_or_ancestor_href(el),
        };

        if let Some(link) = href {
            out.push(RawHeadline {
                headline,
                link: link.trim().to_string(),
            });
        }
    }
    out
}

/// Drop short headlines and video/advertising entries.
pub fn is_relevant(headline: &RawHeadline) -> bool {
    if headline.headline.split_whitespace().count() <= 2 {
        return false;
    }
    let text = headline.headline.to_lowercase();
    let link = headline.link.to_lowercase();
    if DENYLIST
        .iter()
        .any(|deny| text.contains(deny) || link.contains(deny))
    {
        return false;
    }
    !tokens(&text)
        .chain(tokens(&link))
        .any(|t| DENY_TOKENS.contains(&t.as_str()))
}

/// Capability producing raw headlines for one configured site.
pub trait HeadlineSource {
    fn descriptor(&self) -> &SourceDescriptor;

    /// Retrieve every headline the locators match, unfiltered.
    async fn fetch_raw(&self) -> Result<Vec<RawHeadline>, SourceError>;

    /// Retrieve headlines with the relevance filter applied.
    async fn fetch_headlines(&self) -> Result<Vec<RawHeadline>, SourceError> {
        let raw = self.fetch_raw().await?;
        let total = raw.len();
        let kept: Vec<RawHeadline> = raw.into_iter().filter(is_relevant).collect();
        debug!(
            source = %self.descriptor().name,
            total,
            kept = kept.len(),
            "Filtered headlines"
        );
        Ok(kept)
    }
}

/// A source bound to its fetch strategy.
#[derive(Debug)]
pub enum Source {
    Static(StaticSource),
    Rendered(RenderedSource),
}

impl Source {
    /// Pick the fetch strategy from the descriptor's `dynamic` flag.
    pub fn from_descriptor(
        descriptor: SourceDescriptor,
        http: &reqwest::Client,
        renderer: Option<&Renderer>,
    ) -> Result<Self, ConfigError> {
        let locators = Locators::compile(&descriptor)?;
        if descriptor.is_dynamic {
            let renderer =
                renderer.ok_or_else(|| ConfigError::NoRenderer(descriptor.name.clone()))?;
            Ok(Source::Rendered(RenderedSource::new(
                descriptor,
                locators,
                renderer.clone(),
            )))
        } else {
            Ok(Source::Static(StaticSource::new(
                descriptor,
                locators,
                http.clone(),
            )))
        }
    }
}

impl HeadlineSource for Source {
    fn descriptor(&self) -> &SourceDescriptor {
        match self {
            Source::Static(s) => s.descriptor(),
            Source::Rendered(s) => s.descriptor(),
        }
    }

    async fn fetch_raw(&self) -> Result<Vec<RawHeadline>, SourceError> {
        match self {
            Source::Static(s) => s.fetch_raw().await,
            Source::Rendered(s) => s.fetch_raw().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(headline: &str, link: &str, dynamic: bool) -> SourceDescriptor {
        SourceDescriptor {
            name: "fixture".into(),
            base_url: "https://news.example.com/".into(),
            headline_locator: headline.into(),
            link_locator: link.into(),
            is_dynamic: dynamic,
        }
    }

    fn raw(headline: &str, link: &str) -> RawHeadline {
        RawHeadline {
            headline: headline.into(),
            link: link.into(),
        }
    }

    const PAGE: &str = r#"
        <html><body>
          <div class="card"><a href="/world/one">
            <h2 data-testid="card-headline">Rivers rise after week of rain</h2>
          </a></div>
          <div class="card"><a href="/world/two">
            <h2 data-testid="card-headline">  Council approves   new library </h2>
          </a></div>
          <div class="story">
            <h3>Bridge repairs finish early downtown</h3>
            <a class="more" href="/local/bridge">more</a>
          </div>
          <h2 data-testid="card-headline">Orphan headline without any link</h2>
        </body></html>
    "#;

    #[test]
    fn test_extract_uses_ancestor_anchor_when_link_locator_is_empty() {
        let locators =
            Locators::compile(&descriptor("h2[data-testid='card-headline']", "", false)).unwrap();
        let out = extract_headlines(PAGE, &locators);
        assert_eq!(
            out,
            vec![
                raw("Rivers rise after week of rain", "/world/one"),
                raw("Council approves new library", "/world/two"),
            ]
        );
    }

    #[test]
    fn test_extract_uses_relative_link_locator() {
        let locators = Locators::compile(&descriptor("div.story", "a.more", false)).unwrap();
        let out = extract_headlines(PAGE, &locators);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].link, "/local/bridge");
        assert!(out[0].headline.starts_with("Bridge repairs finish early downtown"));
    }

    #[test]
    fn test_invalid_selector_is_config_error() {
        let err = Locators::compile(&descriptor("h2[", "", false)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSelector { field: "headline_selector", .. }));
    }

    #[test]
    fn test_relevance_filter_drops_short_headlines() {
        assert!(!is_relevant(&raw("Breaking news", "/a")));
        assert!(!is_relevant(&raw("Live", "/a")));
        assert!(is_relevant(&raw("Rivers rise after rain", "/a")));
    }

    #[test]
    fn test_relevance_filter_drops_denylisted_entries() {
        assert!(!is_relevant(&raw("Watch the video of the launch", "/a")));
        assert!(!is_relevant(&raw("Rivers rise after rain", "/player/play/video/123")));
        assert!(!is_relevant(&raw("Advertisement: new cars on sale", "/a")));
        assert!(!is_relevant(&raw("Sponsored ad for summer travel", "/a")));
        assert!(!is_relevant(&raw("Summer travel deals announced", "/ad/123")));
    }

    #[test]
    fn test_relevance_filter_keeps_words_containing_ad() {
        assert!(is_relevant(&raw("Road closures ahead of the parade", "/local/roads")));
        assert!(is_relevant(&raw("Party leader addresses supporters", "/politics/leader")));
    }

    #[test]
    fn test_dynamic_descriptor_without_renderer_is_rejected() {
        let http = reqwest::Client::new();
        let err = Source::from_descriptor(descriptor("h2", "", true), &http, None).unwrap_err();
        assert!(matches!(err, ConfigError::NoRenderer(name) if name == "fixture"));
    }

    #[test]
    fn test_variant_selected_from_descriptor_flag() {
        let http = reqwest::Client::new();
        let renderer =
            Renderer::new("http://localhost:3000", None, std::time::Duration::from_secs(15))
                .unwrap();

        let s =
            Source::from_descriptor(descriptor("h2", "", false), &http, Some(&renderer)).unwrap();
        assert!(matches!(s, Source::Static(_)));

        let d =
            Source::from_descriptor(descriptor("h2", "", true), &http, Some(&renderer)).unwrap();
        assert!(matches!(d, Source::Rendered(_)));
    }
}
