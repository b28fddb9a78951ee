//! Source descriptor loading.
//!
//! Descriptors live in a YAML mapping from source name to its settings:
//!
//! ```yaml
//! bbc:
//!   base_url: https://www.bbc.com/news
//!   headline_selector: "h2[data-testid='card-headline']"
//!   link_selector: ""          # headline sits inside its <a>
//!   dynamic: false
//! reuters:
//!   base_url: https://www.reuters.com/
//!   headline_selector: "a[data-testid='Heading']"
//!   link_selector: ":scope"
//!   dynamic: true
//! ```
//!
//! `headline_xpath` / `link_xpath` are accepted as aliases for older files, but
//! their values must still be CSS selectors. Order in the file is preserved.

use crate::error::ConfigError;
use crate::models::SourceDescriptor;
use crate::scrapers::{Locators, Renderer, Source};
use serde::Deserialize;
use std::fs;
use tracing::{info, instrument};
use url::Url;

#[derive(Debug, Deserialize)]
struct DescriptorEntry {
    base_url: Option<String>,
    #[serde(alias = "headline_xpath")]
    headline_selector: Option<String>,
    #[serde(alias = "link_xpath")]
    link_selector: Option<String>,
    #[serde(default)]
    dynamic: bool,
}

/// Read and validate every descriptor in `path`.
///
/// # Arguments
///
/// * `path` - YAML mapping of source name to descriptor
///
/// # Returns
///
/// Descriptors in file order, or the first [`ConfigError`] found. Selectors
/// are compiled here so a bad locator fails at startup.
#[instrument(level = "info")]
pub fn load(path: &str) -> Result<Vec<SourceDescriptor>, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    let descriptors = parse(path, &raw)?;
    info!(count = descriptors.len(), "Loaded source descriptors");
    Ok(descriptors)
}

/// Parse descriptor YAML. `path` is only used in error messages.
pub fn parse(path: &str, raw: &str) -> Result<Vec<SourceDescriptor>, ConfigError> {
    let parse_err = |source| ConfigError::Parse {
        path: path.to_string(),
        source,
    };
    let mapping: serde_yaml::Mapping = serde_yaml::from_str(raw).map_err(parse_err)?;
    if mapping.is_empty() {
        return Err(ConfigError::Empty);
    }

    let mut descriptors = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let name = match key {
            serde_yaml::Value::String(s) => s,
            other => serde_yaml::to_string(&other)
                .unwrap_or_default()
                .trim()
                .to_string(),
        };
        let entry: DescriptorEntry = serde_yaml::from_value(value).map_err(parse_err)?;
        descriptors.push(validate(name, entry)?);
    }
    Ok(descriptors)
}

fn validate(name: String, entry: DescriptorEntry) -> Result<SourceDescriptor, ConfigError> {
    let missing = |field| ConfigError::MissingField {
        source_name: name.clone(),
        field,
    };
    let base_url = entry.base_url.ok_or_else(|| missing("base_url"))?;
    let headline_locator = entry
        .headline_selector
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| missing("headline_selector"))?;
    let link_locator = entry.link_selector.ok_or_else(|| missing("link_selector"))?;

    match Url::parse(&base_url) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => {}
        _ => {
            return Err(ConfigError::InvalidBaseUrl {
                source_name: name,
                url: base_url,
            });
        }
    }

    let descriptor = SourceDescriptor {
        name,
        base_url,
        headline_locator,
        link_locator,
        is_dynamic: entry.dynamic,
    };
    Locators::compile(&descriptor)?;
    Ok(descriptor)
}

/// Bind every descriptor to its fetch strategy, once, before the run starts.
///
/// Fails with [`ConfigError::NoRenderer`] when a dynamic source has no `renderer`.
pub fn build_sources(
    descriptors: Vec<SourceDescriptor>,
    http: &reqwest::Client,
    renderer: Option<&Renderer>,
) -> Result<Vec<Source>, ConfigError> {
    descriptors
        .into_iter()
        .map(|d| Source::from_descriptor(d, http, renderer))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SOURCES: &str = r#"
cbc:
  base_url: https://www.cbc.ca/news
  headline_xpath: "a.card h3"
  link_xpath: ""
  dynamic: true
bbc:
  base_url: https://www.bbc.com/news
  headline_selector: "h2[data-testid='card-headline']"
  link_selector: ""
"#;

    #[test]
    fn test_parse_preserves_order_and_aliases() {
        let out = parse("inline", SOURCES).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "cbc");
        assert_eq!(out[0].headline_locator, "a.card h3");
        assert!(out[0].is_dynamic);
        assert_eq!(out[1].name, "bbc");
        assert!(!out[1].is_dynamic);
    }

    #[test]
    fn test_missing_locator_is_config_error() {
        let raw = "cnn:\n  base_url: https://www.cnn.com/\n  headline_selector: a.h\n";
        let err = parse("inline", raw).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField { field: "link_selector", .. }
        ));
    }

    #[test]
    fn test_blank_headline_locator_is_missing() {
        let raw = "cnn:\n  base_url: https://www.cnn.com/\n  \
                   headline_selector: ' '\n  link_selector: ''\n";
        let err = parse("inline", raw).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField { field: "headline_selector", .. }
        ));
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let raw = "x:\n  base_url: not a url\n  headline_selector: h2\n  link_selector: ''\n";
        assert!(matches!(
            parse("inline", raw).unwrap_err(),
            ConfigError::InvalidBaseUrl { .. }
        ));
    }

    #[test]
    fn test_empty_and_malformed_files() {
        assert!(matches!(parse("inline", "{}").unwrap_err(), ConfigError::Empty));
        assert!(matches!(
            parse("inline", "- just\n- a list\n").unwrap_err(),
            ConfigError::Parse { .. }
        ));
    }

    #[test]
    fn test_load_reads_file_and_reports_unreadable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SOURCES.as_bytes()).unwrap();
        let out = load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(out.len(), 2);

        let err = load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_shipped_sources_file_is_valid() {
        let out = parse("config/sources.yaml", include_str!("../config/sources.yaml")).unwrap();
        assert!(out.iter().any(|d| d.is_dynamic));
        assert!(out.iter().all(|d| d.base_url.starts_with("https://")));
    }

    #[test]
    fn test_build_sources_requires_renderer_for_dynamic() {
        let descriptors = parse("inline", SOURCES).unwrap();
        let http = reqwest::Client::new();
        assert!(matches!(
            build_sources(descriptors, &http, None).unwrap_err(),
            ConfigError::NoRenderer(name) if name == "cbc"
        ));
    }
}
