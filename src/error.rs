//! Typed failure reasons for every pipeline stage.
//!
//! Only [`ConfigError`] is fatal. Every other error is scoped to one source or
//! one article: the caller logs it and either skips the unit or substitutes a
//! fallback value (neutral verdict, truncated summary, empty entity list).

use thiserror::Error;

/// Bad or unreadable configuration. Aborts the run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("source `{source_name}` is missing `{field}`")]
    MissingField { source_name: String, field: &'static str },

    #[error("source `{source_name}` has an invalid base url `{url}`")]
    InvalidBaseUrl { source_name: String, url: String },

    #[error("source `{source_name}` has an invalid {field} `{selector}`")]
    InvalidSelector {
        source_name: String,
        field: &'static str,
        selector: String,
    },

    #[error("no sources configured")]
    Empty,

    #[error("dynamic source `{0}` requires a rendering service (--browserless-url)")]
    NoRenderer(String),
}

/// An HTTP fetch that did not produce a usable page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
}

/// Headline retrieval failure for a single source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("timed out after {timeout_ms}ms waiting for `{selector}` on {url}")]
    RenderTimeout {
        url: String,
        selector: String,
        timeout_ms: u64,
    },
}

/// The external sentiment model could not produce a verdict.
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("no model service configured")]
    Unavailable,

    #[error("model transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model service returned status {0}")]
    Status(u16),
}

#[derive(Debug, Error)]
pub enum SummarizationError {
    #[error("summarizer unavailable")]
    Unavailable,

    #[error("summarizer request failed: {0}")]
    Request(String),

    #[error("summarizer returned an empty summary")]
    Empty,
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("entity extractor unavailable")]
    Unavailable,

    #[error("entity extractor request failed: {0}")]
    Request(String),

    #[error("entity extractor returned malformed json: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Handing records to the persistence sink failed.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("sink rejected records with status {0}")]
    Status(u16),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_timeout_message_names_selector() {
        let err = SourceError::RenderTimeout {
            url: "https://example.com".into(),
            selector: "h3.title".into(),
            timeout_ms: 15000,
        };
        let msg = err.to_string();
        assert!(msg.contains("h3.title"));
        assert!(msg.contains("15000ms"));
    }

    #[test]
    fn fetch_error_converts_into_source_error() {
        let err: SourceError = FetchError::Status {
            status: 503,
            url: "https://example.com".into(),
        }
        .into();
        assert!(matches!(err, SourceError::Fetch(FetchError::Status { status: 503, .. })));
    }
}
