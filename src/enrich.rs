//! Summaries and named entities for fetched articles.
//!
//! Both capabilities are external services behind the [`Summarizer`] and
//! [`EntityExtractor`] traits. Neither is allowed to fail an article:
//! [`summarize_or_fallback`] degrades to a truncated prefix of the text and
//! [`entities_or_empty`] degrades to an empty list.
//!
//! [`LlmAnalyst`] implements both traits on top of an OpenAI-compatible
//! endpoint. `Option<T>` implements them too, so a run without LLM settings
//! simply reports every call as unavailable and takes the fallback branch.

use crate::api::{AskAsync, AskFnWrapper};
use crate::error::{ExtractionError, SummarizationError};
use crate::utils::{prefix_chars, truncate_for_log, upcase};
use awful_aj::{config, config::AwfulJadeConfig, template, template::ChatTemplate};
use itertools::Itertools;
use serde::Deserialize;
use std::error::Error;
use tracing::{debug, info, instrument, warn};

/// Texts shorter than this many words are returned instead of summarized.
pub const MIN_SUMMARY_WORDS: usize = 10;

/// Length of the fallback summary before the ellipsis.
pub const FALLBACK_SUMMARY_CHARS: usize = 300;

pub const MAX_ENTITIES: usize = 8;

/// One entity as reported by the extractor, before filtering.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Deserialize)]
struct EntityResponse {
    #[serde(default)]
    entities: Vec<Entity>,
}

/// Entity categories kept on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityCategory {
    Person,
    Organization,
    Place,
    Event,
    CreativeWork,
}

impl EntityCategory {
    /// Accepts NER tag names as well as plain words.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "person" | "per" | "people" => Some(EntityCategory::Person),
            "org" | "organization" | "organisation" | "norp" => Some(EntityCategory::Organization),
            "gpe" | "loc" | "location" | "place" | "fac" | "facility" => {
                Some(EntityCategory::Place)
            }
            "event" => Some(EntityCategory::Event),
            "work_of_art" | "creative_work" | "work" => Some(EntityCategory::CreativeWork),
            _ => None,
        }
    }
}

pub trait Summarizer {
    async fn summarize(&self, text: &str) -> Result<String, SummarizationError>;
}

pub trait EntityExtractor {
    async fn extract_entities(&self, text: &str) -> Result<Vec<Entity>, ExtractionError>;
}

impl<T: Summarizer> Summarizer for Option<T> {
    async fn summarize(&self, text: &str) -> Result<String, SummarizationError> {
        match self {
            Some(inner) => inner.summarize(text).await,
            None => Err(SummarizationError::Unavailable),
        }
    }
}

impl<T: EntityExtractor> EntityExtractor for Option<T> {
    async fn extract_entities(&self, text: &str) -> Result<Vec<Entity>, ExtractionError> {
        match self {
            Some(inner) => inner.extract_entities(text).await,
            None => Err(ExtractionError::Unavailable),
        }
    }
}

/// Truncated prefix used when no summary could be produced.
///
/// # Arguments
///
/// * `text` - The article body the summary would have been built from
///
/// # Returns
///
/// The first [`FALLBACK_SUMMARY_CHARS`] characters, capitalized, followed by
/// `...` when anything was cut. Shorter texts come back whole.
pub fn fallback_summary(text: &str) -> String {
    let text = text.trim();
    let head = prefix_chars(text, FALLBACK_SUMMARY_CHARS);
    if head.len() == text.len() {
        upcase(text)
    } else {
        format!("{}...", upcase(head.trim_end()))
    }
}

/// Summarize `text`, substituting [`fallback_summary`] on any failure.
#[instrument(level = "debug", skip_all)]
pub async fn summarize_or_fallback<S: Summarizer>(summarizer: &S, text: &str) -> String {
    let text = text.trim();
    if text.split_whitespace().count() < MIN_SUMMARY_WORDS {
        return upcase(text);
    }

    match summarizer.summarize(text).await {
        Ok(summary) if !summary.trim().is_empty() => upcase(summary.trim()),
        Ok(_) => {
            warn!(error = %SummarizationError::Empty, "Falling back to truncated text");
            fallback_summary(text)
        }
        Err(SummarizationError::Unavailable) => {
            debug!("No summarizer configured; using truncated text");
            fallback_summary(text)
        }
        Err(e) => {
            warn!(error = %e, "Falling back to truncated text");
            fallback_summary(text)
        }
    }
}

/// Keep allowed categories, drop case-insensitive repeats and cap the list.
pub fn canonicalize_entities(entities: Vec<Entity>) -> Vec<String> {
    entities
        .into_iter()
        .filter(|e| EntityCategory::parse(&e.category).is_some())
        .map(|e| e.name.split_whitespace().join(" "))
        .filter(|name| !name.is_empty())
        .unique_by(|name| name.to_lowercase())
        .take(MAX_ENTITIES)
        .collect()
}

/// Extract entities from `text`, substituting an empty list on any failure.
#[instrument(level = "debug", skip_all)]
pub async fn entities_or_empty<E: EntityExtractor>(extractor: &E, text: &str) -> Vec<String> {
    match extractor.extract_entities(text).await {
        Ok(entities) => canonicalize_entities(entities),
        Err(ExtractionError::Unavailable) => Vec::new(),
        Err(e) => {
            warn!(error = %e, "Entity extraction failed; emitting none");
            Vec::new()
        }
    }
}

/// Strip a Markdown code fence the model may wrap its JSON in.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse an extractor response. A bare array is accepted as well as `{"entities": [...]}`.
pub fn parse_entities(raw: &str) -> Result<Vec<Entity>, ExtractionError> {
    let body = strip_fences(raw);
    if body.starts_with('[') {
        return Ok(serde_json::from_str::<Vec<Entity>>(body)?);
    }
    Ok(serde_json::from_str::<EntityResponse>(body)?.entities)
}

/// LLM-backed summarizer and entity extractor.
#[derive(Debug)]
pub struct LlmAnalyst {
    config: AwfulJadeConfig,
    summary_template: ChatTemplate,
    entity_template: ChatTemplate,
}

impl LlmAnalyst {
    /// Load the client config and both chat templates.
    #[instrument(level = "info")]
    pub async fn load(
        config_path: &str,
        summary_template: &str,
        entity_template: &str,
    ) -> Result<Self, Box<dyn Error>> {
        let config = config::load_config(config_path)?;
        let summary_template = template::load_template(summary_template).await?;
        let entity_template = template::load_template(entity_template).await?;
        info!(config_path, "Loaded LLM configuration and templates");
        Ok(Self {
            config,
            summary_template,
            entity_template,
        })
    }
}

impl Summarizer for LlmAnalyst {
    async fn summarize(&self, text: &str) -> Result<String, SummarizationError> {
        let client = AskFnWrapper {
            config: &self.config,
            template: &self.summary_template,
        };
        client
            .ask(text)
            .await
            .map(|s| s.trim().to_string())
            .map_err(|e| SummarizationError::Request(e.to_string()))
    }
}

impl EntityExtractor for LlmAnalyst {
    async fn extract_entities(&self, text: &str) -> Result<Vec<Entity>, ExtractionError> {
        let client = AskFnWrapper {
            config: &self.config,
            template: &self.entity_template,
        };
        let raw = client
            .ask(text)
            .await
            .map_err(|e| ExtractionError::Request(e.to_string()))?;
        parse_entities(&raw).inspect_err(|e| {
            warn!(
                error = %e,
                response_preview = %truncate_for_log(&raw, 300),
                "Extractor returned non-conforming JSON"
            );
        })
    }
}
