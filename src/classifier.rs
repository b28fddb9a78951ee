//! Hybrid keyword-rule and model sentiment classifier.
//!
//! Rules are evaluated in a fixed order and the first match wins:
//!
//! 1. negative keyword, no positive keyword → `negative`
//! 2. positive keyword, no negative keyword → `positive`
//! 3. keywords of both polarities, or a mixed-signal phrase → `neutral`
//! 4. neutral-indicator phrase and no negative keyword → `neutral`
//! 5. the external model's label, mapped to three ways (failures → `neutral`)
//!
//! Matching is case-insensitive substring containment, not token matching, so
//! `"strike"` also fires inside `"strikes"` and `"striker"`. Keyword lists are
//! data: [`Lexicon`] is loaded once and never mutated afterwards.

use crate::error::{ClassificationError, ConfigError};
use crate::models::{Sentiment, SentimentVerdict, TriggeringRule};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Keyword sets driving rules 1 to 4. All entries are lowercase substrings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lexicon {
    pub negative: Vec<String>,
    pub positive: Vec<String>,
    #[serde(default)]
    pub mixed: Vec<String>,
    #[serde(default)]
    pub neutral_indicators: Vec<String>,
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            negative: owned(&[
                "violence", "violent", "conflict", "death", "dead", "crisis", "humiliation",
                "attack", "assault", "kill", "murder", "disaster", "scary", "danger", "terror",
                "threat", "catastroph", "fatal", "strike", "crash", "collapse", "flood",
                "earthquake", "shooting", "bomb", "injur", "wounded", "tragedy", "fraud",
                "scandal", "recession", "layoff", "arrest", "warfare", "war crime", "civil war",
            ]),
            positive: owned(&[
                "growth", "success", "progress", "peace", "achievement", "hope", "celebrat",
                "milestone", "breakthrough", "record high", "victory", "rescue", "recover",
                "boost", "thrive", "award", "innovation",
            ]),
            mixed: owned(&[
                "mixed reactions", "divided", "controvers", "debate", "uncertain", "not clear",
                "unclear", "question", "skeptical", "doubt", "standoff", "dispute", "split over",
            ]),
            neutral_indicators: owned(&[
                "policy", "strategy", "diplomatic talks", "treaty", "negotiation", "agreement",
                "report", "analysis", "study finds", "survey", "budget", "forecast",
            ]),
        }
    }
}

impl Lexicon {
    /// Load from a YAML file. Entries are lowercased and trimmed; blanks are dropped.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml(path, &raw)
    }

    pub fn from_yaml(path: &str, raw: &str) -> Result<Self, ConfigError> {
        let parsed: Lexicon = serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        let lexicon = parsed.normalized();
        for word in lexicon.overlaps() {
            warn!(%word, "Keyword appears in both the negative and positive sets");
        }
        Ok(lexicon)
    }

    fn normalized(self) -> Self {
        let clean = |words: Vec<String>| -> Vec<String> {
            words
                .into_iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect()
        };
        Self {
            negative: clean(self.negative),
            positive: clean(self.positive),
            mixed: clean(self.mixed),
            neutral_indicators: clean(self.neutral_indicators),
        }
    }

    /// Entries present in both polarity sets.
    pub fn overlaps(&self) -> Vec<&str> {
        self.negative
            .iter()
            .filter(|w| self.positive.contains(*w))
            .map(String::as_str)
            .collect()
    }
}

fn first_hit<'a>(text: &str, words: &'a [String]) -> Option<&'a str> {
    words
        .iter()
        .find(|w| text.contains(w.as_str()))
        .map(String::as_str)
}

/// Fallback verdict source for text the keyword rules do not decide.
pub trait SentimentModel {
    /// Return the model's raw label for `text`.
    async fn predict(&self, text: &str) -> Result<String, ClassificationError>;
}

/// Request body shape sent to the model service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModelRequest {
    /// `{"text": "..."}`
    Text,
    /// `{"keywords": ["...", ...]}` built from whitespace-separated words
    Keywords,
}

/// HTTP client for the external classifier service.
///
/// Sends `{"text": ...}` or `{"keywords": [...]}` and reads `{"final_sentiment": ...}`.
/// Without a URL every prediction fails with [`ClassificationError::Unavailable`].
#[derive(Debug, Clone)]
pub struct SentimentApi {
    http: reqwest::Client,
    url: Option<String>,
    request: ModelRequest,
}

#[derive(Debug, Deserialize)]
struct ModelResponse {
    final_sentiment: String,
}

impl SentimentApi {
    /// Client for the model service at `url`. `None` disables the model.
    pub fn new(url: Option<String>, request: ModelRequest) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self { http, url, request })
    }
}

impl SentimentModel for SentimentApi {
    #[instrument(level = "debug", skip_all)]
    async fn predict(&self, text: &str) -> Result<String, ClassificationError> {
        let url = self.url.as_deref().ok_or(ClassificationError::Unavailable)?;
        let body = match self.request {
            ModelRequest::Text => serde_json::json!({ "text": text }),
            ModelRequest::Keywords => {
                let keywords: Vec<&str> = text.split_whitespace().collect();
                serde_json::json!({ "keywords": keywords })
            }
        };

        let resp = self.http.post(url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClassificationError::Status(status.as_u16()));
        }
        let parsed: ModelResponse = resp.json().await?;
        Ok(parsed.final_sentiment)
    }
}

/// The decision engine. Holds no mutable state, so identical input always
/// yields an identical verdict (given a deterministic model).
#[derive(Debug)]
pub struct SentimentClassifier<M> {
    lexicon: Lexicon,
    model: M,
}

impl<M: SentimentModel> SentimentClassifier<M> {
    /// # Arguments
    ///
    /// * `lexicon` - Keyword sets for rules 1 to 4, fixed for the classifier's lifetime
    /// * `model` - Consulted only when no keyword rule decides
    pub fn new(lexicon: Lexicon, model: M) -> Self {
        Self { lexicon, model }
    }

    /// Apply rules 1 to 4 to already-lowercased text.
    pub fn decide_by_rules(&self, text: &str) -> Option<SentimentVerdict> {
        let lex = &self.lexicon;
        let negative = first_hit(text, &lex.negative);
        let positive = first_hit(text, &lex.positive);

        let verdict = |label, triggering_rule| SentimentVerdict {
            label,
            triggering_rule,
        };

        match (negative, positive) {
            (Some(n), None) => {
                return Some(verdict(
                    Sentiment::Negative,
                    TriggeringRule::NegativeKeyword(n.to_string()),
                ));
            }
            (None, Some(p)) => {
                return Some(verdict(
                    Sentiment::Positive,
                    TriggeringRule::PositiveKeyword(p.to_string()),
                ));
            }
            (Some(n), Some(p)) => {
                return Some(verdict(
                    Sentiment::Neutral,
                    TriggeringRule::ConflictingKeywords {
                        negative: n.to_string(),
                        positive: p.to_string(),
                    },
                ));
            }
            (None, None) => {}
        }

        if let Some(phrase) = first_hit(text, &lex.mixed) {
            return Some(verdict(
                Sentiment::Neutral,
                TriggeringRule::MixedSignal(phrase.to_string()),
            ));
        }

        // Rule 4 only applies without negative keywords, which rule 1 already guarantees here.
        first_hit(text, &lex.neutral_indicators).map(|phrase| {
            verdict(
                Sentiment::Neutral,
                TriggeringRule::NeutralIndicator(phrase.to_string()),
            )
        })
    }

    /// Classify a headline, optionally strengthened with the article body.
    ///
    /// # Arguments
    ///
    /// * `headline` - Cleaned headline text
    /// * `body` - Article text appended to the headline before matching
    ///
    /// # Returns
    ///
    /// The verdict and the rule that produced it. Model failures yield
    /// `neutral` with [`TriggeringRule::ModelUnavailable`].
    #[instrument(level = "debug", skip_all)]
    pub async fn classify(&self, headline: &str, body: Option<&str>) -> SentimentVerdict {
        let text = match body {
            Some(body) => format!("{} {}", headline, body).to_lowercase(),
            None => headline.to_lowercase(),
        };

        if let Some(verdict) = self.decide_by_rules(&text) {
            debug!(label = %verdict.label, rule = ?verdict.triggering_rule, "Rule verdict");
            return verdict;
        }

        match self.model.predict(&text).await {
            Ok(label) => SentimentVerdict {
                label: Sentiment::from_model_label(&label),
                triggering_rule: TriggeringRule::Model(label),
            },
            Err(e) => {
                warn!(error = %e, "Sentiment model failed; defaulting to neutral");
                SentimentVerdict {
                    label: Sentiment::Neutral,
                    triggering_rule: TriggeringRule::ModelUnavailable,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::serve;
    use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Returns a fixed label and counts calls.
    struct FixedModel {
        label: &'static str,
        calls: AtomicUsize,
    }

    impl FixedModel {
        fn new(label: &'static str) -> Self {
            Self {
                label,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl SentimentModel for FixedModel {
        async fn predict(&self, _text: &str) -> Result<String, ClassificationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.label.to_string())
        }
    }

    struct BrokenModel;

    impl SentimentModel for BrokenModel {
        async fn predict(&self, _text: &str) -> Result<String, ClassificationError> {
            Err(ClassificationError::Status(500))
        }
    }

    fn minimal_lexicon() -> Lexicon {
        Lexicon {
            negative: owned(&["strike", "crash"]),
            positive: owned(&["win", "hope"]),
            mixed: owned(&["divided"]),
            neutral_indicators: owned(&["policy"]),
        }
    }

    #[tokio::test]
    async fn test_headline_scenarios_with_default_lexicon() {
        let classifier = SentimentClassifier::new(Lexicon::default(), FixedModel::new("positive"));

        let v = classifier
            .classify("Deadly attack kills dozens in capital", None)
            .await;
        assert_eq!(v.label, Sentiment::Negative);

        let v = classifier
            .classify("City celebrates historic milestone achievement", None)
            .await;
        assert_eq!(v.label, Sentiment::Positive);

        let v = classifier
            .classify("Officials divided over new policy amid controversy", None)
            .await;
        assert_eq!(v.label, Sentiment::Neutral);
        assert_eq!(v.triggering_rule, TriggeringRule::MixedSignal("divided".into()));

        assert_eq!(classifier.model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_negative_only_and_positive_only() {
        let classifier = SentimentClassifier::new(minimal_lexicon(), FixedModel::new("positive"));
        for headline in ["Dock strike continues", "Market CRASH deepens", "strike and crash"] {
            assert_eq!(
                classifier.classify(headline, None).await.label,
                Sentiment::Negative,
                "{headline}"
            );
        }
        for headline in ["Local team wins again", "New HOPE for patients"] {
            assert_eq!(
                classifier.classify(headline, None).await.label,
                Sentiment::Positive,
                "{headline}"
            );
        }
    }

    #[tokio::test]
    async fn test_both_polarities_are_neutral_regardless_of_order() {
        let classifier = SentimentClassifier::new(minimal_lexicon(), FixedModel::new("negative"));
        for headline in [
            "Strike ends with a win for workers",
            "Win for workers as strike ends",
            "hope hope hope after the crash",
        ] {
            let v = classifier.classify(headline, None).await;
            assert_eq!(v.label, Sentiment::Neutral, "{headline}");
            assert!(matches!(
                v.triggering_rule,
                TriggeringRule::ConflictingKeywords { .. }
            ));
        }
    }

    #[tokio::test]
    async fn test_substring_semantics() {
        let classifier = SentimentClassifier::new(minimal_lexicon(), FixedModel::new("neutral"));
        let v = classifier.classify("Star striker signs contract", None).await;
        assert_eq!(v.triggering_rule, TriggeringRule::NegativeKeyword("strike".into()));
    }

    #[tokio::test]
    async fn test_mixed_signal_precedes_neutral_indicator() {
        let classifier = SentimentClassifier::new(minimal_lexicon(), FixedModel::new("positive"));
        let v = classifier.classify("Council divided on parking policy", None).await;
        assert_eq!(v.triggering_rule, TriggeringRule::MixedSignal("divided".into()));

        let v = classifier.classify("Council unveils parking policy", None).await;
        assert_eq!(v.label, Sentiment::Neutral);
        assert_eq!(v.triggering_rule, TriggeringRule::NeutralIndicator("policy".into()));
    }

    #[tokio::test]
    async fn test_keyword_rules_outrank_mixed_phrases() {
        let classifier = SentimentClassifier::new(minimal_lexicon(), FixedModel::new("positive"));
        let v = classifier.classify("Divided town mourns after crash", None).await;
        assert_eq!(v.label, Sentiment::Negative);
    }

    #[tokio::test]
    async fn test_falls_back_to_model_and_maps_labels() {
        let positive = SentimentClassifier::new(minimal_lexicon(), FixedModel::new("POSITIVE"));
        let v = positive.classify("Museum opens new gallery", None).await;
        assert_eq!(v.label, Sentiment::Positive);
        assert_eq!(v.triggering_rule, TriggeringRule::Model("POSITIVE".into()));

        let odd = SentimentClassifier::new(minimal_lexicon(), FixedModel::new("surprise"));
        assert_eq!(odd.classify("Museum opens new gallery", None).await.label, Sentiment::Neutral);
    }

    #[tokio::test]
    async fn test_model_failure_degrades_to_neutral() {
        let classifier = SentimentClassifier::new(minimal_lexicon(), BrokenModel);
        let v = classifier.classify("Museum opens new gallery", None).await;
        assert_eq!(v.label, Sentiment::Neutral);
        assert_eq!(v.triggering_rule, TriggeringRule::ModelUnavailable);
    }

    #[tokio::test]
    async fn test_missing_service_url_degrades_to_neutral() {
        let api = SentimentApi::new(None, ModelRequest::Text).unwrap();
        let classifier = SentimentClassifier::new(minimal_lexicon(), api);
        let v = classifier.classify("Museum opens new gallery", None).await;
        assert_eq!(v.label, Sentiment::Neutral);
    }

    /// Model service that records each request body and answers with `label`.
    async fn model_service(label: &'static str) -> (String, Arc<Mutex<Vec<Value>>>) {
        let seen: Arc<Mutex<Vec<Value>>> = Arc::default();
        let app = Router::new()
            .route(
                "/predict",
                post(
                    move |State(seen): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| {
                        async move {
                            seen.lock().unwrap().push(body);
                            Json(json!({ "final_sentiment": label }))
                        }
                    },
                ),
            )
            .with_state(seen.clone());
        let base = serve(app).await;
        (format!("{}/predict", base), seen)
    }

    #[tokio::test]
    async fn test_api_sends_text_body_and_reads_label() {
        let (url, seen) = model_service("positive").await;
        let api = SentimentApi::new(Some(url), ModelRequest::Text).unwrap();
        let classifier = SentimentClassifier::new(minimal_lexicon(), api);

        let v = classifier.classify("Harbour ferry service to expand", None).await;
        assert_eq!(v.label, Sentiment::Positive);
        assert_eq!(v.triggering_rule, TriggeringRule::Model("positive".into()));
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[json!({ "text": "harbour ferry service to expand" })]
        );
    }

    #[tokio::test]
    async fn test_api_sends_keywords_body() {
        let (url, seen) = model_service("negative").await;
        let api = SentimentApi::new(Some(url), ModelRequest::Keywords).unwrap();

        let label = api.predict("ferry  service\tdelayed").await.unwrap();
        assert_eq!(label, "negative");
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[json!({ "keywords": ["ferry", "service", "delayed"] })]
        );
    }

    #[tokio::test]
    async fn test_api_error_status_is_reported() {
        let app = Router::new().route(
            "/predict",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let base = serve(app).await;
        let api = SentimentApi::new(Some(format!("{}/predict", base)), ModelRequest::Text).unwrap();

        assert!(matches!(
            api.predict("harbour ferry").await.unwrap_err(),
            ClassificationError::Status(500)
        ));
    }

    #[tokio::test]
    async fn test_undecodable_model_reply_degrades_to_neutral() {
        let app = Router::new().route("/predict", post(|| async { "not json" }));
        let base = serve(app).await;
        let api = SentimentApi::new(Some(format!("{}/predict", base)), ModelRequest::Text).unwrap();

        assert!(matches!(
            api.predict("harbour ferry").await.unwrap_err(),
            ClassificationError::Transport(_)
        ));

        let classifier = SentimentClassifier::new(minimal_lexicon(), api);
        let v = classifier.classify("Harbour ferry service to expand", None).await;
        assert_eq!(v.label, Sentiment::Neutral);
        assert_eq!(v.triggering_rule, TriggeringRule::ModelUnavailable);
    }

    #[tokio::test]
    async fn test_body_text_adds_signal() {
        let classifier = SentimentClassifier::new(minimal_lexicon(), FixedModel::new("neutral"));
        let v = classifier
            .classify("Port update", Some("Workers announced a strike today."))
            .await;
        assert_eq!(v.label, Sentiment::Negative);
    }

    #[tokio::test]
    async fn test_classify_is_idempotent() {
        let classifier = SentimentClassifier::new(Lexicon::default(), FixedModel::new("positive"));
        for headline in [
            "Deadly attack kills dozens in capital",
            "Quiet morning at the harbour",
            "Talks stall as rivals remain divided",
        ] {
            let first = classifier.classify(headline, None).await;
            let second = classifier.classify(headline, None).await;
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_lexicon_from_yaml_normalizes_entries() {
        let raw = "negative: [' Riot ', '']\npositive: [Rescue]\n";
        let lex = Lexicon::from_yaml("inline.yaml", raw).unwrap();
        assert_eq!(lex.negative, vec!["riot"]);
        assert_eq!(lex.positive, vec!["rescue"]);
        assert!(lex.mixed.is_empty());
        assert!(lex.neutral_indicators.is_empty());
    }

    #[test]
    fn test_lexicon_rejects_malformed_yaml() {
        let err = Lexicon::from_yaml("bad.yaml", "negative: {oops").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_shipped_lexicon_file_is_valid() {
        let shipped =
            Lexicon::from_yaml("config/lexicon.yaml", include_str!("../config/lexicon.yaml"))
                .unwrap();
        assert_eq!(shipped, Lexicon::default());
    }

    #[tokio::test]
    async fn test_shipped_lexicon_decides_like_the_defaults() {
        let shipped =
            Lexicon::from_yaml("config/lexicon.yaml", include_str!("../config/lexicon.yaml"))
                .unwrap();
        let classifier = SentimentClassifier::new(shipped, FixedModel::new("positive"));
        let v = classifier.classify("Scary scenes at the stadium", None).await;
        assert_eq!(v.label, Sentiment::Negative);
        assert_eq!(v.triggering_rule, TriggeringRule::NegativeKeyword("scary".into()));

        let v = classifier.classify("Doubt lingers over the ferry plan", None).await;
        assert_eq!(v.label, Sentiment::Neutral);
        assert_eq!(classifier.model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_default_lexicon_polarities_are_disjoint() {
        assert!(Lexicon::default().overlaps().is_empty());
    }
}
