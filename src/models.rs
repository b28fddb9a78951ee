//! Data models flowing through the pipeline.
//!
//! - [`SourceDescriptor`]: one configured news site
//! - [`RawHeadline`] / [`NormalizedHeadline`]: headline stages before fetching
//! - [`ArticleContent`]: fetched body text plus representative image
//! - [`SentimentVerdict`]: classifier output with the rule that produced it
//! - [`ArticleRecord`]: the finished unit handed to the sink
//! - [`ResultSet`] / [`Buckets`]: per-run accumulation grouped by sentiment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

/// Body text used when an article could not be fetched.
pub const UNAVAILABLE: &str = "unavailable";

/// A configured news site. Immutable once the registry has loaded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub name: String,
    pub base_url: String,
    /// CSS selector matching each headline element.
    pub headline_locator: String,
    /// CSS selector, relative to the headline element, matching the link carrier.
    /// Empty means the headline element (or its nearest `<a>` ancestor) holds the href.
    pub link_locator: String,
    pub is_dynamic: bool,
}

/// A headline exactly as a source produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHeadline {
    pub headline: String,
    pub link: String,
}

/// A cleaned headline keyed by its canonical (absolute, fragment-free) link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedHeadline {
    pub headline: String,
    pub canonical_link: String,
}

/// Fetched article body and its representative image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleContent {
    pub body: String,
    pub image: Option<String>,
}

impl ArticleContent {
    pub fn unavailable() -> Self {
        Self {
            body: UNAVAILABLE.to_string(),
            image: None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.body == UNAVAILABLE
    }
}

/// Three-way sentiment label. Serialized lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// Map a model label onto the three-way label. Anything unrecognized is neutral.
    pub fn from_model_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "positive" | "pos" | "label_2" => Sentiment::Positive,
            "negative" | "neg" | "label_0" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which classifier rule decided the verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggeringRule {
    /// Rule 1: a negative keyword and no positive keyword.
    NegativeKeyword(String),
    /// Rule 2: a positive keyword and no negative keyword.
    PositiveKeyword(String),
    /// Rule 3: keywords of both polarities.
    ConflictingKeywords { negative: String, positive: String },
    /// Rule 3: a mixed-signal phrase.
    MixedSignal(String),
    /// Rule 4: a neutral-indicator phrase without negative keywords.
    NeutralIndicator(String),
    /// Rule 5: the external model's label.
    Model(String),
    /// Rule 5 when the model failed; degraded to neutral.
    ModelUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentimentVerdict {
    pub label: Sentiment,
    pub triggering_rule: TriggeringRule,
}

/// A finished article ready for the sink. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub headline: String,
    pub url: String,
    pub sentiment: Sentiment,
    pub summary: String,
    pub image: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub entities: Vec<String>,
}

/// Serialized form of a run: exactly the three sentiment keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Buckets {
    pub positive: Vec<ArticleRecord>,
    pub neutral: Vec<ArticleRecord>,
    pub negative: Vec<ArticleRecord>,
}

impl Buckets {
    pub fn len(&self) -> usize {
        self.positive.len() + self.neutral.len() + self.negative.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records, bucket by bucket, in discovery order within each bucket.
    pub fn records(&self) -> impl Iterator<Item = &ArticleRecord> {
        self.positive
            .iter()
            .chain(self.neutral.iter())
            .chain(self.negative.iter())
    }
}

/// Per-run accumulator shared by concurrent workers. Each bucket has its own lock.
#[derive(Debug, Default)]
pub struct ResultSet {
    positive: Mutex<Vec<ArticleRecord>>,
    neutral: Mutex<Vec<ArticleRecord>>,
    negative: Mutex<Vec<ArticleRecord>>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, label: Sentiment) -> &Mutex<Vec<ArticleRecord>> {
        match label {
            Sentiment::Positive => &self.positive,
            Sentiment::Neutral => &self.neutral,
            Sentiment::Negative => &self.negative,
        }
    }

    /// Append a record to the bucket matching its sentiment.
    pub fn push(&self, record: ArticleRecord) {
        let mut bucket = self
            .bucket(record.sentiment)
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        bucket.push(record);
    }

    pub fn len(&self) -> usize {
        [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative]
            .iter()
            .map(|label| {
                self.bucket(*label)
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .len()
            })
            .sum()
    }

    /// Copy out the current contents. Valid at any time, including after cancellation.
    pub fn snapshot(&self) -> Buckets {
        let copy = |label| {
            self.bucket(label)
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone()
        };
        Buckets {
            positive: copy(Sentiment::Positive),
            neutral: copy(Sentiment::Neutral),
            negative: copy(Sentiment::Negative),
        }
    }
}
