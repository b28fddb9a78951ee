//! The per-run pipeline.
//!
//! For every source: fetch headlines, normalize and dedupe them against the
//! run-wide link ledger, then for each surviving headline fetch the article,
//! classify, summarize, apply the relevance guard, extract entities and file
//! the record under its sentiment bucket.
//!
//! Sources run concurrently up to `max_concurrent_sources`. Inside a source,
//! up to `per_source_concurrency` headlines are in flight, and results are
//! appended in discovery order. Article fetches go through [`HostThrottle`],
//! so the courtesy delay holds per target host no matter how many sources
//! point at it.
//!
//! Cancelling the token stops all in-flight work. Whatever was already
//! accumulated is returned as a valid, partial result.

use crate::classifier::{SentimentClassifier, SentimentModel};
use crate::enrich::{EntityExtractor, Summarizer, entities_or_empty, summarize_or_fallback};
use crate::fetcher::ContentFetcher;
use crate::models::{ArticleRecord, Buckets, NormalizedHeadline, ResultSet};
use crate::normalize::{normalize_headlines, tokens};
use crate::scrapers::HeadlineSource;
use chrono::Utc;
use futures::future;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Minimum headline/summary token overlap for a record to be kept.
pub const RELEVANCE_THRESHOLD: f64 = 0.10;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Minimum spacing between article requests to the same host.
    pub request_delay: Duration,
    pub max_concurrent_sources: usize,
    pub per_source_concurrency: usize,
    /// Classify headline and body together instead of the headline alone.
    pub classify_body: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_millis(2000),
            max_concurrent_sources: 4,
            per_source_concurrency: 1,
            classify_body: false,
        }
    }
}

/// Per-host request spacing.
///
/// Each call reserves the next free slot for its host under the lock and then
/// sleeps outside it, so concurrent callers queue up `delay` apart.
#[derive(Debug)]
pub struct HostThrottle {
    delay: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl HostThrottle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    fn reserve(&self, host: &str) -> Instant {
        let now = Instant::now();
        let mut slots = lock(&self.next_slot);
        let slot = match slots.get(host) {
            Some(next) if *next > now => *next,
            _ => now,
        };
        slots.insert(host.to_string(), slot + self.delay);
        slot
    }

    /// Wait until a request to `link`'s host is permitted.
    pub async fn wait(&self, link: &str) {
        if self.delay.is_zero() {
            return;
        }
        let host = Url::parse(link)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        let slot = self.reserve(&host);
        sleep_until(slot).await;
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub sources: usize,
    /// Headlines that passed the source relevance filter.
    pub headlines: usize,
    /// Headlines dropped before fetching: repeated canonical links (within
    /// or across sources) and links that could not be resolved.
    pub duplicates: usize,
    pub fetched: usize,
    pub skipped_unavailable: usize,
    pub dropped_irrelevant: usize,
    pub emitted: usize,
    /// Headlines abandoned because the run was cancelled.
    pub cancelled: usize,
}

impl RunReport {
    fn merge(&mut self, other: RunReport) {
        self.headlines += other.headlines;
        self.duplicates += other.duplicates;
        self.fetched += other.fetched;
        self.skipped_unavailable += other.skipped_unavailable;
        self.dropped_irrelevant += other.dropped_irrelevant;
        self.emitted += other.emitted;
        self.cancelled += other.cancelled;
    }
}

/// `|headline ∩ summary| / (|headline| + 1)` over distinct lowercase tokens.
pub fn relevance_ratio(headline: &str, summary: &str) -> f64 {
    let headline: HashSet<String> = tokens(headline).collect();
    let summary: HashSet<String> = tokens(summary).collect();
    let shared = headline.intersection(&summary).count();
    shared as f64 / (headline.len() as f64 + 1.0)
}

pub fn passes_relevance_guard(headline: &str, summary: &str) -> bool {
    relevance_ratio(headline, summary) >= RELEVANCE_THRESHOLD
}

enum Outcome {
    Emitted(ArticleRecord),
    Unavailable,
    Irrelevant,
    Cancelled,
}

/// Borrowed service handles plus per-run settings.
pub struct Pipeline<'a, F, M, S, E> {
    fetcher: &'a F,
    classifier: &'a SentimentClassifier<M>,
    summarizer: &'a S,
    extractor: &'a E,
    settings: PipelineSettings,
    throttle: HostThrottle,
}

impl<'a, F, M, S, E> Pipeline<'a, F, M, S, E>
where
    F: ContentFetcher,
    M: SentimentModel,
    S: Summarizer,
    E: EntityExtractor,
{
    /// # Arguments
    ///
    /// * `fetcher` - Article page fetcher
    /// * `classifier` - Sentiment decision engine
    /// * `summarizer` - Summary generator; failures fall back to truncated text
    /// * `extractor` - Entity extractor; failures yield no entities
    /// * `settings` - Throttling, concurrency and classification options
    pub fn new(
        fetcher: &'a F,
        classifier: &'a SentimentClassifier<M>,
        summarizer: &'a S,
        extractor: &'a E,
        settings: PipelineSettings,
    ) -> Self {
        let throttle = HostThrottle::new(settings.request_delay);
        Self {
            fetcher,
            classifier,
            summarizer,
            extractor,
            settings,
            throttle,
        }
    }

    /// Process every source and return the bucketed records.
    ///
    /// Never fails: source and article errors are logged and skipped, and a
    /// cancelled run returns what it had so far.
    #[instrument(level = "info", skip_all, fields(sources = sources.len()))]
    pub async fn run<H: HeadlineSource>(
        &self,
        sources: &[H],
        cancel: &CancellationToken,
    ) -> (Buckets, RunReport) {
        let results = ResultSet::new();
        let ledger = Mutex::new(HashSet::new());
        let report = Mutex::new(RunReport {
            sources: sources.len(),
            ..RunReport::default()
        });

        stream::iter(sources)
            .for_each_concurrent(self.settings.max_concurrent_sources.max(1), |source| {
                let results = &results;
                let ledger = &ledger;
                let report = &report;
                async move {
                    let source_report = self.run_source(source, results, ledger, cancel).await;
                    lock(report).merge(source_report);
                }
            })
            .await;

        if cancel.is_cancelled() {
            warn!(kept = results.len(), "Run cancelled; keeping partial results");
        }

        let report = report
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        (results.snapshot(), report)
    }

    #[instrument(level = "info", skip_all, fields(source = %source.descriptor().name))]
    async fn run_source<H: HeadlineSource>(
        &self,
        source: &H,
        results: &ResultSet,
        ledger: &Mutex<HashSet<String>>,
        cancel: &CancellationToken,
    ) -> RunReport {
        let descriptor = source.descriptor();
        let mut report = RunReport::default();

        let base = match Url::parse(&descriptor.base_url) {
            Ok(base) => base,
            Err(e) => {
                error!(url = %descriptor.base_url, error = %e, "Invalid base url; skipping source");
                return report;
            }
        };

        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Cancelled before headlines arrived");
                return report;
            }
            res = source.fetch_headlines() => match res {
                Ok(raw) => raw,
                Err(e) => {
                    error!(error = %e, "Headline fetch failed; skipping source");
                    return report;
                }
            },
        };

        let raw_count = raw.len();
        let normalized = normalize_headlines(&base, raw);
        let fresh: Vec<NormalizedHeadline> = {
            let mut seen = lock(ledger);
            normalized
                .into_iter()
                .filter(|h| seen.insert(h.canonical_link.clone()))
                .collect()
        };
        report.headlines = raw_count;
        report.duplicates = raw_count - fresh.len();

        stream::iter(fresh)
            .map(|headline| self.process(headline, cancel))
            .buffered(self.settings.per_source_concurrency.max(1))
            .for_each(|outcome| {
                match outcome {
                    Outcome::Emitted(record) => {
                        report.fetched += 1;
                        report.emitted += 1;
                        results.push(record);
                    }
                    Outcome::Irrelevant => {
                        report.fetched += 1;
                        report.dropped_irrelevant += 1;
                    }
                    Outcome::Unavailable => report.skipped_unavailable += 1,
                    Outcome::Cancelled => report.cancelled += 1,
                }
                future::ready(())
            })
            .await;

        info!(
            headlines = report.headlines,
            emitted = report.emitted,
            unavailable = report.skipped_unavailable,
            irrelevant = report.dropped_irrelevant,
            "Source complete"
        );
        report
    }

    async fn process(&self, headline: NormalizedHeadline, cancel: &CancellationToken) -> Outcome {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Outcome::Cancelled,
            outcome = self.process_headline(headline) => outcome,
        }
    }

    #[instrument(level = "info", skip_all, fields(link = %headline.canonical_link))]
    async fn process_headline(&self, headline: NormalizedHeadline) -> Outcome {
        let link = &headline.canonical_link;
        self.throttle.wait(link).await;
        let content = self.fetcher.fetch(link).await;
        if content.is_unavailable() {
            debug!("Article unavailable; skipping");
            return Outcome::Unavailable;
        }

        let body = self.settings.classify_body.then_some(content.body.as_str());
        let verdict = self.classifier.classify(&headline.headline, body).await;
        let summary = summarize_or_fallback(self.summarizer, &content.body).await;

        if !passes_relevance_guard(&headline.headline, &summary) {
            info!(
                headline = %headline.headline,
                ratio = relevance_ratio(&headline.headline, &summary),
                "Summary drifted off-topic; dropping"
            );
            return Outcome::Irrelevant;
        }

        let entities = entities_or_empty(self.extractor, &content.body).await;
        debug!(label = %verdict.label, rule = ?verdict.triggering_rule, "Record ready");

        Outcome::Emitted(ArticleRecord {
            headline: headline.headline,
            url: headline.canonical_link,
            sentiment: verdict.label,
            summary,
            image: content.image,
            timestamp: Utc::now(),
            entities,
        })
    }
}
