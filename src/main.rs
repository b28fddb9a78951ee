//! # Headline Mood
//!
//! Scrapes headlines from configured news sites, fetches each story, and
//! files it under `positive`, `neutral` or `negative` with a hybrid
//! keyword-rule and model classifier. Every record carries a short summary,
//! a representative image and the named entities the story mentions.
//!
//! ## Usage
//!
//! ```sh
//! headline_mood --sources config/sources.yaml -j ./json
//! ```
//!
//! ## Architecture
//!
//! 1. **Registry**: load source descriptors and bind each to a static or rendered fetcher
//! 2. **Headlines**: fetch, filter, normalize and dedupe by canonical link
//! 3. **Articles**: fetch body and image, skipping unavailable stories
//! 4. **Analysis**: classify, summarize, guard relevance, extract entities
//! 5. **Output**: write `{date}/{time_of_day}.json` and hand records to the sink

use awful_aj::config_dir;
use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregator;
mod api;
mod classifier;
mod cli;
mod enrich;
mod error;
mod fetcher;
mod models;
mod normalize;
mod outputs;
mod registry;
mod scrapers;
mod sink;
#[cfg(test)]
mod testutil;
mod utils;

use aggregator::Pipeline;
use classifier::{Lexicon, SentimentApi, SentimentClassifier};
use cli::Cli;
use enrich::LlmAnalyst;
use fetcher::ArticleFetcher;
use models::ArticleRecord;
use outputs::json;
use scrapers::{Renderer, Source};
use sink::{HttpSink, RecordSink};
use utils::{ensure_writable_dir, time_of_day};

type AppPipeline<'a> =
    Pipeline<'a, ArticleFetcher, SentimentApi, Option<LlmAnalyst>, Option<LlmAnalyst>>;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("headline_mood starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    if let Err(e) = ensure_writable_dir(&args.json_output_dir).await {
        error!(
            path = %args.json_output_dir,
            error = %e,
            "JSON output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Sources and lexicon ----
    let descriptors = registry::load(&args.sources)?;
    let lexicon = match args.lexicon.as_deref() {
        Some(path) => Lexicon::load(path)?,
        None => {
            info!("No lexicon file given; using built-in keyword lists");
            Lexicon::default()
        }
    };

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()?;
    let renderer = args
        .browserless_url
        .as_deref()
        .map(|url| {
            Renderer::new(
                url,
                args.browserless_token.as_deref(),
                Duration::from_secs(args.render_timeout_secs),
            )
        })
        .transpose()?;
    let sources = registry::build_sources(descriptors, &http, renderer.as_ref())?;

    // ---- Services ----
    let classifier = SentimentClassifier::new(
        lexicon,
        SentimentApi::new(args.classifier_url.clone(), args.model_request)?,
    );
    if args.classifier_url.is_none() {
        warn!("No classifier service configured; undecided headlines will be neutral");
    }

    let analyst = load_analyst(&args).await;
    let fetcher = ArticleFetcher::new(Duration::from_millis(args.retry_backoff_ms))?;
    let sink = args.sink_url.as_deref().map(HttpSink::new).transpose()?;

    let pipeline = Pipeline::new(
        &fetcher,
        &classifier,
        &analyst,
        &analyst,
        args.pipeline_settings(),
    );

    // ---- Cancellation ----
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; stopping with partial results");
                shutdown.cancel();
            }
        });
    }

    match args.interval_minutes {
        Some(minutes) => {
            let mut ticker = tokio::time::interval(Duration::from_secs(minutes.max(1) * 60));
            info!(minutes, "Running on a schedule until interrupted");
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        run_once(&pipeline, &sources, &args, sink.as_ref(), &shutdown).await;
                    }
                }
            }
        }
        None => run_once(&pipeline, &sources, &args, sink.as_ref(), &shutdown).await,
    }

    info!("headline_mood shutting down");
    Ok(())
}

/// LLM-backed enrichment when a config is available, fallback mode otherwise.
async fn load_analyst(args: &Cli) -> Option<LlmAnalyst> {
    let config_path = match args.config.clone() {
        Some(path) => path,
        None => {
            let default = config_dir().ok()?.join("config.yaml");
            if !default.exists() {
                info!("No LLM config; summaries fall back to truncated text and entities to none");
                return None;
            }
            default.to_str()?.to_string()
        }
    };

    match LlmAnalyst::load(&config_path, &args.summary_template, &args.entity_template).await {
        Ok(analyst) => Some(analyst),
        Err(e) => {
            warn!(
                %config_path,
                error = %e,
                "Failed to load LLM config; continuing in fallback mode"
            );
            None
        }
    }
}

/// One full pass over every source. Failures past startup are logged, never returned.
#[instrument(level = "info", skip_all)]
async fn run_once(
    pipeline: &AppPipeline<'_>,
    sources: &[Source],
    args: &Cli,
    sink: Option<&HttpSink>,
    shutdown: &CancellationToken,
) {
    let start_time = Instant::now();
    let cancel = shutdown.child_token();
    let deadline = args.deadline_secs.map(|secs| {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            warn!(secs, "Run deadline reached; stopping with partial results");
            cancel.cancel();
        })
    });

    let (buckets, report) = pipeline.run(sources, &cancel).await;
    if let Some(handle) = deadline {
        handle.abort();
    }

    if buckets.is_empty() {
        warn!(?report, "Run produced no records");
    }

    let date = Local::now().date_naive().to_string();
    let edition = time_of_day();
    if let Err(e) = json::write_results(&buckets, &args.json_output_dir, &date, &edition).await {
        error!(error = %e, "Failed to write results JSON");
    }

    if let Some(sink) = sink {
        let records: Vec<ArticleRecord> = buckets.records().cloned().collect();
        match sink.insert(&records).await {
            Ok(inserted) => info!(inserted, "Sink accepted records"),
            Err(e) => error!(error = %e, "Failed to hand records to sink"),
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        positive = buckets.positive.len(),
        neutral = buckets.neutral.len(),
        negative = buckets.negative.len(),
        ?report,
        edition = %edition,
        date = %date,
        "Run complete"
    );
}
