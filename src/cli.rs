//! Command-line interface.
//!
//! Every option can also come from the environment variable named in its
//! `env` attribute.

use crate::aggregator::PipelineSettings;
use crate::classifier::ModelRequest;
use clap::Parser;
use std::time::Duration;

/// Scrape headlines, fetch the stories and sort them by sentiment.
///
/// ```sh
/// # One run with built-in keywords and no external services
/// headline_mood --sources config/sources.yaml -j ./json
///
/// # Model service, rendering for dynamic sources, hourly runs
/// headline_mood --sources config/sources.yaml -j ./json \
///     --classifier-url http://localhost:8000/predict \
///     --browserless-url http://localhost:3000 \
///     --interval-minutes 60
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Source descriptor YAML
    #[arg(long, env = "NEWS_SOURCES")]
    pub sources: String,

    /// Keyword lexicon YAML (built-in lists when absent)
    #[arg(long, env = "SENTIMENT_LEXICON")]
    pub lexicon: Option<String>,

    /// Output directory for the JSON results file
    #[arg(short, long)]
    pub json_output_dir: String,

    /// Sentiment model service endpoint
    #[arg(long, env = "SENTIMENT_API_URL")]
    pub classifier_url: Option<String>,

    /// Request body sent to the sentiment model service
    #[arg(long, value_enum, default_value = "text")]
    pub model_request: ModelRequest,

    /// Browserless endpoint used to render dynamic sources
    #[arg(long, env = "BROWSERLESS_URL")]
    pub browserless_url: Option<String>,

    #[arg(long, env = "BROWSERLESS_TOKEN")]
    pub browserless_token: Option<String>,

    /// Seconds to wait for a dynamic page's headline locator
    #[arg(long, default_value_t = 15)]
    pub render_timeout_secs: u64,

    /// Optional path to the LLM client config.yaml (summaries and entities)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Chat template used for summaries
    #[arg(long, default_value = "news_summary")]
    pub summary_template: String,

    /// Chat template used for entity extraction
    #[arg(long, default_value = "news_entities")]
    pub entity_template: String,

    /// Persistence sink endpoint receiving the finished records
    #[arg(long, env = "RECORD_SINK_URL")]
    pub sink_url: Option<String>,

    /// Minimum delay between requests to the same host
    #[arg(long, default_value_t = 2000)]
    pub request_delay_ms: u64,

    /// Backoff before the single retry of a 403 article fetch
    #[arg(long, default_value_t = 1500)]
    pub retry_backoff_ms: u64,

    #[arg(long, default_value_t = 4)]
    pub max_concurrent_sources: usize,

    /// Headlines in flight per source (1 processes each source sequentially)
    #[arg(long, default_value_t = 1)]
    pub per_source_concurrency: usize,

    /// Cancel a run after this many seconds, keeping partial results
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Classify the headline together with the article body
    #[arg(long)]
    pub classify_body: bool,

    /// Repeat the run every N minutes until interrupted
    #[arg(long)]
    pub interval_minutes: Option<u64>,
}

impl Cli {
    /// Collect the run-tuning options.
    ///
    /// # Returns
    ///
    /// [`PipelineSettings`] with `request_delay_ms` converted to a [`Duration`].
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            request_delay: Duration::from_millis(self.request_delay_ms),
            max_concurrent_sources: self.max_concurrent_sources,
            per_source_concurrency: self.per_source_concurrency,
            classify_body: self.classify_body,
        }
    }
}
