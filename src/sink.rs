//! Persistence hand-off for finished records.
//!
//! The sink owns storage: it assigns identifiers and keeps whatever schema it
//! likes. The pipeline only sends [`ArticleRecord`]-shaped documents.

use crate::error::SinkError;
use crate::models::ArticleRecord;
use std::time::Duration;
use tracing::{info, instrument};

pub trait RecordSink {
    /// Insert `records`, returning how many the sink accepted.
    async fn insert(&self, records: &[ArticleRecord]) -> Result<usize, SinkError>;
}

/// POSTs the records as one JSON array.
#[derive(Debug, Clone)]
pub struct HttpSink {
    http: reqwest::Client,
    url: String,
}

impl HttpSink {
    /// # Arguments
    ///
    /// * `url` - Endpoint receiving each batch as a JSON array
    ///
    /// # Returns
    ///
    /// The sink, or the error from building its HTTP client.
    pub fn new(url: &str) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

impl RecordSink for HttpSink {
    #[instrument(level = "info", skip_all, fields(url = %self.url, count = records.len()))]
    async fn insert(&self, records: &[ArticleRecord]) -> Result<usize, SinkError> {
        if records.is_empty() {
            return Ok(0);
        }
        let resp = self.http.post(&self.url).json(records).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SinkError::Status(status.as_u16()));
        }
        info!("Records handed to sink");
        Ok(records.len())
    }
}
