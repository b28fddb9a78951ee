//! LLM chat completions through `awful_aj`.
//!
//! [`AskAsync`] is the seam between the enrichment layer and the LLM client.
//! [`AskFnWrapper`] binds one `awful_aj` configuration to one chat template.
//! Requests are never retried: a failed call surfaces immediately and the
//! caller substitutes its fallback.

use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use std::error::Error;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Async LLM interaction.
pub trait AskAsync {
    type Response;

    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// [`AskAsync`] over `awful_aj::api::ask` with a fixed config and template.
#[derive(Debug)]
pub struct AskFnWrapper<'a> {
    /// Endpoint, model and key settings.
    pub config: &'a AwfulJadeConfig,
    /// System prompt and message scaffolding for this kind of request.
    pub template: &'a ChatTemplate,
}

impl<'a> AskAsync for AskFnWrapper<'a> {
    type Response = String;

    #[instrument(level = "debug", skip_all, fields(chars = text.len()))]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = ask(self.config, text.to_string(), self.template, None, None).await;
        let dt = t0.elapsed();

        match &res {
            Ok(_) => debug!(elapsed_ms = dt.as_millis() as u64, "LLM call succeeded"),
            Err(e) => warn!(elapsed_ms = dt.as_millis() as u64, error = %e, "LLM call failed"),
        }
        res
    }
}
