//! JSON serialization of a run's buckets.
//!
//! The file holds exactly three keys, `positive`, `neutral` and `negative`,
//! each an array of records in discovery order. A later run in the same
//! edition overwrites the earlier file.

use crate::models::Buckets;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write `buckets` to `{json_output_dir}/{date}/{time_of_day}.json`.
///
/// # Arguments
///
/// * `buckets` - Records grouped by sentiment
/// * `json_output_dir` - Root output directory
/// * `date` - Subdirectory name, `YYYY-MM-DD`
/// * `time_of_day` - File stem such as `morning`
///
/// # Returns
///
/// Path of the written file.
#[instrument(level = "info", skip(buckets), fields(records = buckets.len()))]
pub async fn write_results(
    buckets: &Buckets,
    json_output_dir: &str,
    date: &str,
    time_of_day: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(buckets)?;

    let dir = PathBuf::from(json_output_dir).join(date);
    info!(dir = %dir.display(), "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&dir).await {
        error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = dir.join(format!("{}.json", time_of_day));
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote results JSON");
    Ok(path)
}
