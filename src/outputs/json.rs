//! JSON output for one identifier's items.

use crate::models::ItemBatch;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write an [`ItemBatch`] to `{output_dir}/{identifier}.json`.
///
/// Creates `output_dir` if needed and returns the path written.
#[instrument(level = "info", skip_all, fields(%output_dir, identifier = %batch.identifier))]
pub async fn write_batch(batch: &ItemBatch, output_dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(batch)?;

    if let Err(e) = fs::create_dir_all(output_dir).await {
        error!(%output_dir, error = %e, "Failed to create output dir");
        return Err(e.into());
    }

    let path = PathBuf::from(output_dir).join(format!("{}.json", batch.identifier));
    fs::write(&path, json).await?;
    info!(path = %path.display(), items = batch.items.len(), "Wrote JSON file");

    Ok(path)
}
