//! Snapshot serialization: one pretty-printed JSON document per run,
//! written atomically so a crash mid-write never leaves a torn file for
//! downstream consumers.

use std::error::Error;

use tokio::fs;
use tracing::{info, instrument};

use crate::models::Snapshot;

/// Fixed output filename; downstream consumers read this path.
pub const SNAPSHOT_FILENAME: &str = "scraped_articles.json";

/// Serialize the snapshot and write it to `path` via a temp file and
/// rename. The rename is the atomic step: readers see either the previous
/// document or the complete new one, never a partial write.
#[instrument(level = "info", skip(snapshot))]
pub async fn write_snapshot(snapshot: &Snapshot, path: &str) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(snapshot)?;

    let tmp_path = format!("{path}.tmp");
    fs::write(&tmp_path, &json).await?;
    fs::rename(&tmp_path, path).await?;

    info!(
        path,
        bytes = json.len(),
        sources = snapshot.newspapers.len(),
        articles = snapshot.article_count(),
        "Wrote snapshot"
    );
    Ok(())
}
