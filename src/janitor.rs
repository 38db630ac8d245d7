use std::path::Path;
use std::time::{Duration, SystemTime};

use tokio::fs;
use tracing::warn;

/// Rendered charts are kept this long before being reclaimed.
pub const RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Delete chart files older than `retention`, returning how many were
/// removed. A failure on a single entry is logged and the sweep continues.
pub async fn cleanup_old_charts(dir: &Path, retention: Duration) -> anyhow::Result<usize> {
    let now = SystemTime::now();
    let mut removed = 0;

    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let Ok(modified) = metadata.modified() else {
            continue;
        };

        let age = now.duration_since(modified).unwrap_or_default();
        if age > retention {
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "could not remove stale chart"),
            }
        }
    }

    Ok(removed)
}
