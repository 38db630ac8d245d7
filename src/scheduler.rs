use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, info};

use crate::scanner::Scanner;

/// Pause between cycles, measured from cycle completion so a slow upstream
/// stretches the period instead of overlapping cycles.
pub const CYCLE_PAUSE: Duration = Duration::from_secs(20);

/// Drive scan cycles forever.
///
/// Collaborator construction (HTTP client, bot token) is retried every pass,
/// so a construction failure turns the cycle into a logged no-op instead of
/// taking the process down.
pub async fn run_forever(data_dir: PathBuf) {
    let mut scanner: Option<Scanner> = None;

    loop {
        if scanner.is_none() {
            match Scanner::new(&data_dir).await {
                Ok(s) => scanner = Some(s),
                Err(e) => error!(error = %e, "scanner construction failed, retrying next cycle"),
            }
        }

        if let Some(scanner) = scanner.as_mut() {
            let result = scanner.run_cycle().await;
            info!(
                scanned = result.scanned,
                triggered = result.triggered,
                throttled = result.throttled,
                errors = result.errors,
                "scan cycle complete"
            );
        }

        tokio::time::sleep(CYCLE_PAUSE).await;
    }
}
