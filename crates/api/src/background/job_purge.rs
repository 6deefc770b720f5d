//! Periodic removal of finished jobs.
//!
//! Terminal jobs older than the configured age are dropped from the
//! registry on a fixed interval using `tokio::time::interval`.

use std::sync::Arc;
use std::time::Duration;

use edgegate_core::jobs::JobRegistry;
use tokio_util::sync::CancellationToken;

/// Run the job purge loop until `cancel` is triggered.
///
/// The first purge happens immediately, then once every `interval`.
pub async fn run(
    registry: Arc<JobRegistry>,
    max_age: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        max_age_secs = max_age.as_secs(),
        interval_secs = interval.as_secs(),
        "Job purge started"
    );

    let mut interval = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job purge stopping");
                break;
            }
            _ = interval.tick() => {
                let purged = registry.purge_jobs(max_age).await;
                if purged > 0 {
                    tracing::info!(purged, "Job purge: removed finished jobs");
                } else {
                    tracing::debug!("Job purge: nothing to remove");
                }
            }
        }
    }
}
