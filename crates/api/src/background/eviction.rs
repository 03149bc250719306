//! Periodic eviction of expired download tasks.
//!
//! Spawns a background task that removes task records past their
//! retention window and deletes any orphaned artifacts they still own.
//! Runs on a fixed interval using `tokio::time::interval`. Eviction is
//! the sole destruction path for task records; clients that abandon
//! polling are cleaned up here, never via explicit cancellation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tubedl_core::store::JobStore;

/// Run the eviction loop until `cancel` is triggered.
pub async fn run(store: Arc<JobStore>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Eviction job started");

    let mut ticker = tokio::time::interval(interval);
    // The immediate first tick would sweep an empty store.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Eviction job stopping");
                break;
            }
            _ = ticker.tick() => {
                let orphans = store.evict_expired(Utc::now()).await;
                if !orphans.is_empty() {
                    tracing::info!(count = orphans.len(), "Evicted expired tasks with unclaimed artifacts");
                }
                for path in orphans {
                    if let Err(e) = tokio::fs::remove_file(&path).await {
                        tracing::error!(path = %path.display(), error = %e, "Failed to delete orphaned artifact");
                    }
                }
            }
        }
    }
}
