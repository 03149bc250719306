//! Background job executor.
//!
//! [`spawn`] schedules the actual download work for a task on the runtime
//! and returns immediately; the caller never blocks on the transfer and
//! never sees an error from it. Every outcome is observable only through
//! the [`JobStore`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::extract::{DownloadRequest, MediaExtractor};
use crate::store::{JobStore, TaskUpdate};
use crate::task::TaskId;

/// Total attempts per job: the first try plus internal retries for
/// transient failures. Exhausting these surfaces the job as failed.
const MAX_ATTEMPTS: u32 = 3;

/// Pause between transient-failure retries.
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// In-flight progress ceiling; 100 is reserved for recorded success.
const MAX_INFLIGHT_PERCENT: i32 = 99;

/// Begin executing `req` for task `id` without blocking the caller.
pub fn spawn(
    store: Arc<JobStore>,
    extractor: Arc<dyn MediaExtractor>,
    id: TaskId,
    req: DownloadRequest,
) {
    tokio::spawn(run(store, extractor, id, req));
}

async fn run(
    store: Arc<JobStore>,
    extractor: Arc<dyn MediaExtractor>,
    id: TaskId,
    req: DownloadRequest,
) {
    store.update(id, TaskUpdate::running()).await;
    tracing::info!(task_id = %id, url = %req.url, format_id = %req.format_id, "Download started");

    let mut attempt = 0;
    loop {
        attempt += 1;

        let (tx, mut rx) = mpsc::unbounded_channel::<i32>();

        // Forward extractor progress into the store. The channel closes
        // when the extractor returns, ending this task.
        let forwarder = tokio::spawn({
            let store = Arc::clone(&store);
            async move {
                while let Some(percent) = rx.recv().await {
                    let percent = percent.clamp(0, MAX_INFLIGHT_PERCENT);
                    store.update(id, TaskUpdate::progress(percent)).await;
                }
            }
        });

        let result = extractor.download(&req, tx).await;
        let _ = forwarder.await;

        match result {
            Ok(path) => {
                tracing::info!(task_id = %id, path = %path.display(), "Download finished");
                store.update(id, TaskUpdate::succeeded(path)).await;
                return;
            }
            Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                tracing::warn!(
                    task_id = %id,
                    attempt,
                    error = %e,
                    "Transient download failure, retrying"
                );
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(e) => {
                tracing::warn!(task_id = %id, attempt, error = %e, "Download failed");
                remove_partials(&req.dest_stem).await;
                store.update(id, TaskUpdate::failed(e.to_string())).await;
                return;
            }
        }
    }
}

/// Best-effort removal of partial artifacts left behind by a failed
/// transfer.
async fn remove_partials(dest_stem: &Path) {
    let Some(dir) = dest_stem.parent() else {
        return;
    };
    let Some(stem) = dest_stem.file_name().and_then(|s| s.to_str()) else {
        return;
    };

    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if let Some(name) = entry.file_name().to_str() {
            if name.starts_with(stem) {
                if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                    tracing::error!(path = %entry.path().display(), error = %e, "Failed to remove partial file");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
