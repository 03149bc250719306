//! Async driver: owns the timers and the network calls, feeds events
//! into the [`Session`] state machine.
//!
//! One poll loop per started download, spawned on its own task. The
//! session's generation counter plus an abort of the previous task
//! guarantee that at most one loop is live; a superseded loop that
//! slips one last outcome in is ignored as stale.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::api::{ApiError, QueryApi};
use crate::session::{PollStep, Session, COMPLETE_DELAY, POLL_PERIOD, RESET_DELAY};

pub struct DownloadClient<A: QueryApi + 'static> {
    api: Arc<A>,
    session: Arc<Mutex<Session>>,
    dest_dir: PathBuf,
    poll_task: Option<JoinHandle<()>>,
}

impl<A: QueryApi + 'static> DownloadClient<A> {
    pub fn new(api: A, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            api: Arc::new(api),
            session: Arc::new(Mutex::new(Session::new())),
            dest_dir: dest_dir.into(),
            poll_task: None,
        }
    }

    /// Shared handle to the session, for rendering.
    pub fn session(&self) -> Arc<Mutex<Session>> {
        Arc::clone(&self.session)
    }

    /// Look up metadata for `url` and load it into the session.
    pub async fn fetch_info(&self, url: &str) -> Result<(), ApiError> {
        self.session.lock().await.begin_fetch(url);
        match self.api.fetch_info(url).await {
            Ok(info) => {
                self.session.lock().await.info_loaded(info);
                Ok(())
            }
            Err(e) => {
                self.session
                    .lock()
                    .await
                    .fetch_failed(e.to_string(), Instant::now());
                Err(e)
            }
        }
    }

    /// Start downloading the currently selected format and begin the
    /// poll loop. Returns the task id on acceptance.
    pub async fn start_download(&mut self) -> Result<Uuid, ApiError> {
        let params = self
            .session
            .lock()
            .await
            .begin_download()
            .map_err(|e| ApiError::Backend(e.to_string()))?;

        let id = match self
            .api
            .start_download(&params.url, &params.format_id, &params.filename)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                self.session
                    .lock()
                    .await
                    .start_failed(e.to_string(), Instant::now());
                return Err(e);
            }
        };

        let generation = self.session.lock().await.download_started(id);
        tracing::info!(download_id = %id, "Download accepted, polling for progress");

        let handle = tokio::spawn(poll_loop(
            Arc::clone(&self.api),
            Arc::clone(&self.session),
            id,
            generation,
            self.dest_dir.clone(),
        ));
        if let Some(previous) = self.poll_task.replace(handle) {
            previous.abort();
        }
        Ok(id)
    }

    /// Wait for the current poll loop (if any) to run to completion.
    pub async fn wait_for_poll_loop(&mut self) {
        if let Some(handle) = self.poll_task.take() {
            let _ = handle.await;
        }
    }
}

/// Poll `GET /progress/{id}` once per [`POLL_PERIOD`] until the session
/// says to stop, then run the retrieval sequence if the download
/// finished.
async fn poll_loop<A: QueryApi>(
    api: Arc<A>,
    session: Arc<Mutex<Session>>,
    id: Uuid,
    generation: u64,
    dest_dir: PathBuf,
) {
    let mut ticker = tokio::time::interval(POLL_PERIOD);
    // Consume the immediate first tick; the first poll happens one
    // period after the download starts.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let outcome = api.poll(id).await;
        let step = session
            .lock()
            .await
            .apply_poll(generation, outcome, Instant::now());

        match step {
            PollStep::Continue => {}
            PollStep::Stop => break,
            PollStep::RetrieveAfterDelay => {
                retrieve(api.as_ref(), &session, id, &dest_dir).await;
                break;
            }
        }
    }
}

/// The completion sequence: a settle delay, the file fetch, and a
/// short pause before the session resets for the next download.
async fn retrieve<A: QueryApi + ?Sized>(
    api: &A,
    session: &Mutex<Session>,
    id: Uuid,
    dest_dir: &Path,
) {
    tokio::time::sleep(COMPLETE_DELAY).await;

    match api.fetch_file(id, dest_dir).await {
        Ok(path) => {
            tracing::info!(path = %path.display(), "Artifact saved");
            session.lock().await.retrieval_complete(&path);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to retrieve artifact");
            session
                .lock()
                .await
                .retrieval_failed(e.to_string(), Instant::now());
            return;
        }
    }

    tokio::time::sleep(RESET_DELAY).await;
    session.lock().await.reset_after_complete();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
