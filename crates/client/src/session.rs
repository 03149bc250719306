//! Pure state machine for one client session.
//!
//! The session never touches the network or a timer. The driver feeds
//! it events (metadata loaded, poll outcomes) and acts on the
//! [`PollStep`] values it returns, so every transition is unit-testable
//! with a plain `Instant`.

use std::path::Path;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::api::{PollOutcome, VideoFormat, VideoInfo, PROGRESS_COMPLETE};

/// Cadence of `GET /progress/{id}` polls.
pub const POLL_PERIOD: Duration = Duration::from_secs(1);
/// Pause between seeing 100% and requesting the file, so the artifact
/// is settled on disk server-side.
pub const COMPLETE_DELAY: Duration = Duration::from_millis(1500);
/// Pause between file retrieval and resetting the session for the next
/// download.
pub const RESET_DELAY: Duration = Duration::from_secs(2);
/// Error messages dismiss themselves after this long.
pub const MESSAGE_TTL: Duration = Duration::from_secs(7);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No video loaded.
    Idle,
    /// `fetch-info` in flight.
    Fetching,
    /// Metadata loaded; a format can be picked and a download started.
    Ready,
    /// `POST /download` in flight.
    Starting,
    /// Polling an active download.
    Polling,
    /// Download hit 100%; file retrieval pending or in flight.
    Completing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Error,
}

#[derive(Debug, Clone)]
struct StatusMessage {
    text: String,
    kind: MessageKind,
    /// Only error messages expire.
    expires_at: Option<Instant>,
}

/// What the driver should do after feeding one poll outcome in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    /// Poll again on the next tick.
    Continue,
    /// The download finished; fetch the file after [`COMPLETE_DELAY`].
    RetrieveAfterDelay,
    /// Stop this poll loop.
    Stop,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no video loaded")]
    NoVideo,
    #[error("no format selected")]
    NoFormatSelected,
    #[error("a download is already starting")]
    Busy,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Tracks one user's interaction with the service.
pub struct Session {
    state: SessionState,
    url: Option<String>,
    title: Option<String>,
    formats: Vec<VideoFormat>,
    selected: Option<usize>,
    download_id: Option<Uuid>,
    progress: i32,
    message: Option<StatusMessage>,
    /// Bumped on every download start; poll outcomes carrying an older
    /// generation are stale and ignored. This is what guarantees a
    /// single active poll loop even if downloads are started
    /// back-to-back.
    poll_generation: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            url: None,
            title: None,
            formats: Vec::new(),
            selected: None,
            download_id: None,
            progress: 0,
            message: None,
            poll_generation: 0,
        }
    }

    // -- accessors -------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn progress(&self) -> i32 {
        self.progress
    }

    pub fn formats(&self) -> &[VideoFormat] {
        &self.formats
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn download_id(&self) -> Option<Uuid> {
        self.download_id
    }

    /// Whether a download can be started right now.
    pub fn download_enabled(&self) -> bool {
        self.state == SessionState::Ready && self.selected.is_some()
    }

    /// Current status message, if any and not yet expired.
    pub fn message(&self, now: Instant) -> Option<(&str, MessageKind)> {
        let msg = self.message.as_ref()?;
        if let Some(expires_at) = msg.expires_at {
            if now >= expires_at {
                return None;
            }
        }
        Some((&msg.text, msg.kind))
    }

    /// Drop an expired status message. Called by the driver's render
    /// tick so expiry does not depend on the next state transition.
    pub fn expire_message(&mut self, now: Instant) {
        if self.message(now).is_none() {
            self.message = None;
        }
    }

    fn set_error(&mut self, text: impl Into<String>, now: Instant) {
        self.message = Some(StatusMessage {
            text: text.into(),
            kind: MessageKind::Error,
            expires_at: Some(now + MESSAGE_TTL),
        });
    }

    fn set_info(&mut self, text: impl Into<String>) {
        self.message = Some(StatusMessage {
            text: text.into(),
            kind: MessageKind::Info,
            expires_at: None,
        });
    }

    // -- metadata --------------------------------------------------------

    /// A `fetch-info` request has been issued for `url`.
    pub fn begin_fetch(&mut self, url: impl Into<String>) {
        self.state = SessionState::Fetching;
        self.url = Some(url.into());
        self.title = None;
        self.formats.clear();
        self.selected = None;
        self.download_id = None;
        self.progress = 0;
        self.message = None;
    }

    /// Metadata arrived; the first (highest resolution) format is
    /// preselected.
    pub fn info_loaded(&mut self, info: VideoInfo) {
        self.title = Some(info.title);
        self.formats = info.formats;
        self.selected = if self.formats.is_empty() { None } else { Some(0) };
        self.state = SessionState::Ready;
    }

    pub fn fetch_failed(&mut self, message: impl Into<String>, now: Instant) {
        self.state = SessionState::Idle;
        self.set_error(message, now);
    }

    /// Pick a format by index into [`Self::formats`].
    pub fn select_format(&mut self, index: usize) -> Result<(), SessionError> {
        if index >= self.formats.len() {
            return Err(SessionError::NoFormatSelected);
        }
        self.selected = Some(index);
        Ok(())
    }

    // -- download lifecycle ----------------------------------------------

    /// Begin starting a download. Returns the request parameters the
    /// driver should send; the session moves to `Starting` so a second
    /// click is rejected until the server answers.
    pub fn begin_download(&mut self) -> Result<DownloadParams, SessionError> {
        if self.state == SessionState::Starting {
            return Err(SessionError::Busy);
        }
        if self.state != SessionState::Ready {
            return Err(SessionError::NoVideo);
        }
        let Some(index) = self.selected else {
            return Err(SessionError::NoFormatSelected);
        };
        let format = &self.formats[index];
        let title = self.title.as_deref().unwrap_or("video");
        let params = DownloadParams {
            url: self.url.clone().ok_or(SessionError::NoVideo)?,
            format_id: format.format_id.clone(),
            filename: format!("{title}.{}", format.ext),
        };
        self.state = SessionState::Starting;
        self.progress = 0;
        Ok(params)
    }

    /// The server rejected the download start.
    pub fn start_failed(&mut self, message: impl Into<String>, now: Instant) {
        self.state = SessionState::Ready;
        self.set_error(message, now);
    }

    /// The server accepted the download; begin polling. Returns the
    /// poll generation the driver must tag its outcomes with.
    pub fn download_started(&mut self, id: Uuid) -> u64 {
        self.download_id = Some(id);
        self.progress = 0;
        self.state = SessionState::Polling;
        self.poll_generation += 1;
        self.poll_generation
    }

    /// Feed one poll outcome in.
    ///
    /// Outcomes from a superseded poll loop (older `generation`) are
    /// ignored and told to stop.
    pub fn apply_poll(&mut self, generation: u64, outcome: PollOutcome, now: Instant) -> PollStep {
        if generation != self.poll_generation || self.state != SessionState::Polling {
            return PollStep::Stop;
        }

        match outcome {
            PollOutcome::Progress(p) if p >= PROGRESS_COMPLETE => {
                self.progress = PROGRESS_COMPLETE;
                self.state = SessionState::Completing;
                PollStep::RetrieveAfterDelay
            }
            PollOutcome::Progress(p) => {
                // Progress never moves backwards in the UI.
                self.progress = self.progress.max(p.max(0));
                PollStep::Continue
            }
            PollOutcome::Failed { message } => {
                self.state = SessionState::Ready;
                self.download_id = None;
                self.progress = 0;
                self.set_error(message, now);
                PollStep::Stop
            }
            PollOutcome::NotFound => {
                self.state = SessionState::Ready;
                self.download_id = None;
                self.progress = 0;
                self.set_error("Download session expired. Please try again.", now);
                PollStep::Stop
            }
            PollOutcome::Backend { message } => {
                self.state = SessionState::Ready;
                self.download_id = None;
                self.progress = 0;
                self.set_error(message, now);
                PollStep::Stop
            }
            // Network blips are survivable; keep polling.
            PollOutcome::Transport { message } => {
                tracing::debug!(error = %message, "Progress poll failed, will retry");
                PollStep::Continue
            }
        }
    }

    /// The artifact was saved locally.
    pub fn retrieval_complete(&mut self, saved_to: &Path) {
        self.set_info(format!("Download complete! Saved to {}", saved_to.display()));
    }

    /// File retrieval failed after the download itself succeeded.
    pub fn retrieval_failed(&mut self, message: impl Into<String>, now: Instant) {
        self.state = SessionState::Ready;
        self.download_id = None;
        self.progress = 0;
        self.set_error(message, now);
    }

    /// Reset for the next download, keeping the loaded metadata. Called
    /// by the driver [`RESET_DELAY`] after a completed retrieval.
    pub fn reset_after_complete(&mut self) {
        self.state = SessionState::Ready;
        self.download_id = None;
        self.progress = 0;
    }
}

/// Parameters for `POST /download`, produced by [`Session::begin_download`].
#[derive(Debug, Clone)]
pub struct DownloadParams {
    pub url: String,
    pub format_id: String,
    pub filename: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
