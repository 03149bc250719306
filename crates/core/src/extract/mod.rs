//! Media extraction seam.
//!
//! [`MediaExtractor`] is the boundary between the job machinery and the
//! actual media tooling: the store and executor only ever see this trait,
//! so tests can script outcomes and the real implementation
//! ([`ytdlp::YtDlp`]) stays swappable.

pub mod ytdlp;

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::video::VideoInfo;

/// Channel on which an extractor reports integer download percentages.
pub type ProgressSender = mpsc::UnboundedSender<i32>;

/// Parameters for one download job, fixed at task creation.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub format_id: String,
    /// Sanitized `stem.ext` name the artifact should be served under.
    pub file_name: String,
    /// Destination path without extension; the extractor appends the
    /// container extension it actually produced.
    pub dest_stem: PathBuf,
}

/// Errors from the extraction backend.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The source rejected us in a way a retry cannot fix: private video,
    /// unsupported format, dead link. The message is user-facing.
    #[error("{0}")]
    Unavailable(String),

    /// A transient condition (network hiccup, timeout) worth retrying.
    #[error("{0}")]
    Transient(String),

    /// The extractor produced output we could not understand.
    #[error("failed to parse extractor output: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// Whether the executor should retry internally instead of failing
    /// the job.
    pub fn is_transient(&self) -> bool {
        matches!(self, ExtractError::Transient(_))
    }
}

/// A backend that can probe a video URL and download one of its variants.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Fetch title, duration, thumbnail, uploader and the format list
    /// without downloading anything.
    async fn probe(&self, url: &str) -> Result<VideoInfo, ExtractError>;

    /// Download the requested variant, reporting integer percentages on
    /// `progress` as the transfer proceeds. Returns the path of the
    /// finished artifact.
    async fn download(
        &self,
        req: &DownloadRequest,
        progress: ProgressSender,
    ) -> Result<PathBuf, ExtractError>;
}
