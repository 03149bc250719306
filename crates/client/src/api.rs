//! Wire contract for the download service and its HTTP implementation.
//!
//! The [`QueryApi`] trait is the seam between the session machine and
//! the network; tests implement it with scripted responses.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Wire sentinel: the download failed terminally.
pub const PROGRESS_FAILED: i32 = -1;
/// Wire sentinel: the id is unknown or the record was evicted.
pub const PROGRESS_NOT_FOUND: i32 = -2;
/// Progress value at which the download is complete.
pub const PROGRESS_COMPLETE: i32 = 100;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// One selectable encoding variant from `POST /fetch-info`.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoFormat {
    pub format_id: String,
    pub quality_label: String,
    pub height: u32,
    pub width: u32,
    pub ext: String,
    pub filesize: u64,
}

impl VideoFormat {
    /// Human-readable size, e.g. `142.3 MB`.
    pub fn filesize_display(&self) -> String {
        let mb = self.filesize as f64 / (1024.0 * 1024.0);
        if mb >= 1024.0 {
            format!("{:.2} GB", mb / 1024.0)
        } else {
            format!("{mb:.1} MB")
        }
    }
}

/// Metadata returned by `POST /fetch-info`.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    pub thumbnail: String,
    pub duration: u64,
    pub uploader: String,
    pub formats: Vec<VideoFormat>,
}

/// Outcome of one `GET /progress/{id}` poll.
///
/// Polling is infallible by construction: every way the request can go
/// wrong maps to a variant the session machine knows how to handle.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// Download in flight (or just finished at 100).
    Progress(i32),
    /// The task failed terminally; `message` is user-facing.
    Failed { message: String },
    /// The id is unknown or the record expired.
    NotFound,
    /// The server answered with an unexpected error.
    Backend { message: String },
    /// The request itself failed; worth retrying on the next tick.
    Transport { message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server rejected the request with a user-facing message.
    #[error("{0}")]
    Backend(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Malformed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// QueryApi
// ---------------------------------------------------------------------------

/// Everything the client needs from the download service.
#[async_trait]
pub trait QueryApi: Send + Sync {
    /// `POST /fetch-info`.
    async fn fetch_info(&self, url: &str) -> Result<VideoInfo, ApiError>;

    /// `POST /download`; returns the task id to poll.
    async fn start_download(
        &self,
        url: &str,
        format_id: &str,
        filename: &str,
    ) -> Result<Uuid, ApiError>;

    /// `GET /progress/{id}`.
    async fn poll(&self, id: Uuid) -> PollOutcome;

    /// `GET /get-file/{id}`, streamed into `dest_dir`. Returns the path
    /// the artifact was saved to.
    async fn fetch_file(&self, id: Uuid, dest_dir: &Path) -> Result<PathBuf, ApiError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

pub struct HttpQueryApi {
    base_url: String,
    http: reqwest::Client,
}

impl HttpQueryApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct StartDownloadBody {
    download_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct ProgressBody {
    progress: i32,
    #[serde(default)]
    error: Option<String>,
}

/// Extract the server's `{"error": ...}` message, if the body has one.
async fn error_message(response: reqwest::Response) -> String {
    match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => "Unexpected server error.".to_string(),
    }
}

#[async_trait]
impl QueryApi for HttpQueryApi {
    async fn fetch_info(&self, url: &str) -> Result<VideoInfo, ApiError> {
        let response = self
            .http
            .post(self.url("/fetch-info"))
            .timeout(Duration::from_secs(60))
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ApiError::Backend(error_message(response).await));
        }
        response
            .json::<VideoInfo>()
            .await
            .map_err(|e| ApiError::Malformed(e.to_string()))
    }

    async fn start_download(
        &self,
        url: &str,
        format_id: &str,
        filename: &str,
    ) -> Result<Uuid, ApiError> {
        let response = self
            .http
            .post(self.url("/download"))
            .timeout(Duration::from_secs(30))
            .json(&serde_json::json!({
                "url": url,
                "format_id": format_id,
                "filename": filename,
            }))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ApiError::Backend(error_message(response).await));
        }
        let body = response
            .json::<StartDownloadBody>()
            .await
            .map_err(|e| ApiError::Malformed(e.to_string()))?;
        Ok(body.download_id)
    }

    async fn poll(&self, id: Uuid) -> PollOutcome {
        let response = match self
            .http
            .get(self.url(&format!("/progress/{id}")))
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return PollOutcome::Transport {
                    message: e.to_string(),
                }
            }
        };

        let status = response.status();
        let body: ProgressBody = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                return PollOutcome::Transport {
                    message: e.to_string(),
                }
            }
        };

        if status == StatusCode::NOT_FOUND || body.progress == PROGRESS_NOT_FOUND {
            return PollOutcome::NotFound;
        }
        if !status.is_success() {
            return PollOutcome::Backend {
                message: body
                    .error
                    .unwrap_or_else(|| "Unexpected server error.".to_string()),
            };
        }
        if body.progress == PROGRESS_FAILED {
            return PollOutcome::Failed {
                message: body
                    .error
                    .unwrap_or_else(|| "Download failed".to_string()),
            };
        }
        PollOutcome::Progress(body.progress)
    }

    async fn fetch_file(&self, id: Uuid, dest_dir: &Path) -> Result<PathBuf, ApiError> {
        let mut response = self
            .http
            .get(self.url(&format!("/get-file/{id}")))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ApiError::Backend(error_message(response).await));
        }

        let name = attachment_filename(response.headers())
            .unwrap_or_else(|| format!("{id}.mp4"));
        let path = dest_dir.join(name);
        let mut file = tokio::fs::File::create(&path).await?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Pull the suggested filename out of a `Content-Disposition` header.
fn attachment_filename(headers: &HeaderMap) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"filename="([^"]+)""#).unwrap());
    let value = headers.get(CONTENT_DISPOSITION)?.to_str().ok()?;
    re.captures(value).map(|c| c[1].to_string())
}

/// Quick client-side URL check before bothering the server.
pub fn is_youtube_url(url: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^(https?://)?(www\.|m\.)?(youtube\.com|youtu\.be)/.+").unwrap()
    });
    re.is_match(url.trim())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    // -- is_youtube_url --------------------------------------------------

    #[test]
    fn accepts_common_youtube_urls() {
        assert!(is_youtube_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_youtube_url("http://youtube.com/watch?v=abc"));
        assert!(is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(is_youtube_url("https://m.youtube.com/watch?v=abc"));
        assert!(is_youtube_url("www.youtube.com/watch?v=abc"));
    }

    #[test]
    fn rejects_non_youtube_urls() {
        assert!(!is_youtube_url(""));
        assert!(!is_youtube_url("https://example.com/watch?v=abc"));
        assert!(!is_youtube_url("https://youtube.com"));
        assert!(!is_youtube_url("not a url"));
    }

    // -- attachment_filename ---------------------------------------------

    #[test]
    fn parses_attachment_filename() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename=\"My_Clip.mp4\""),
        );
        assert_eq!(
            attachment_filename(&headers).as_deref(),
            Some("My_Clip.mp4")
        );
    }

    #[test]
    fn missing_disposition_yields_none() {
        assert_eq!(attachment_filename(&HeaderMap::new()), None);
    }

    // -- filesize_display ------------------------------------------------

    #[test]
    fn formats_filesize() {
        let mut format = VideoFormat {
            format_id: "137".to_string(),
            quality_label: "1080p".to_string(),
            height: 1080,
            width: 1920,
            ext: "mp4".to_string(),
            filesize: 50 * 1024 * 1024,
        };
        assert_eq!(format.filesize_display(), "50.0 MB");
        format.filesize = 3 * 1024 * 1024 * 1024;
        assert_eq!(format.filesize_display(), "3.00 GB");
    }
}
