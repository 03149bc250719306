//! Handlers for the download job lifecycle.
//!
//! `POST /download` creates a task and schedules the executor,
//! `GET /progress/{id}` reports the task's progress snapshot, and
//! `GET /get-file/{id}` streams the finished artifact exactly once.

use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use tubedl_core::extract::DownloadRequest;
use tubedl_core::filename::{display_name, sanitize_filename};
use tubedl_core::task::{TaskId, TaskStatus, PROGRESS_FAILED, PROGRESS_NOT_FOUND};
use tubedl_core::{executor, video};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// How long a served artifact lingers on disk before deletion, giving
/// the client time to finish reading the stream.
const SERVED_FILE_LINGER: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// POST /download
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StartDownloadRequest {
    pub url: Option<String>,
    pub format_id: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartDownloadResponse {
    pub download_id: TaskId,
    pub message: &'static str,
}

/// Create a download task and schedule its execution, returning the task
/// id immediately.
pub async fn start_download(
    State(state): State<AppState>,
    Json(input): Json<StartDownloadRequest>,
) -> AppResult<impl IntoResponse> {
    let (Some(url), Some(format_id)) = (input.url, input.format_id) else {
        return Err(AppError::BadRequest("Missing URL or format ID".to_string()));
    };
    let url = url.trim().to_string();
    if url.is_empty() || format_id.is_empty() {
        return Err(AppError::BadRequest("Missing URL or format ID".to_string()));
    }

    video::validate_url(&url)?;
    video::validate_format_id(&format_id)?;

    let file_name = sanitize_filename(input.filename.as_deref().unwrap_or("video"));
    // Artifacts are written as `{id}_{stem}.{ext}`; the extension is
    // whatever container the extractor actually produces.
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(&file_name);

    let id = state.store.create().await;
    let request = DownloadRequest {
        url,
        format_id,
        file_name: file_name.clone(),
        dest_stem: state.config.download_dir.join(format!("{id}_{stem}")),
    };

    executor::spawn(
        state.store.clone(),
        state.extractor.clone(),
        id,
        request,
    );

    tracing::info!(task_id = %id, "Download task enqueued");

    Ok(Json(StartDownloadResponse {
        download_id: id,
        message: "Download started",
    }))
}

// ---------------------------------------------------------------------------
// GET /progress/{id}
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub progress: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Report the current progress snapshot for a task.
///
/// Unknown or evicted ids get a 404 carrying the `-2` wire sentinel so
/// clients can distinguish expiry from backend failure; a failed task
/// reports the `-1` sentinel plus its error message until eviction.
pub async fn progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    // A malformed id can never have been issued, so it is
    // indistinguishable from an evicted one.
    let Ok(id) = Uuid::parse_str(&id) else {
        return progress_not_found();
    };

    let Some(snapshot) = state.store.get(id).await else {
        return progress_not_found();
    };

    let body = if snapshot.status == TaskStatus::Failed {
        ProgressResponse {
            progress: PROGRESS_FAILED,
            error: Some(
                snapshot
                    .error
                    .unwrap_or_else(|| "Download failed".to_string()),
            ),
        }
    } else {
        ProgressResponse {
            progress: snapshot.progress,
            error: None,
        }
    };

    (StatusCode::OK, Json(body)).into_response()
}

fn progress_not_found() -> Response {
    let body = ProgressResponse {
        progress: PROGRESS_NOT_FOUND,
        error: Some("Download ID not found".to_string()),
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// GET /get-file/{id}
// ---------------------------------------------------------------------------

/// Stream the finished artifact as an attachment.
///
/// The result handle is single-use: the first successful call claims the
/// artifact, later calls 404. The file itself is deleted after a linger
/// window so the client can finish reading the response body.
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let Ok(id) = Uuid::parse_str(&id) else {
        return Err(file_not_found());
    };

    let Some(path) = state.store.claim_result(id).await else {
        return Err(file_not_found());
    };

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) => {
            tracing::error!(task_id = %id, path = %path.display(), error = %e, "Claimed artifact missing from disk");
            return Err(file_not_found());
        }
    };

    let len = file.metadata().await.map(|m| m.len()).ok();
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("video.mp4");
    let download_name = display_name(file_name).to_string();
    let content_type = content_type_for(&path);

    tracing::info!(task_id = %id, path = %path.display(), "Serving artifact");

    // Stream from disk; never buffer the whole artifact.
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type),
    );
    if let Ok(value) =
        HeaderValue::from_str(&format!("attachment; filename=\"{download_name}\""))
    {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }
    if let Some(len) = len {
        if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
            response.headers_mut().insert(header::CONTENT_LENGTH, value);
        }
    }

    // Delete the artifact after the linger window; the task record
    // itself stays until eviction.
    tokio::spawn(async move {
        tokio::time::sleep(SERVED_FILE_LINGER).await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::debug!(path = %path.display(), error = %e, "Served artifact already gone");
        }
    });

    Ok(response)
}

fn file_not_found() -> AppError {
    AppError::NotFound("File not found or expired".to_string())
}

/// Map an artifact's extension to a content type for the attachment.
fn content_type_for(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
}
