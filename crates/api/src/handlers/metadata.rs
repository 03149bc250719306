//! Handler for the metadata lookup endpoint.
//!
//! `POST /fetch-info` probes a video URL through the extractor and
//! returns title, duration, thumbnail, uploader, and the processed
//! format list.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use tubedl_core::extract::ExtractError;
use tubedl_core::video::{self, VideoFormat, VideoInfo};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Served when the source offers no usable thumbnail.
const PLACEHOLDER_THUMBNAIL: &str = "/static/images/placeholder.jpg";

#[derive(Debug, Deserialize)]
pub struct FetchInfoRequest {
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FetchInfoResponse {
    pub title: String,
    pub thumbnail: String,
    pub duration: u64,
    pub uploader: String,
    pub formats: Vec<VideoFormat>,
}

impl From<VideoInfo> for FetchInfoResponse {
    fn from(info: VideoInfo) -> Self {
        // Only http(s) thumbnails are trusted; anything else falls back
        // to the bundled placeholder.
        let thumbnail = info
            .thumbnail
            .filter(|t| t.starts_with("http://") || t.starts_with("https://"))
            .unwrap_or_else(|| PLACEHOLDER_THUMBNAIL.to_string());

        Self {
            title: info.title,
            thumbnail,
            duration: info.duration_secs,
            uploader: info.uploader,
            formats: info.formats,
        }
    }
}

// ---------------------------------------------------------------------------
// POST /fetch-info
// ---------------------------------------------------------------------------

/// Look up video metadata and encoding variants for a URL.
pub async fn fetch_info(
    State(state): State<AppState>,
    Json(input): Json<FetchInfoRequest>,
) -> AppResult<impl IntoResponse> {
    let url = input.url.unwrap_or_default();
    let url = url.trim();
    if url.is_empty() {
        return Err(AppError::BadRequest("No URL provided".to_string()));
    }
    video::validate_url(url)?;

    match state.extractor.probe(url).await {
        Ok(info) => {
            tracing::info!(url = %url, formats = info.formats.len(), "Metadata probe succeeded");
            Ok(Json(FetchInfoResponse::from(info)))
        }
        Err(ExtractError::Unavailable(msg)) => Err(AppError::BadRequest(msg)),
        Err(e) => {
            tracing::error!(url = %url, error = %e, "Metadata probe failed");
            Err(AppError::Internal(
                "Failed to fetch video information.".to_string(),
            ))
        }
    }
}
