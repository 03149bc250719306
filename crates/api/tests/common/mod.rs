//! Shared test harness: a mock extractor and the full application
//! router with the production middleware stack.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use tubedl_core::extract::{DownloadRequest, ExtractError, MediaExtractor, ProgressSender};
use tubedl_core::store::JobStore;
use tubedl_core::video::{VideoFormat, VideoInfo};

use tubedl_api::config::ServerConfig;
use tubedl_api::routes;
use tubedl_api::state::AppState;

// ---------------------------------------------------------------------------
// Mock extractor
// ---------------------------------------------------------------------------

/// Scripted probe outcome.
pub enum MockProbe {
    Ok(VideoInfo),
    Unavailable(String),
    Transient(String),
}

/// Scripted download outcome.
pub enum MockDownload {
    /// Hang forever; the task stays running.
    Never,
    /// Report the given percentages, then succeed with `artifact`.
    Succeed { percents: Vec<i32>, artifact: PathBuf },
    /// Fail terminally with the given message.
    Fail(String),
}

pub struct MockExtractor {
    pub probe: MockProbe,
    pub download: MockDownload,
}

impl MockExtractor {
    pub fn probing(probe: MockProbe) -> Arc<Self> {
        Arc::new(Self {
            probe,
            download: MockDownload::Never,
        })
    }
}

#[async_trait]
impl MediaExtractor for MockExtractor {
    async fn probe(&self, _url: &str) -> Result<VideoInfo, ExtractError> {
        match &self.probe {
            MockProbe::Ok(info) => Ok(info.clone()),
            MockProbe::Unavailable(msg) => Err(ExtractError::Unavailable(msg.clone())),
            MockProbe::Transient(msg) => Err(ExtractError::Transient(msg.clone())),
        }
    }

    async fn download(
        &self,
        _req: &DownloadRequest,
        progress: ProgressSender,
    ) -> Result<PathBuf, ExtractError> {
        match &self.download {
            MockDownload::Never => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            MockDownload::Succeed { percents, artifact } => {
                for p in percents {
                    let _ = progress.send(*p);
                }
                Ok(artifact.clone())
            }
            MockDownload::Fail(msg) => Err(ExtractError::Unavailable(msg.clone())),
        }
    }
}

/// A plausible two-format probe result.
pub fn sample_video_info() -> VideoInfo {
    VideoInfo {
        title: "Test Clip".to_string(),
        duration_secs: 212,
        thumbnail: Some("https://i.example.com/t.jpg".to_string()),
        uploader: "Example".to_string(),
        formats: vec![
            VideoFormat {
                format_id: "137".to_string(),
                quality_label: "1080p".to_string(),
                height: 1080,
                width: 1920,
                ext: "mp4".to_string(),
                filesize: 90_000_000,
            },
            VideoFormat {
                format_id: "136".to_string(),
                quality_label: "720p".to_string(),
                height: 720,
                width: 1280,
                ext: "mp4".to_string(),
                filesize: 50_000_000,
            },
        ],
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(download_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        download_dir: download_dir.to_path_buf(),
        retention_secs: 7200,
        eviction_interval_secs: 3600,
        ytdlp_bin: "yt-dlp".to_string(),
    }
}

/// Build the full application router with all middleware layers.
///
/// Mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout,
/// tracing, panic recovery) that production uses. Returns the store
/// handle so tests can drive task state directly.
pub fn build_test_app(
    extractor: Arc<dyn MediaExtractor>,
    download_dir: &Path,
) -> (Router, Arc<JobStore>) {
    let config = test_config(download_dir);
    let store = Arc::new(JobStore::new(Duration::from_secs(config.retention_secs)));

    let state = AppState {
        store: Arc::clone(&store),
        extractor,
        config: Arc::new(config.clone()),
    };

    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| o.parse().unwrap())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    let app = Router::new()
        .merge(routes::health_router())
        .merge(routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    (app, store)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}
