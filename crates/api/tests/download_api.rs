//! Integration tests for the download job lifecycle:
//! `POST /download`, `GET /progress/{id}`, `GET /get-file/{id}`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, StatusCode};
use tempfile::TempDir;
use uuid::Uuid;

use tubedl_core::store::TaskUpdate;

use common::{
    body_bytes, body_json, build_test_app, get, post_json, sample_video_info, MockDownload,
    MockExtractor, MockProbe,
};

// ---------------------------------------------------------------------------
// POST /download
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_download_returns_task_id() {
    let dir = TempDir::new().unwrap();
    let extractor = MockExtractor::probing(MockProbe::Ok(sample_video_info()));
    let (app, store) = build_test_app(extractor, dir.path());

    let response = post_json(
        app.clone(),
        "/download",
        serde_json::json!({
            "url": "https://example.com/v",
            "format_id": "137",
            "filename": "My Clip.mp4",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Download started");
    let id: Uuid = body["download_id"].as_str().unwrap().parse().unwrap();

    // The task exists and is pollable immediately.
    let response = get(app, &format!("/progress/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["progress"].as_i64().unwrap() >= 0);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn start_download_requires_url_and_format() {
    let dir = TempDir::new().unwrap();
    let extractor = MockExtractor::probing(MockProbe::Ok(sample_video_info()));
    let (app, _store) = build_test_app(extractor, dir.path());

    for payload in [
        serde_json::json!({}),
        serde_json::json!({ "url": "https://example.com/v" }),
        serde_json::json!({ "format_id": "137" }),
        serde_json::json!({ "url": "", "format_id": "137" }),
    ] {
        let response = post_json(app.clone(), "/download", payload).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Missing URL or format ID");
    }
}

#[tokio::test]
async fn start_download_rejects_malformed_format_id() {
    let dir = TempDir::new().unwrap();
    let extractor = MockExtractor::probing(MockProbe::Ok(sample_video_info()));
    let (app, _store) = build_test_app(extractor, dir.path());

    let response = post_json(
        app,
        "/download",
        serde_json::json!({
            "url": "https://example.com/v",
            "format_id": "137; rm -rf /",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// GET /progress/{id}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn progress_reports_store_state() {
    let dir = TempDir::new().unwrap();
    let extractor = MockExtractor::probing(MockProbe::Ok(sample_video_info()));
    let (app, store) = build_test_app(extractor, dir.path());

    let id = store.create().await;

    let response = get(app.clone(), &format!("/progress/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["progress"], 0);

    store.update(id, TaskUpdate::running()).await;
    store.update(id, TaskUpdate::progress(45)).await;

    let response = get(app.clone(), &format!("/progress/{id}")).await;
    let body = body_json(response).await;
    assert_eq!(body["progress"], 45);
    assert!(body.get("error").is_none());

    store
        .update(id, TaskUpdate::succeeded(dir.path().join("x.mp4")))
        .await;

    let response = get(app, &format!("/progress/{id}")).await;
    assert_eq!(body_json(response).await["progress"], 100);
}

#[tokio::test]
async fn progress_for_failed_task_carries_sentinel_and_message() {
    let dir = TempDir::new().unwrap();
    let extractor = MockExtractor::probing(MockProbe::Ok(sample_video_info()));
    let (app, store) = build_test_app(extractor, dir.path());

    let id = store.create().await;
    store
        .update(id, TaskUpdate::failed("Video unavailable or private."))
        .await;

    let response = get(app, &format!("/progress/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["progress"], -1);
    assert_eq!(body["error"], "Video unavailable or private.");
}

#[tokio::test]
async fn progress_for_unknown_id_is_not_found_sentinel() {
    let dir = TempDir::new().unwrap();
    let extractor = MockExtractor::probing(MockProbe::Ok(sample_video_info()));
    let (app, _store) = build_test_app(extractor, dir.path());

    for id in [Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
        let response = get(app.clone(), &format!("/progress/{id}")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["progress"], -2);
        assert_eq!(body["error"], "Download ID not found");
    }
}

// ---------------------------------------------------------------------------
// GET /get-file/{id}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_file_streams_artifact_once() {
    let dir = TempDir::new().unwrap();
    let extractor = MockExtractor::probing(MockProbe::Ok(sample_video_info()));
    let (app, store) = build_test_app(extractor, dir.path());

    let id = store.create().await;
    let artifact = dir.path().join(format!("{id}_clip.mp4"));
    tokio::fs::write(&artifact, b"fake mp4 payload").await.unwrap();
    store.update(id, TaskUpdate::running()).await;
    store.update(id, TaskUpdate::succeeded(artifact)).await;

    let response = get(app.clone(), &format!("/get-file/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "video/mp4"
    );
    // The id prefix is stripped from the attachment name.
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"clip.mp4\""
    );
    assert_eq!(body_bytes(response).await, b"fake mp4 payload");

    // The result handle is claimed; a second fetch 404s.
    let response = get(app, &format!("/get-file/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "File not found or expired");
}

#[tokio::test]
async fn get_file_before_completion_is_not_found() {
    let dir = TempDir::new().unwrap();
    let extractor = MockExtractor::probing(MockProbe::Ok(sample_video_info()));
    let (app, store) = build_test_app(extractor, dir.path());

    let id = store.create().await;
    store.update(id, TaskUpdate::running()).await;

    let response = get(app, &format!("/get-file/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_file_for_unknown_id_is_not_found() {
    let dir = TempDir::new().unwrap();
    let extractor = MockExtractor::probing(MockProbe::Ok(sample_video_info()));
    let (app, _store) = build_test_app(extractor, dir.path());

    for id in [Uuid::new_v4().to_string(), "garbage".to_string()] {
        let response = get(app.clone(), &format!("/get-file/{id}")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

// ---------------------------------------------------------------------------
// End to end through the executor
// ---------------------------------------------------------------------------

#[tokio::test]
async fn download_runs_to_completion_through_executor() {
    let dir = TempDir::new().unwrap();
    let artifact = dir.path().join("e2e_clip.mp4");
    tokio::fs::write(&artifact, b"streamed bytes").await.unwrap();

    let extractor = Arc::new(MockExtractor {
        probe: MockProbe::Ok(sample_video_info()),
        download: MockDownload::Succeed {
            percents: vec![10, 55, 99],
            artifact: artifact.clone(),
        },
    });
    let (app, store) = build_test_app(extractor, dir.path());

    let response = post_json(
        app.clone(),
        "/download",
        serde_json::json!({
            "url": "https://example.com/v",
            "format_id": "136",
            "filename": "clip.mp4",
        }),
    )
    .await;
    let body = body_json(response).await;
    let id: Uuid = body["download_id"].as_str().unwrap().parse().unwrap();

    // Wait for the spawned executor to finish the scripted download.
    let mut progress = -100;
    for _ in 0..50 {
        let response = get(app.clone(), &format!("/progress/{id}")).await;
        progress = body_json(response).await["progress"].as_i64().unwrap() as i32;
        if progress == 100 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(progress, 100);
    assert_eq!(store.get(id).await.unwrap().has_result, true);

    let response = get(app, &format!("/get-file/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"streamed bytes");
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_active_tasks_and_request_id() {
    let dir = TempDir::new().unwrap();
    let extractor = MockExtractor::probing(MockProbe::Ok(sample_video_info()));
    let (app, store) = build_test_app(extractor, dir.path());
    store.create().await;

    let response = get(app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_tasks"], 1);
}
