//! Route definitions for the download service.
//!
//! ```text
//! POST /fetch-info        -> metadata::fetch_info
//! POST /download          -> downloads::start_download
//! GET  /progress/{id}     -> downloads::progress
//! GET  /get-file/{id}     -> downloads::get_file
//! GET  /health            -> health_check
//! ```

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::handlers::{downloads, metadata};
use crate::state::AppState;

/// Download service routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/fetch-info", post(metadata::fetch_info))
        .route("/download", post(downloads::start_download))
        .route("/progress/{id}", get(downloads::progress))
        .route("/get-file/{id}", get(downloads::get_file))
}

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Number of live task records.
    pub active_tasks: usize,
}

/// GET /health -- returns service health and live task count.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        active_tasks: state.store.len().await,
    })
}

/// Mount health check routes (root-level).
pub fn health_router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
