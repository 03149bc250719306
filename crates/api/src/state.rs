use std::sync::Arc;

use tubedl_core::extract::MediaExtractor;
use tubedl_core::store::JobStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Owner of all task records; shared with the executor and the
    /// eviction loop.
    pub store: Arc<JobStore>,
    /// Media extraction backend the executor drives.
    pub extractor: Arc<dyn MediaExtractor>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
