//! HTTP service for the tubedl download manager.
//!
//! Exposes the job query surface (`/fetch-info`, `/download`,
//! `/progress/{id}`, `/get-file/{id}`) over axum, backed by the
//! in-memory job store and background executor from `tubedl_core`.

pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
