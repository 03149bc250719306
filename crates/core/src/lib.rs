//! Core engine for the tubedl download service.
//!
//! Domain types and logic shared by the API server and (indirectly) the
//! polling client: the task record and job store, the background job
//! executor, the media-extractor seam with its yt-dlp implementation,
//! and filename/format helpers. No HTTP concerns live here.

pub mod error;
pub mod executor;
pub mod extract;
pub mod filename;
pub mod store;
pub mod task;
pub mod video;

pub use error::CoreError;
