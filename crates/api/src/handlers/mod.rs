//! Request handlers for the download service.

pub mod downloads;
pub mod metadata;
