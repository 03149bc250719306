//! Task record and status types for download jobs.
//!
//! A [`Task`] is the server-side record of one asynchronous download.
//! Progress is an integer percentage in `0..=100`; the reserved value
//! [`PROGRESS_FAILED`] (`-1`) on the same channel marks terminal failure,
//! preserving the service's wire contract.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Opaque task identifier. Generated at creation, never reused.
pub type TaskId = Uuid;

/// Reserved progress value meaning the task failed terminally.
pub const PROGRESS_FAILED: i32 = -1;

/// Wire-only sentinel reported alongside a 404 for ids that were never
/// issued or have been evicted. Never stored in a task record.
pub const PROGRESS_NOT_FOUND: i32 = -2;

/// Progress reported once a task has completed successfully.
pub const PROGRESS_COMPLETE: i32 = 100;

/// Lifecycle status of a download task.
///
/// Transitions are `Pending -> Running -> {Succeeded | Failed}`. Terminal
/// statuses are one-way; "not found" is implicit once a task is evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    /// Whether this status is terminal (no further transitions allowed).
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

/// One download job's server-side record.
///
/// Owned exclusively by the [`JobStore`](crate::store::JobStore); the
/// executor only pushes updates and never deletes.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub status: TaskStatus,
    /// Percentage in `0..=100`, or [`PROGRESS_FAILED`].
    pub progress: i32,
    /// Present only when `status == Failed`.
    pub error: Option<String>,
    /// Present only when `status == Succeeded` and not yet claimed by
    /// file retrieval.
    pub result_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    /// Set when the task reaches a terminal status; drives eviction.
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: TaskId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: TaskStatus::Pending,
            progress: 0,
            error: None,
            result_path: None,
            created_at,
            finished_at: None,
        }
    }
}

/// Immutable snapshot of a task's observable fields.
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub status: TaskStatus,
    pub progress: i32,
    pub error: Option<String>,
    /// Whether an unclaimed result artifact is attached.
    pub has_result: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Task> for TaskSnapshot {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            status: task.status,
            progress: task.progress,
            error: task.error.clone(),
            has_result: task.result_path.is_some(),
            created_at: task.created_at,
        }
    }
}
