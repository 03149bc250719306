//! In-memory job store: the single owner of all task records.
//!
//! Thread-safe via interior `RwLock`; designed to be wrapped in `Arc`,
//! constructed at service start and injected wherever needed, so tests
//! can build isolated stores. Supports concurrent reads (progress polls)
//! and writes (executor updates, eviction) with per-map locking; tasks
//! are independent, so no cross-task coordination is needed.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::task::{Task, TaskId, TaskSnapshot, TaskStatus, PROGRESS_COMPLETE, PROGRESS_FAILED};

/// Default retention window for finished tasks and their artifacts: 2 hours.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(2 * 60 * 60);

/// A partial mutation applied to a task via [`JobStore::update`].
#[derive(Debug, Default)]
pub struct TaskUpdate {
    pub progress: Option<i32>,
    pub status: Option<TaskStatus>,
    pub error: Option<String>,
    pub result_path: Option<PathBuf>,
}

impl TaskUpdate {
    /// Progress-only update, used by the executor while downloading.
    pub fn progress(percent: i32) -> Self {
        Self {
            progress: Some(percent),
            ..Self::default()
        }
    }

    /// Mark the task running.
    pub fn running() -> Self {
        Self {
            status: Some(TaskStatus::Running),
            ..Self::default()
        }
    }

    /// Terminal success: progress 100 with the result artifact attached.
    pub fn succeeded(result_path: PathBuf) -> Self {
        Self {
            progress: Some(PROGRESS_COMPLETE),
            status: Some(TaskStatus::Succeeded),
            result_path: Some(result_path),
            ..Self::default()
        }
    }

    /// Terminal failure: the `-1` sentinel plus a human-readable message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            progress: Some(PROGRESS_FAILED),
            status: Some(TaskStatus::Failed),
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Holds one record per live download task, keyed by task id.
pub struct JobStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
    retention: chrono::Duration,
}

impl JobStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            retention: chrono::Duration::from_std(retention)
                .unwrap_or_else(|_| chrono::Duration::hours(2)),
        }
    }

    /// Allocate a fresh task with `status = Pending, progress = 0`.
    pub async fn create(&self) -> TaskId {
        let id = Uuid::new_v4();
        let task = Task::new(id, Utc::now());
        self.tasks.write().await.insert(id, task);
        tracing::debug!(task_id = %id, "Task created");
        id
    }

    /// Atomically apply `update` to the task, if it exists.
    ///
    /// Unknown ids are a logged no-op: the executor may race with
    /// eviction, and that race is benign. Updates to a task already in a
    /// terminal status are ignored (terminal transitions are one-way),
    /// and progress never decreases while running.
    pub async fn update(&self, id: TaskId, update: TaskUpdate) {
        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.get_mut(&id) else {
            tracing::debug!(task_id = %id, "Update for unknown task ignored");
            return;
        };

        if task.status.is_terminal() {
            tracing::debug!(task_id = %id, status = ?task.status, "Update after terminal status ignored");
            return;
        }

        match update.status {
            Some(TaskStatus::Failed) => {
                task.status = TaskStatus::Failed;
                task.progress = PROGRESS_FAILED;
                task.error = update.error;
                task.result_path = None;
                task.finished_at = Some(Utc::now());
            }
            Some(TaskStatus::Succeeded) => {
                task.status = TaskStatus::Succeeded;
                task.progress = PROGRESS_COMPLETE;
                task.result_path = update.result_path;
                task.finished_at = Some(Utc::now());
            }
            Some(status) => {
                task.status = status;
                if let Some(p) = update.progress {
                    task.progress = task.progress.max(p.clamp(0, PROGRESS_COMPLETE));
                }
            }
            None => {
                if let Some(p) = update.progress {
                    // Monotonic while running: lower values are stale reports.
                    task.progress = task.progress.max(p.clamp(0, PROGRESS_COMPLETE));
                }
            }
        }
    }

    /// Return an immutable snapshot of the task, or `None` for ids that
    /// were never issued or have been evicted.
    pub async fn get(&self, id: TaskId) -> Option<TaskSnapshot> {
        self.tasks.read().await.get(&id).map(TaskSnapshot::from)
    }

    /// Take the result artifact out of a succeeded task.
    ///
    /// The file handle is single-use per job: the first claim returns the
    /// path and detaches it from the record, subsequent claims return
    /// `None`. The task itself remains queryable until evicted.
    pub async fn claim_result(&self, id: TaskId) -> Option<PathBuf> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id)?;
        if task.status != TaskStatus::Succeeded {
            return None;
        }
        task.result_path.take()
    }

    /// Remove tasks past their retention window, as of `now`.
    ///
    /// Terminal tasks are evicted once `finished_at + retention` has
    /// passed; pending tasks that never started are evicted on the same
    /// window from `created_at`. Running tasks are never evicted.
    /// Returns the unclaimed artifact paths of evicted tasks so the
    /// caller can delete the files.
    pub async fn evict_expired(&self, now: DateTime<Utc>) -> Vec<PathBuf> {
        let mut tasks = self.tasks.write().await;
        let mut orphans = Vec::new();

        tasks.retain(|id, task| {
            let expired = match task.status {
                TaskStatus::Running => false,
                TaskStatus::Pending => task.created_at + self.retention <= now,
                TaskStatus::Succeeded | TaskStatus::Failed => task
                    .finished_at
                    .map(|t| t + self.retention <= now)
                    .unwrap_or(false),
            };
            if expired {
                tracing::info!(task_id = %id, status = ?task.status, "Task evicted");
                if let Some(path) = task.result_path.take() {
                    orphans.push(path);
                }
            }
            !expired
        });

        orphans
    }

    /// Number of live task records.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
