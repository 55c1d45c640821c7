//! Store port for task persistence, lookup, and archival.

use crate::task::domain::{ArchivedTask, Task, TaskId, TaskVersion, TriggerOrigin};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for task store operations.
pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

/// Task persistence contract with optimistic concurrency control.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Stores a new task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::DuplicateTask`] when the task ID already
    /// exists or [`TaskStoreError::DuplicateOrigin`] when the trigger origin
    /// already maps to a live task.
    async fn insert(&self, task: &Task) -> TaskStoreResult<()>;

    /// Persists changes to an existing task when its stored version still
    /// matches `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] when the task does not exist and
    /// [`TaskStoreError::VersionConflict`] when another writer got there
    /// first.
    async fn update(&self, task: &Task, expected_version: TaskVersion) -> TaskStoreResult<()>;

    /// Finds a live task by internal task identifier.
    ///
    /// Returns `None` when the task does not exist.
    async fn find_by_id(&self, id: TaskId) -> TaskStoreResult<Option<Task>>;

    /// Finds the live task created from the given trigger origin.
    ///
    /// Returns `None` when no live task tracks the origin. Archived tasks do
    /// not participate, so a finalized origin can be picked up afresh.
    async fn find_by_origin(&self, origin: &TriggerOrigin) -> TaskStoreResult<Option<Task>>;

    /// Returns all live tasks.
    async fn list_active(&self) -> TaskStoreResult<Vec<Task>>;

    /// Moves a finalized task out of the live set into the archive.
    ///
    /// The live row, when still present, is removed together with its origin
    /// mapping. Archived records are append-only and never deleted.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::DuplicateTask`] when a record for the same
    /// task was already archived.
    async fn archive(&self, record: &ArchivedTask) -> TaskStoreResult<()>;

    /// Finds an archived record by task identifier.
    ///
    /// Returns `None` when the task was never archived.
    async fn find_archived(&self, id: TaskId) -> TaskStoreResult<Option<ArchivedTask>>;
}

/// Errors returned by task store implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskStoreError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// A live task for the trigger origin already exists.
    #[error("duplicate trigger origin: {0}")]
    DuplicateOrigin(TriggerOrigin),

    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The stored version no longer matches the expected version.
    #[error("version conflict for task {task_id}: expected {expected}, stored {actual}")]
    VersionConflict {
        /// Task whose conditional write failed.
        task_id: TaskId,
        /// Version the writer read before mutating.
        expected: TaskVersion,
        /// Version currently stored.
        actual: TaskVersion,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
