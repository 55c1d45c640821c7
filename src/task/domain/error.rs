//! Error types for task domain validation and transitions.

use super::{TaskId, TaskState};
use thiserror::Error;

/// Errors returned while constructing or mutating domain task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The repository name does not follow `owner/repo` format.
    #[error("invalid repository name '{0}', expected owner/repo")]
    InvalidRepoName(String),

    /// The external reference number is invalid.
    #[error("invalid external reference number {0}, expected a positive integer")]
    InvalidExternalNumber(u64),

    /// The trigger title is empty after trimming.
    #[error("trigger title must not be empty")]
    EmptyTitle,

    /// The resource path failed normalization.
    #[error("invalid resource path '{0}'")]
    InvalidResourcePath(String),

    /// The requested edge is not in the transition table.
    #[error("invalid transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        /// Task the transition was requested for.
        task_id: TaskId,
        /// State the task is currently in.
        from: TaskState,
        /// Requested target state.
        to: TaskState,
    },

    /// A working branch is already associated with the task.
    #[error("branch already associated with task {0}")]
    BranchAlreadyAssociated(TaskId),

    /// A change request is already associated with the task.
    #[error("change request already associated with task {0}")]
    ChangeRequestAlreadyAssociated(TaskId),

    /// A well-known metadata key carried an unusable value.
    #[error("invalid value '{value}' for transition metadata key '{key}'")]
    InvalidMetadataValue {
        /// The metadata key.
        key: String,
        /// The offending value.
        value: String,
    },

    /// The task is already in a terminal state.
    #[error("task {task_id} is already terminal in state {state}")]
    AlreadyTerminal {
        /// Task the operation was requested for.
        task_id: TaskId,
        /// The terminal state the task holds.
        state: TaskState,
    },
}

/// Error returned while parsing task states from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task state: {0}")]
pub struct ParseTaskStateError(pub String);
