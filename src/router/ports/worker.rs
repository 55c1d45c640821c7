//! Worker capability port for long-running agent executions.

use crate::router::domain::WorkerResult;
use crate::task::domain::Task;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for worker capability operations.
pub type WorkerCapabilityResult<T> = Result<T, WorkerCapabilityError>;

/// Directive describing what one worker invocation should do.
///
/// Each directive fixes the meaning of the result's `diagnostics` lines:
///
/// - [`WorkerDirective::Plan`]: `output` carries the plan body and each
///   diagnostics line names a resource path the plan expects to touch.
/// - [`WorkerDirective::Implement`]: diagnostics lines of the form
///   `key=value` (notably `branch=` and `change_request=`) describe the
///   opened change request.
/// - For a failed invocation of any directive, `output` describes the error
///   and the diagnostics lines, when present, carry the partial diff the
///   worker produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerDirective {
    /// Produce an implementation plan for the task's trigger.
    Plan,
    /// Execute the approved plan and open a change request.
    Implement,
    /// Review the open change request.
    Review,
    /// Apply review feedback to the open change request.
    ApplyReview,
    /// Diagnose a failure from the captured diff and error.
    Fix {
        /// Partial diff captured from the failed invocation, possibly empty.
        diff: String,
        /// Error text captured from the failed invocation.
        error: String,
    },
}

/// Contract for invoking an external worker agent.
///
/// Invocations are long-running and may block on network calls. Callers
/// must not hold internal synchronization while awaiting one.
#[async_trait]
pub trait WorkerCapability: Send + Sync {
    /// Runs one invocation for `task` and returns its outcome.
    ///
    /// A worker that ran but did not achieve the directive reports that via
    /// [`WorkerResult::success`], not via the error path.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerCapabilityError`] when the invocation could not run
    /// or its outcome was lost.
    async fn execute(
        &self,
        task: &Task,
        directive: WorkerDirective,
    ) -> WorkerCapabilityResult<WorkerResult>;
}

/// Errors returned by worker capability implementations.
#[derive(Debug, Clone, Error)]
pub enum WorkerCapabilityError {
    /// The invocation failed before producing a result.
    #[error("worker invocation failed: {0}")]
    Invocation(String),

    /// Transport-layer failure.
    #[error("worker transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl WorkerCapabilityError {
    /// Wraps a transport error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}
