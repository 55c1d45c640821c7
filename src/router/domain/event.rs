//! Engine events consumed by the router and the dispositions it returns.

use crate::task::domain::{TaskId, TaskSnapshot, TriggerOrigin};

/// External trigger payload, already decoded from the wire by the embedder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    /// Repository the trigger was raised in, as `owner/repo`.
    pub repo: String,
    /// External reference number of the trigger.
    pub external_ref: u64,
    /// Trigger title.
    pub title: String,
    /// Trigger body text.
    pub body: String,
    /// Labels attached to the trigger.
    pub labels: Vec<String>,
}

impl TriggerEvent {
    /// Creates a trigger event with an empty body and no labels.
    #[must_use]
    pub fn new(repo: impl Into<String>, external_ref: u64, title: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            external_ref,
            title: title.into(),
            body: String::new(),
            labels: Vec::new(),
        }
    }

    /// Sets the trigger body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the trigger labels.
    #[must_use]
    pub fn with_labels(mut self, labels: impl IntoIterator<Item = String>) -> Self {
        self.labels = labels.into_iter().collect();
        self
    }
}

/// Human comment on a tracked trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEvent {
    /// Raw comment body, scanned for a slash command.
    pub body: String,
    /// Name of the commenting actor.
    pub actor: String,
}

impl CommandEvent {
    /// Creates a command event.
    #[must_use]
    pub fn new(body: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            actor: actor.into(),
        }
    }
}

/// Outcome reported by one worker invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerResult {
    /// Whether the invocation achieved its directive.
    pub success: bool,
    /// Primary artifact: plan body, summary, review verdict, diagnosis, or
    /// error description on failure.
    pub output: String,
    /// Supplementary lines whose meaning depends on the directive.
    pub diagnostics: Vec<String>,
}

impl WorkerResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            diagnostics: Vec::new(),
        }
    }

    /// Creates a failed result whose output describes the error.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: error.into(),
            diagnostics: Vec::new(),
        }
    }

    /// Sets the supplementary diagnostic lines.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: impl IntoIterator<Item = String>) -> Self {
        self.diagnostics = diagnostics.into_iter().collect();
        self
    }
}

/// One event presented to the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A trigger arrived from the forge.
    Trigger(TriggerEvent),
    /// A human commented on a tracked trigger.
    Command {
        /// Trigger the comment was left on.
        origin: TriggerOrigin,
        /// The comment itself.
        command: CommandEvent,
    },
    /// An out-of-band worker invocation finished.
    WorkerFinished {
        /// Task the invocation ran for.
        task_id: TaskId,
        /// The invocation's outcome.
        result: WorkerResult,
    },
    /// Periodic probe asking whether a task overran its execution bound.
    TimeoutTick {
        /// Task to examine.
        task_id: TaskId,
    },
    /// The external change request for a tracked trigger was resolved.
    ChangeResolved {
        /// Trigger whose change request resolved.
        origin: TriggerOrigin,
        /// Whether the change request was merged rather than closed.
        merged: bool,
    },
}

/// What the router did with one engine event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The event created a task; the snapshot shows how far it advanced.
    Created(TaskSnapshot),
    /// The event advanced an existing task.
    Advanced(TaskSnapshot),
    /// A lease conflict left the task queued for a later attempt.
    Requeued(TaskId),
    /// The task reached a terminal state and was handed to the archive.
    Finalized(TaskSnapshot),
    /// The task was escalated to a human and archived.
    Escalated(TaskSnapshot),
    /// The event did not apply and was safely dropped.
    Discarded {
        /// Why the event was dropped.
        reason: String,
    },
}
