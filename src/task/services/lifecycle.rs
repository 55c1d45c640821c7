//! Service layer for task creation, validated transitions, and archival.

use crate::task::{
    domain::{
        ArchivedTask, DecisionAction, DecisionActor, ResourcePath, Task, TaskDomainError, TaskId,
        TaskSnapshot, TaskState, TransitionEvent, TransitionMetadata, TriggerOrigin,
    },
    ports::{TaskStore, TaskStoreError},
    services::TransitionPublisher,
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;

/// Default bound on conditional-write retries after a version conflict.
pub const DEFAULT_VERSION_RETRY_LIMIT: u32 = 3;

/// Request payload for a validated state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    task_id: TaskId,
    target_state: TaskState,
    actor: DecisionActor,
    metadata: TransitionMetadata,
}

impl TransitionRequest {
    /// Creates a request for a system-driven transition with empty metadata.
    #[must_use]
    pub const fn new(task_id: TaskId, target_state: TaskState) -> Self {
        Self {
            task_id,
            target_state,
            actor: DecisionActor::System,
            metadata: TransitionMetadata::new(),
        }
    }

    /// Sets the deciding actor.
    #[must_use]
    pub fn with_actor(mut self, actor: DecisionActor) -> Self {
        self.actor = actor;
        self
    }

    /// Replaces the metadata map.
    #[must_use]
    pub fn with_metadata(mut self, metadata: TransitionMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Adds one metadata entry.
    #[must_use]
    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Service-level errors for task lifecycle operations.
#[derive(Debug, Error)]
pub enum TaskLifecycleError {
    /// No task exists for the identifier.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),

    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] TaskStoreError),
}

/// Result type for task lifecycle service operations.
pub type TaskLifecycleResult<T> = Result<T, TaskLifecycleError>;

/// Task lifecycle orchestration service.
///
/// Wraps the task store with version-conditioned writes: every mutation
/// re-reads the task, revalidates against the current state, and retries a
/// bounded number of times when a concurrent writer wins the conditional
/// update. Successful transitions are published to observers fire-and-forget.
#[derive(Clone)]
pub struct TaskLifecycleService<S, C>
where
    S: TaskStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    publisher: Arc<TransitionPublisher>,
    clock: Arc<C>,
    version_retry_limit: u32,
}

impl<S, C> TaskLifecycleService<S, C>
where
    S: TaskStore,
    C: Clock + Send + Sync,
{
    /// Creates a new task lifecycle service.
    #[must_use]
    pub const fn new(store: Arc<S>, publisher: Arc<TransitionPublisher>, clock: Arc<C>) -> Self {
        Self {
            store,
            publisher,
            clock,
            version_retry_limit: DEFAULT_VERSION_RETRY_LIMIT,
        }
    }

    /// Overrides the bound on conditional-write retries.
    #[must_use]
    pub const fn with_version_retry_limit(mut self, limit: u32) -> Self {
        self.version_retry_limit = limit;
        self
    }

    /// Opens a channel receiving every published transition event.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::mpsc::Receiver<TransitionEvent> {
        self.publisher.subscribe()
    }

    /// Creates a task from a qualifying trigger and stores it.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] when the title is blank after
    /// trimming, or a store error when the origin already maps to a live
    /// task.
    pub async fn create_from_trigger(
        &self,
        origin: TriggerOrigin,
        title: impl Into<String> + Send,
    ) -> TaskLifecycleResult<Task> {
        let title_text = title.into();
        let trimmed = title_text.trim();
        if trimmed.is_empty() {
            return Err(TaskDomainError::EmptyTitle.into());
        }
        let task = Task::new_from_trigger(origin, trimmed, &*self.clock);
        self.store.insert(&task).await?;
        Ok(task)
    }

    /// Applies a validated transition and publishes the resulting event.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::TaskNotFound`] when no task exists,
    /// [`TaskDomainError::InvalidTransition`] when the edge is rejected, a
    /// metadata validation error, or a store error once conditional-write
    /// retries are exhausted.
    pub async fn transition(
        &self,
        request: TransitionRequest,
    ) -> TaskLifecycleResult<TaskSnapshot> {
        let TransitionRequest {
            task_id,
            target_state,
            actor,
            metadata,
        } = request;
        let task = self
            .mutate_with_retry(task_id, |task| {
                task.apply_transition(target_state, actor.clone(), metadata.clone(), &*self.clock)
            })
            .await?;
        self.publish_last_transition(&task);
        Ok(task.snapshot())
    }

    /// Cancels a task, forcing it to [`TaskState::Archived`], and publishes
    /// the resulting event.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::TaskNotFound`] when no task exists or
    /// [`TaskDomainError::AlreadyTerminal`] when the task already finished.
    pub async fn cancel(
        &self,
        task_id: TaskId,
        actor: DecisionActor,
        reason: impl Into<String> + Send,
    ) -> TaskLifecycleResult<TaskSnapshot> {
        let reason_text: String = reason.into();
        let task = self
            .mutate_with_retry(task_id, |task| {
                task.cancel(actor.clone(), reason_text.clone(), &*self.clock)
            })
            .await?;
        self.publish_last_transition(&task);
        Ok(task.snapshot())
    }

    /// Appends a decision entry without changing state.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::TaskNotFound`] when no task exists or a
    /// store error once conditional-write retries are exhausted.
    pub async fn record_decision(
        &self,
        task_id: TaskId,
        actor: DecisionActor,
        action: DecisionAction,
        detail: TransitionMetadata,
    ) -> TaskLifecycleResult<TaskSnapshot> {
        let task = self
            .mutate_with_retry(task_id, move |task| {
                task.record_decision(actor.clone(), action.clone(), detail.clone(), &*self.clock);
                Ok(())
            })
            .await?;
        Ok(task.snapshot())
    }

    /// Records the resource paths granted to a task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::TaskNotFound`] when no task exists or a
    /// store error once conditional-write retries are exhausted.
    pub async fn record_locked_files(
        &self,
        task_id: TaskId,
        paths: Vec<ResourcePath>,
    ) -> TaskLifecycleResult<TaskSnapshot> {
        let task = self
            .mutate_with_retry(task_id, move |task| {
                task.record_locked_files(paths.clone(), &*self.clock);
                Ok(())
            })
            .await?;
        Ok(task.snapshot())
    }

    /// Retrieves a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::TaskNotFound`] when no task exists.
    pub async fn get_task(&self, task_id: TaskId) -> TaskLifecycleResult<Task> {
        self.store
            .find_by_id(task_id)
            .await?
            .ok_or(TaskLifecycleError::TaskNotFound(task_id))
    }

    /// Retrieves the lifecycle state of a task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::TaskNotFound`] when no task exists.
    pub async fn get_state(&self, task_id: TaskId) -> TaskLifecycleResult<TaskState> {
        Ok(self.get_task(task_id).await?.state())
    }

    /// Finds the live task tracking a trigger origin.
    ///
    /// Returns `Ok(None)` when no live task tracks the origin.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Store`] when the lookup fails.
    pub async fn find_by_origin(
        &self,
        origin: &TriggerOrigin,
    ) -> TaskLifecycleResult<Option<Task>> {
        Ok(self.store.find_by_origin(origin).await?)
    }

    /// Returns all live tasks.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Store`] when the listing fails.
    pub async fn list_active(&self) -> TaskLifecycleResult<Vec<Task>> {
        Ok(self.store.list_active().await?)
    }

    /// Moves a finalized task into the archive.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Store`] when the task was already
    /// archived or the write fails.
    pub async fn archive(&self, task: Task) -> TaskLifecycleResult<ArchivedTask> {
        let record = ArchivedTask::new(task, self.clock.utc());
        self.store.archive(&record).await?;
        Ok(record)
    }

    /// Finds an archived record by task identifier.
    ///
    /// Returns `Ok(None)` when the task was never archived.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Store`] when the lookup fails.
    pub async fn find_archived(
        &self,
        task_id: TaskId,
    ) -> TaskLifecycleResult<Option<ArchivedTask>> {
        Ok(self.store.find_archived(task_id).await?)
    }

    /// Re-reads, revalidates, and conditionally writes until the write lands
    /// or the retry bound is hit.
    async fn mutate_with_retry<F>(&self, task_id: TaskId, mutate: F) -> TaskLifecycleResult<Task>
    where
        F: Fn(&mut Task) -> Result<(), TaskDomainError> + Send,
    {
        let mut attempts = 0u32;
        loop {
            let mut task = self
                .store
                .find_by_id(task_id)
                .await?
                .ok_or(TaskLifecycleError::TaskNotFound(task_id))?;
            let expected = task.version();
            mutate(&mut task)?;
            match self.store.update(&task, expected).await {
                Ok(()) => return Ok(task),
                Err(TaskStoreError::VersionConflict { .. })
                    if attempts < self.version_retry_limit =>
                {
                    attempts = attempts.saturating_add(1);
                    tracing::debug!(
                        task_id = %task_id,
                        attempts,
                        "conditional write lost, re-reading task"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Publishes the event described by the newest transition log entry.
    fn publish_last_transition(&self, task: &Task) {
        let Some(entry) = task.decision_log().last() else {
            return;
        };
        if let DecisionAction::Transition { from, to } = entry.action() {
            self.publisher.publish(&TransitionEvent {
                task_id: task.id(),
                from_state: *from,
                to_state: *to,
                timestamp: entry.timestamp(),
                metadata: entry.detail().clone(),
            });
        }
    }
}
