//! In-memory task store backing tests and single-process runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::task::{
    domain::{ArchivedTask, Task, TaskId, TaskVersion, TriggerOrigin},
    ports::{TaskStore, TaskStoreError, TaskStoreResult},
};

/// Thread-safe in-memory task store with version-checked updates.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskStore {
    state: Arc<RwLock<InMemoryTaskState>>,
}

#[derive(Debug, Default)]
struct InMemoryTaskState {
    tasks: HashMap<TaskId, Task>,
    origin_index: HashMap<TriggerOrigin, TaskId>,
    archived: HashMap<TaskId, ArchivedTask>,
}

impl InMemoryTaskStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert(&self, task: &Task) -> TaskStoreResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|err| TaskStoreError::persistence(std::io::Error::other(err.to_string())))?;
        if state.tasks.contains_key(&task.id()) {
            return Err(TaskStoreError::DuplicateTask(task.id()));
        }

        let origin = task.origin().clone();
        if state.origin_index.contains_key(&origin) {
            return Err(TaskStoreError::DuplicateOrigin(origin));
        }

        state.origin_index.insert(origin, task.id());
        state.tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn update(&self, task: &Task, expected_version: TaskVersion) -> TaskStoreResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|err| TaskStoreError::persistence(std::io::Error::other(err.to_string())))?;

        let stored_version = state
            .tasks
            .get(&task.id())
            .ok_or(TaskStoreError::NotFound(task.id()))?
            .version();
        if stored_version != expected_version {
            return Err(TaskStoreError::VersionConflict {
                task_id: task.id(),
                expected: expected_version,
                actual: stored_version,
            });
        }

        state.tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> TaskStoreResult<Option<Task>> {
        let state = self
            .state
            .read()
            .map_err(|err| TaskStoreError::persistence(std::io::Error::other(err.to_string())))?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn find_by_origin(&self, origin: &TriggerOrigin) -> TaskStoreResult<Option<Task>> {
        let state = self
            .state
            .read()
            .map_err(|err| TaskStoreError::persistence(std::io::Error::other(err.to_string())))?;
        let task = state
            .origin_index
            .get(origin)
            .and_then(|task_id| state.tasks.get(task_id))
            .cloned();
        Ok(task)
    }

    async fn list_active(&self) -> TaskStoreResult<Vec<Task>> {
        let state = self
            .state
            .read()
            .map_err(|err| TaskStoreError::persistence(std::io::Error::other(err.to_string())))?;
        Ok(state.tasks.values().cloned().collect())
    }

    async fn archive(&self, record: &ArchivedTask) -> TaskStoreResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|err| TaskStoreError::persistence(std::io::Error::other(err.to_string())))?;

        let id = record.task().id();
        if state.archived.contains_key(&id) {
            return Err(TaskStoreError::DuplicateTask(id));
        }
        if let Some(live) = state.tasks.remove(&id) {
            state.origin_index.remove(live.origin());
        }
        state.archived.insert(id, record.clone());
        Ok(())
    }

    async fn find_archived(&self, id: TaskId) -> TaskStoreResult<Option<ArchivedTask>> {
        let state = self
            .state
            .read()
            .map_err(|err| TaskStoreError::persistence(std::io::Error::other(err.to_string())))?;
        Ok(state.archived.get(&id).cloned())
    }
}
