//! Transition events published to observers.

use super::{TaskId, TaskState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Notification that a task moved between states.
///
/// Published fire-and-forget after every successful transition; observers
/// (label updaters, status-check updaters, archivers) consume it without the
/// engine depending on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    /// Task that transitioned.
    pub task_id: TaskId,
    /// State the task left.
    pub from_state: TaskState,
    /// State the task entered.
    pub to_state: TaskState,
    /// When the transition was applied.
    pub timestamp: DateTime<Utc>,
    /// Metadata supplied with the transition.
    pub metadata: BTreeMap<String, String>,
}
