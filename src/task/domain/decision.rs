//! Append-only decision log entries.

use super::TaskState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Who made a recorded decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionActor {
    /// The coordination engine itself.
    System,
    /// A named human operator.
    Human {
        /// Operator handle as supplied by the hosting platform.
        name: String,
    },
}

impl DecisionActor {
    /// Creates a human actor from a platform handle.
    #[must_use]
    pub fn human(name: impl Into<String>) -> Self {
        Self::Human { name: name.into() }
    }
}

impl fmt::Display for DecisionActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::Human { name } => f.write_str(name),
        }
    }
}

/// What a decision entry records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionAction {
    /// A validated state transition.
    Transition {
        /// State the task left.
        from: TaskState,
        /// State the task entered.
        to: TaskState,
    },
    /// A command received from a human operator.
    Command {
        /// Command name without the leading slash.
        name: String,
    },
    /// A free-form annotation.
    Note {
        /// Short summary of the annotation.
        summary: String,
    },
}

/// One immutable entry in a task's decision log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionEntry {
    timestamp: DateTime<Utc>,
    actor: DecisionActor,
    action: DecisionAction,
    detail: BTreeMap<String, String>,
}

impl DecisionEntry {
    /// Creates a decision entry.
    #[must_use]
    pub const fn new(
        timestamp: DateTime<Utc>,
        actor: DecisionActor,
        action: DecisionAction,
        detail: BTreeMap<String, String>,
    ) -> Self {
        Self {
            timestamp,
            actor,
            action,
            detail,
        }
    }

    /// Returns when the decision was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns who made the decision.
    #[must_use]
    pub const fn actor(&self) -> &DecisionActor {
        &self.actor
    }

    /// Returns what the decision recorded.
    #[must_use]
    pub const fn action(&self) -> &DecisionAction {
        &self.action
    }

    /// Returns the supplementary detail map.
    #[must_use]
    pub const fn detail(&self) -> &BTreeMap<String, String> {
        &self.detail
    }

    /// Returns the entered state when the entry records a transition.
    #[must_use]
    pub const fn transition_target(&self) -> Option<TaskState> {
        match self.action {
            DecisionAction::Transition { to, .. } => Some(to),
            DecisionAction::Command { .. } | DecisionAction::Note { .. } => None,
        }
    }
}
