//! Plan artifacts recorded against a task.

use super::ResourcePath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One immutable plan artifact in a task's append-only plan history.
///
/// The current plan is always the most recently recorded entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRecord {
    body: String,
    resource_paths: Vec<ResourcePath>,
    recorded_at: DateTime<Utc>,
}

impl PlanRecord {
    /// Creates a plan record.
    #[must_use]
    pub const fn new(
        body: String,
        resource_paths: Vec<ResourcePath>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            body,
            resource_paths,
            recorded_at,
        }
    }

    /// Returns the plan body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the resource paths the plan expects to touch.
    #[must_use]
    pub fn resource_paths(&self) -> &[ResourcePath] {
        &self.resource_paths
    }

    /// Returns when the plan was recorded.
    #[must_use]
    pub const fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}
